//! Procedural macros for Tarkib.
//!
//! Use through the `tarkib` crate, which re-exports [`Bean`](macro@Bean)
//! next to the trait of the same name.

use proc_macro::TokenStream;

mod bean;

/// Derives `tarkib::Bean` for a struct with named fields or a unit struct.
///
/// Field attributes:
/// - `#[wire("value:${config.key}")]` populates the field from a property
/// - `#[wire("autowire:beanName")]` injects another bean (`Arc<T>` or
///   `Arc<dyn Trait>` fields)
///
/// Struct attributes, all optional:
/// `#[bean(name = "...", scope = "singleton" | "prototype",
/// provides = "dyn Trait", init = "method", destroy = "method",
/// initializing)]`. `provides` may be repeated.
///
/// The struct must implement `Default`; unbound fields keep their
/// default value. Private bound fields are recorded as such and fail to
/// populate.
///
/// ```rust,ignore
/// #[derive(Default, Bean)]
/// #[bean(name = "server", provides = "dyn Runner")]
/// pub struct Server {
///     #[wire("value:${server.port}")]
///     pub port: u16,
///     #[wire("autowire:repository")]
///     pub repository: Option<Arc<Repository>>,
/// }
/// ```
#[proc_macro_derive(Bean, attributes(bean, wire))]
pub fn derive_bean(input: TokenStream) -> TokenStream {
    bean::derive_bean(input.into()).into()
}
