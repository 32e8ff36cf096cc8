//! Configuration properties.
//!
//! - [`PropertyStore`]: flattened `key → string` entries behind a lock
//! - [`FromProperty`]: coercion of a stored string into a scalar
//! - [`Target`]: a dynamic destination for [`PropertyStore::retrieve`]

mod coerce;
mod flatten;
mod store;

pub use coerce::FromProperty;
pub use store::{PropertyStore, Target};
