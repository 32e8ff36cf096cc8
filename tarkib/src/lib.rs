//! # Tarkib
//!
//! A bean factory: named components are described once, then created,
//! wired from configuration and from each other, and cached on request.
//!
//! ```rust
//! use std::sync::Arc;
//! use tarkib::prelude::*;
//!
//! #[derive(Default, Bean)]
//! #[bean(name = "dataSource")]
//! pub struct DataSource {
//!     #[wire("value:${db.url}")]
//!     pub url: String,
//! }
//!
//! #[derive(Default, Bean)]
//! #[bean(name = "repository", scope = "prototype")]
//! pub struct Repository {
//!     #[wire("autowire:dataSource")]
//!     pub source: Option<Arc<DataSource>>,
//! }
//!
//! let factory = BeanFactory::builder()
//!     .property("db.url", "postgres://localhost")
//!     .bean::<DataSource>()
//!     .bean::<Repository>()
//!     .build()
//!     .unwrap();
//!
//! let repository = factory.get_bean_as::<Repository>("repository").unwrap();
//! assert_eq!(repository.source.as_ref().unwrap().url, "postgres://localhost");
//! ```

pub use tarkib_container::*;
pub use tarkib_container::definition::Bean;
pub use tarkib_derive::Bean;
pub use tarkib_support::rendering;

pub mod prelude {
    pub use tarkib_container::prelude::*;
    pub use tarkib_derive::Bean;
}
