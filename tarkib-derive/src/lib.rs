//! `#[derive(Bean)]` for Tarkib.
//!
//! Re-exported by the `tarkib` crate; depend on that instead.

pub use tarkib_macros::Bean;
