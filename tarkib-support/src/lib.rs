//! # Tarkib Support
//!
//! Shared utilities for the Tarkib bean factory.
//!
//! This crate provides:
//! - Rendering of reference chains for cycle errors
//! - Type name shortening for readable messages
//! - "Did you mean?" suggestions for unknown names

pub mod rendering;
