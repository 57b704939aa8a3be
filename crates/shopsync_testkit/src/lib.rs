//! # shopsync testkit
//!
//! Test utilities for shopsync.
//!
//! This crate provides:
//! - [`FakeMagento`], an in-memory Magento answering the XML-RPC methods
//!   of the connectors, with a call log and fault injection
//! - [`TestShop`], the Magento connectors wired to it
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopsync_testkit::prelude::*;
//!
//! #[test]
//! fn exports_a_customer() {
//!     let shop = TestShop::new();
//!     // ... create records, run jobs, inspect shop.magento
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
