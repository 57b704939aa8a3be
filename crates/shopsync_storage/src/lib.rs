//! # shopsync storage
//!
//! The local record store as seen by the shopsync synchronizers.
//!
//! The host application owns persistence, transactions and schemas. This
//! crate only describes the capability the synchronization core consumes.
//!
//! ## Design Principles
//!
//! - Records are untyped [`shopsync_codec::Record`]s grouped by model name
//! - Unique constraints are declared at runtime start and enforced by the store
//! - Must be `Send + Sync`; jobs run on parallel workers
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests and tooling
//!
//! ## Example
//!
//! ```rust
//! use shopsync_codec::Record;
//! use shopsync_storage::{InMemoryStore, LocalStore};
//!
//! let store = InMemoryStore::new();
//! let id = store.create("product.category", Record::new().with("name", "Shoes")).unwrap();
//! assert_eq!(store.read("product.category", id).unwrap().text("name"), Some("Shoes"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use id::LocalId;
pub use memory::InMemoryStore;
pub use store::{Domain, LocalStore};
