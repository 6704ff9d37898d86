//! Transfer module for moving data between remote object storage and local disk.
//!
//! This module provides the `ObjectStore` trait, the narrow contract the
//! pipeline needs from a bulk transfer service, and two implementations:
//!
//! - `FsObjectStore`: remote locations are paths under a local root, for
//!   mounted buckets and tests
//! - `CommandObjectStore`: shells out to a configurable transfer tool
//!
//! Remote locations are plain strings. Prefix locations (directories) end in
//! `/`; object locations do not.
//!
//! # Example
//!
//! ```ignore
//! use spindle_core::transfer::{FsObjectStore, FsStoreConfig, ObjectStore};
//!
//! let store = FsObjectStore::new(FsStoreConfig { root: "/mnt/bucket".into() });
//!
//! for object in store.list("runs/run1/pod5/").await? {
//!     println!("{} ({} bytes)", object.path, object.size_bytes);
//! }
//! ```

mod command_store;
mod config;
mod error;
mod fs_store;
mod traits;
mod types;

pub use command_store::CommandObjectStore;
pub use config::{CommandStoreConfig, FsStoreConfig};
pub use error::TransferError;
pub use fs_store::FsObjectStore;
pub use traits::ObjectStore;
pub use types::{join_location, relative_to, RemoteObject};
