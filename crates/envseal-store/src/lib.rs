//! # envseal store
//!
//! Storage abstraction for envseal. Provides a trait-based interface for
//! environment and public key persistence with filesystem and in-memory
//! implementations, plus private key directory scanning.
//!
//! ## Key Types
//!
//! - [`Store`] - The trait for all storage operations
//! - [`FsStore`] - Project directory on disk, atomic writes
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ProjectLayout`] - Where keys and environments live under the root
//! - [`KeyScan`] - Private keys found in a key directory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use envseal_store::{scan_key_dir, FsStore, Store};
//!
//! # fn main() -> envseal_store::Result<()> {
//! let store = FsStore::open("/path/to/project");
//! for name in store.list_environments()? {
//!     println!("{name}");
//! }
//!
//! let scan = scan_key_dir("/home/me/.ssh".as_ref(), 2048)?;
//! println!("{} usable keys", scan.keys.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fs;
pub mod keydir;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::{FsStore, ProjectLayout};
pub use keydir::{scan_key_dir, KeyScan, SkippedKey, WELL_KNOWN_KEYS};
pub use memory::MemoryStore;
pub use traits::{Store, StoreExt};
