//! # blobsync - directory <-> blob-store synchronizer
//!
//! blobsync reconciles a local directory tree against a remote blob
//! collection: a messaging-style backend used as an append-mostly blob
//! store addressed by opaque message identifiers. Each run scans both
//! sides into path-keyed inventories, diffs them into a minimal action
//! plan, and executes that plan under bounded concurrency - transfers
//! first, best-effort deletions after, so an interrupted run never loses
//! data that had no replacement yet.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use blobsync::{Differ, Executor, Scanner};
//! use blobsync::fs::LocalFileSystem;
//! use blobsync::store::DirStore;
//! use blobsync::types::{ContainerId, HashPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fs = Arc::new(LocalFileSystem::new());
//!     let store = Arc::new(DirStore::new("./store"));
//!     let container = ContainerId(1);
//!
//!     let scanner = Scanner::new(fs.clone(), store.clone(), None, &[], HashPolicy::Checksum)?;
//!     let (local, remote) = scanner.scan_both("./data".as_ref(), container).await?;
//!
//!     let plan = Differ::new(HashPolicy::Checksum).diff_push(&local, &remote);
//!     Executor::new(fs, store, 4)
//!         .execute(&plan, "./data".as_ref(), container, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod differ;
pub mod error;
pub mod executor;
pub mod fs;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod scanner;
pub mod store;
pub mod types;

// Re-export commonly used types and functions
pub use config::Config;
pub use differ::Differ;
pub use error::{SyncError, SyncResult};
pub use executor::Executor;
pub use scanner::Scanner;
pub use types::{
	ContainerId, FileMeta, HashPolicy, LocalFile, RemoteFile, RemoteId, SyncAction, SyncItem,
	SyncPlan, SyncSummary,
};

// vim: ts=4
