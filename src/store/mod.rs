//! Blob store contract.
//!
//! The remote backend is addressed purely through this trait. Backend
//! responses are decoded into the domain shapes at the adapter boundary;
//! the engine never inspects backend-specific variants.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::{ContainerId, LocalFile, RemoteFile, RemoteId};

mod dir;

pub use dir::DirStore;

/// Byte stream handed between the store and the local filesystem.
pub type ByteStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Operations the engine needs from the remote blob collection.
///
/// Implementations must surface caller cancellation as
/// [`SyncError::Cancelled`](crate::error::SyncError::Cancelled), distinct
/// from other failures.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// List every blob record in the container, newest first. Messages
	/// without a valid caption record are not ours and are skipped.
	async fn list_files(&self, container: ContainerId) -> SyncResult<Vec<RemoteFile>>;

	/// Store a new blob for `file`. Always appends: an existing record for
	/// the same path is left in place and becomes a stale copy, cleaned up
	/// by the executor once the replacement is confirmed stored.
	async fn upload(&self, container: ContainerId, file: &LocalFile) -> SyncResult<()>;

	/// Delete a blob by its opaque handle.
	async fn delete(&self, container: ContainerId, id: RemoteId) -> SyncResult<()>;

	/// Open a blob for reading.
	async fn download(
		&self,
		container: ContainerId,
		id: RemoteId,
		name: &str,
		size: u64,
	) -> SyncResult<ByteStream>;
}

// vim: ts=4
