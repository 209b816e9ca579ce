//! Local filesystem contract and implementation.
//!
//! The engine only touches the disk through the [`FileSystem`] trait, the
//! same way it only touches the remote side through
//! [`BlobStore`](crate::store::BlobStore).

use async_trait::async_trait;
use filetime::FileTime;
use ignore::WalkBuilder;
use std::io;
use std::path::{Component, Path};
use std::time::UNIX_EPOCH;
use tokio::io::AsyncWriteExt;

use crate::error::{SyncError, SyncResult};
use crate::store::ByteStream;
use crate::types::{HashPolicy, LocalFile};

/// Filesystem operations the engine needs.
#[async_trait]
pub trait FileSystem: Send + Sync {
	/// Recursively list regular files under `root` with relative
	/// slash-separated paths. Computes content checksums only when the
	/// policy asks for them.
	async fn list_files(&self, root: &Path, policy: HashPolicy) -> SyncResult<Vec<LocalFile>>;

	/// Create `path` and any missing parents.
	async fn ensure_dir(&self, path: &Path) -> SyncResult<()>;

	/// Write `data` to `path`, creating parent directories as needed. The
	/// file is either fully written or the call fails.
	async fn write_file(&self, path: &Path, data: ByteStream) -> SyncResult<()>;

	/// Set the modification time, in unix seconds.
	async fn set_mod_time(&self, path: &Path, mod_time: i64) -> SyncResult<()>;

	async fn delete_file(&self, path: &Path) -> SyncResult<()>;
}

/// Join the normal components of a relative path with forward slashes.
///
/// This is the canonical form every inventory is keyed on, stable across
/// platforms.
pub fn to_slash(path: &Path) -> String {
	path.components()
		.filter_map(|c| match c {
			Component::Normal(part) => part.to_str(),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("/")
}

/// The real local filesystem.
pub struct LocalFileSystem;

impl LocalFileSystem {
	pub fn new() -> Self {
		LocalFileSystem
	}
}

impl Default for LocalFileSystem {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl FileSystem for LocalFileSystem {
	async fn list_files(&self, root: &Path, policy: HashPolicy) -> SyncResult<Vec<LocalFile>> {
		let root = root.to_path_buf();
		tokio::task::spawn_blocking(move || walk_tree(&root, policy))
			.await
			.map_err(|e| SyncError::Io(io::Error::new(io::ErrorKind::Other, e)))?
	}

	async fn ensure_dir(&self, path: &Path) -> SyncResult<()> {
		Ok(tokio::fs::create_dir_all(path).await?)
	}

	async fn write_file(&self, path: &Path, mut data: ByteStream) -> SyncResult<()> {
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let mut file = tokio::fs::File::create(path).await?;
		tokio::io::copy(&mut data, &mut file).await?;
		file.flush().await?;
		Ok(())
	}

	async fn set_mod_time(&self, path: &Path, mod_time: i64) -> SyncResult<()> {
		Ok(filetime::set_file_mtime(path, FileTime::from_unix_time(mod_time, 0))?)
	}

	async fn delete_file(&self, path: &Path) -> SyncResult<()> {
		Ok(tokio::fs::remove_file(path).await?)
	}
}

fn walk_tree(root: &Path, policy: HashPolicy) -> SyncResult<Vec<LocalFile>> {
	let mut files = Vec::new();

	// Standard filters off: synchronized trees routinely contain dotfiles
	// and ignore files that must travel too.
	let walker = WalkBuilder::new(root).standard_filters(false).follow_links(false).build();

	for entry in walker {
		let entry = entry.map_err(|e| SyncError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
		if !entry.file_type().map_or(false, |t| t.is_file()) {
			continue;
		}
		let meta = entry
			.metadata()
			.map_err(|e| SyncError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
		let rel = entry
			.path()
			.strip_prefix(root)
			.map_err(|e| SyncError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
		let path = to_slash(rel);
		if path.is_empty() {
			continue;
		}

		let checksum = match policy {
			HashPolicy::Checksum => hash_file(entry.path())?,
			HashPolicy::ModTimeSize => String::new(),
		};

		files.push(LocalFile {
			path,
			checksum,
			mod_time: unix_mod_time(&meta),
			size: meta.len(),
			abs_path: entry.path().to_path_buf(),
		});
	}

	Ok(files)
}

fn hash_file(path: &Path) -> SyncResult<String> {
	let mut file = std::fs::File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(hex::encode(hasher.finalize().as_bytes()))
}

fn unix_mod_time(meta: &std::fs::Metadata) -> i64 {
	meta.modified()
		.ok()
		.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}


// vim: ts=4
