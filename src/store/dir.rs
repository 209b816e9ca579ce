//! Directory-backed blob store.
//!
//! Stores each blob as `<root>/<container>/<id>.blob` with a JSON caption
//! sidecar `<id>.json`, preserving the observable semantics of the real
//! message-based backend: ids are allocated monotonically, uploads always
//! append, one path may own several records, zero-byte payloads are not
//! accepted and are stored as a 1-byte placeholder flagged `EMPTY_FILE`.
//!
//! The caption is written after the blob, so a record either lists
//! completely or not at all; a crash mid-upload leaves an orphaned blob
//! that no listing will ever return.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{BlobStore, ByteStream};
use crate::error::{SyncError, SyncResult};
use crate::types::{ContainerId, FileMeta, LocalFile, RemoteFile, RemoteId, FLAG_EMPTY_FILE};

pub struct DirStore {
	root: PathBuf,
	// Next id per container, lazily seeded from the directory contents
	next_ids: Mutex<HashMap<i64, u64>>,
}

impl DirStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		DirStore { root: root.into(), next_ids: Mutex::new(HashMap::new()) }
	}

	fn container_dir(&self, container: ContainerId) -> PathBuf {
		self.root.join(container.0.to_string())
	}

	fn blob_path(dir: &Path, id: RemoteId) -> PathBuf {
		dir.join(format!("{}.blob", id.0))
	}

	fn caption_path(dir: &Path, id: RemoteId) -> PathBuf {
		dir.join(format!("{}.json", id.0))
	}

	async fn allocate_id(&self, container: ContainerId, dir: &Path) -> SyncResult<RemoteId> {
		let mut next_ids = self.next_ids.lock().await;
		let next = match next_ids.get(&container.0) {
			Some(n) => *n,
			None => next_free_id(dir).await?,
		};
		next_ids.insert(container.0, next + 1);
		Ok(RemoteId(next))
	}
}

#[async_trait]
impl BlobStore for DirStore {
	async fn list_files(&self, container: ContainerId) -> SyncResult<Vec<RemoteFile>> {
		let dir = self.container_dir(container);
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let mut files = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some("json") {
				continue;
			}
			let id = match path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok())
			{
				Some(id) => RemoteId(id),
				None => continue,
			};
			let caption = fs::read_to_string(&path).await?;
			let meta = match FileMeta::from_caption(&caption) {
				Some(meta) => meta,
				None => continue, // foreign message
			};
			let size = fs::metadata(Self::blob_path(&dir, id))
				.await
				.map(|m| m.len())
				.unwrap_or(0);
			files.push(RemoteFile { meta, remote_id: id, size });
		}

		// Native enumeration order of the backend: newest first
		files.sort_by(|a, b| b.remote_id.cmp(&a.remote_id));
		Ok(files)
	}

	async fn upload(&self, container: ContainerId, file: &LocalFile) -> SyncResult<()> {
		let dir = self.container_dir(container);
		fs::create_dir_all(&dir).await?;

		let id = self.allocate_id(container, &dir).await?;
		let mut meta = FileMeta {
			path: file.path.clone(),
			checksum: file.checksum.clone(),
			mod_time: file.mod_time,
			flags: String::new(),
		};

		let blob_path = Self::blob_path(&dir, id);
		if file.size == 0 {
			meta.flags = FLAG_EMPTY_FILE.to_string();
			fs::write(&blob_path, [0u8]).await?;
		} else {
			let mut src = fs::File::open(&file.abs_path).await?;
			let mut dst = fs::File::create(&blob_path).await?;
			tokio::io::copy(&mut src, &mut dst).await?;
			dst.flush().await?;
		}

		// Caption last: its presence marks the record complete
		let caption = meta
			.to_caption()
			.map_err(|e| SyncError::Store { message: format!("caption for {}: {}", file.path, e) })?;
		fs::write(Self::caption_path(&dir, id), caption).await?;
		Ok(())
	}

	async fn delete(&self, container: ContainerId, id: RemoteId) -> SyncResult<()> {
		let dir = self.container_dir(container);
		match fs::remove_file(Self::caption_path(&dir, id)).await {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(SyncError::Store { message: format!("no such blob {}", id) });
			}
			Err(e) => return Err(e.into()),
		}
		// The caption is gone, so the record no longer lists; a leftover
		// blob is garbage, not state
		match fs::remove_file(Self::blob_path(&dir, id)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}

	async fn download(
		&self,
		container: ContainerId,
		id: RemoteId,
		_name: &str,
		_size: u64,
	) -> SyncResult<ByteStream> {
		let dir = self.container_dir(container);
		match fs::File::open(Self::blob_path(&dir, id)).await {
			Ok(file) => Ok(Box::new(file)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				Err(SyncError::Store { message: format!("no such blob {}", id) })
			}
			Err(e) => Err(e.into()),
		}
	}
}

async fn next_free_id(dir: &Path) -> SyncResult<u64> {
	let mut max = 0u64;
	let mut entries = match fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
		Err(e) => return Err(e.into()),
	};
	while let Some(entry) = entries.next_entry().await? {
		if let Some(id) = entry
			.path()
			.file_stem()
			.and_then(|s| s.to_str())
			.and_then(|s| s.parse::<u64>().ok())
		{
			max = max.max(id);
		}
	}
	Ok(max + 1)
}

// vim: ts=4
