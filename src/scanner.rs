//! Inventory construction.
//!
//! Builds the canonical path-keyed inventories both diff directions join
//! on. Scope and exclusion filtering happen here, identically for both
//! sides, so a push or pull only ever sees a consistent slice of the tree.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::fs::FileSystem;
use crate::store::BlobStore;
use crate::types::{ContainerId, HashPolicy, LocalFile, RemoteFile};

pub struct Scanner {
	fs: Arc<dyn FileSystem>,
	store: Arc<dyn BlobStore>,
	scope: Option<String>,
	exclude: Option<GlobSet>,
	policy: HashPolicy,
}

impl Scanner {
	pub fn new(
		fs: Arc<dyn FileSystem>,
		store: Arc<dyn BlobStore>,
		scope: Option<&str>,
		exclude_patterns: &[String],
		policy: HashPolicy,
	) -> SyncResult<Scanner> {
		let exclude = build_exclusions(exclude_patterns)?;
		Ok(Scanner { fs, store, scope: normalize_scope(scope), exclude, policy })
	}

	/// Scan both sides concurrently.
	pub async fn scan_both(
		&self,
		root: &Path,
		container: ContainerId,
	) -> SyncResult<(BTreeMap<String, LocalFile>, BTreeMap<String, RemoteFile>)> {
		futures::future::try_join(self.scan_local(root), self.scan_remote(container)).await
	}

	/// Walk the local tree into an inventory. The root is created when
	/// absent, so a first pull into a fresh directory just works.
	pub async fn scan_local(&self, root: &Path) -> SyncResult<BTreeMap<String, LocalFile>> {
		self.fs
			.ensure_dir(root)
			.await
			.map_err(|e| SyncError::Scan { side: "local", source: Box::new(e) })?;
		let files = self
			.fs
			.list_files(root, self.policy)
			.await
			.map_err(|e| SyncError::Scan { side: "local", source: Box::new(e) })?;

		let mut result = BTreeMap::new();
		for file in files {
			if self.retained(&file.path) {
				result.insert(file.path.clone(), file);
			}
		}
		Ok(result)
	}

	/// List the remote collection into an inventory, de-duplicating by
	/// path. When the store holds several records for one path the highest
	/// remote id wins: the most recent upload is authoritative no matter
	/// what order the backend enumerates in.
	pub async fn scan_remote(
		&self,
		container: ContainerId,
	) -> SyncResult<BTreeMap<String, RemoteFile>> {
		let files = self
			.store
			.list_files(container)
			.await
			.map_err(|e| SyncError::Scan { side: "remote", source: Box::new(e) })?;

		let mut result: BTreeMap<String, RemoteFile> = BTreeMap::new();
		for file in files {
			let path = file.meta.path.replace('\\', "/");
			if !self.retained(&path) {
				continue;
			}
			match result.get(&path) {
				Some(existing) if existing.remote_id >= file.remote_id => {}
				_ => {
					result.insert(path, file);
				}
			}
		}
		Ok(result)
	}

	fn retained(&self, path: &str) -> bool {
		if let Some(scope) = &self.scope {
			if !in_scope(path, scope) {
				return false;
			}
		}
		if let Some(exclude) = &self.exclude {
			if exclude.is_match(path) {
				return false;
			}
		}
		true
	}
}

/// An entry is in scope when its path equals the scope or lives below it.
fn in_scope(path: &str, scope: &str) -> bool {
	match path.strip_prefix(scope) {
		Some(rest) => rest.is_empty() || rest.starts_with('/'),
		None => false,
	}
}

fn normalize_scope(scope: Option<&str>) -> Option<String> {
	let scope = scope?.replace('\\', "/");
	let scope = scope.trim_matches('/');
	if scope.is_empty() {
		None
	} else {
		Some(scope.to_string())
	}
}

fn build_exclusions(patterns: &[String]) -> SyncResult<Option<GlobSet>> {
	if patterns.is_empty() {
		return Ok(None);
	}
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| SyncError::InvalidConfig {
			message: format!("bad exclude pattern {:?}: {}", pattern, e),
		})?;
		builder.add(glob);
	}
	let set = builder
		.build()
		.map_err(|e| SyncError::InvalidConfig { message: format!("exclude patterns: {}", e) })?;
	Ok(Some(set))
}


// vim: ts=4
