//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use blobsync::types::LocalFile;

/// Write a small tree of text files under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
	for (rel, contents) in files {
		let path = root.join(rel);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(path, contents).unwrap();
	}
}

/// Build the `LocalFile` record the scanner would produce for `rel`.
pub fn local_file(root: &Path, rel: &str) -> LocalFile {
	let abs_path = root.join(rel);
	let meta = fs::metadata(&abs_path).unwrap();
	let mod_time = meta
		.modified()
		.unwrap()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0);
	LocalFile {
		path: rel.replace('\\', "/"),
		checksum: hash_contents(&fs::read(&abs_path).unwrap()),
		mod_time,
		size: meta.len(),
		abs_path,
	}
}

pub fn hash_contents(data: &[u8]) -> String {
	let mut hasher = blake3::Hasher::new();
	hasher.update(data);
	hex::encode(hasher.finalize().as_bytes())
}

// vim: ts=4
