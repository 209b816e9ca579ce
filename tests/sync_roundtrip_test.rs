//! End-to-end push/pull convergence through a real directory-backed store.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use blobsync::fs::{FileSystem, LocalFileSystem};
use blobsync::store::{BlobStore, DirStore};
use blobsync::types::{ContainerId, HashPolicy, SyncPlan, SyncSummary};
use blobsync::{Differ, Executor, Scanner, SyncResult};

const CONTAINER: ContainerId = ContainerId(1);

enum Direction {
	Push,
	Pull,
}

/// Scan, diff and execute one direction; returns the executed plan.
async fn run(
	direction: Direction,
	local_root: &Path,
	store_root: &Path,
	policy: HashPolicy,
) -> SyncResult<SyncPlan> {
	let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
	let store: Arc<dyn BlobStore> = Arc::new(DirStore::new(store_root));

	let scanner = Scanner::new(fs.clone(), store.clone(), None, &[], policy)?;
	let (local, remote) = scanner.scan_both(local_root, CONTAINER).await?;

	let differ = Differ::new(policy);
	let plan = match direction {
		Direction::Push => differ.diff_push(&local, &remote),
		Direction::Pull => differ.diff_pull(&local, &remote),
	};

	Executor::new(fs, store, 2)
		.retry_base_delay(std::time::Duration::from_millis(1))
		.execute(&plan, local_root, CONTAINER, &CancellationToken::new())
		.await?;
	Ok(plan)
}

async fn remote_inventory(
	store_root: &Path,
) -> std::collections::BTreeMap<String, blobsync::RemoteFile> {
	let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
	let store: Arc<dyn BlobStore> = Arc::new(DirStore::new(store_root));
	let scanner = Scanner::new(fs, store, None, &[], HashPolicy::Checksum).unwrap();
	scanner.scan_remote(CONTAINER).await.unwrap()
}

#[tokio::test]
async fn test_push_converges_and_is_idempotent() {
	let local = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();
	common::write_tree(local.path(), &[("a.txt", "alpha"), ("docs/b.txt", "beta")]);

	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert_eq!(plan.summary.to_upload, 2);
	assert_eq!(plan.summary.total, 2);

	let remote = remote_inventory(store.path()).await;
	assert_eq!(remote.len(), 2);
	assert_eq!(
		remote["a.txt"].meta.checksum,
		common::hash_contents(b"alpha")
	);

	// Nothing changed, so the second pass plans nothing
	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert!(plan.is_empty());
}

#[tokio::test]
async fn test_push_then_pull_roundtrip() {
	let source = TempDir::new().unwrap();
	let replica = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();
	common::write_tree(
		source.path(),
		&[("a.txt", "alpha"), ("docs/b.txt", "beta"), ("docs/deep/c.txt", "gamma")],
	);

	run(Direction::Push, source.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	let plan = run(Direction::Pull, replica.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert_eq!(plan.summary.to_download, 3);

	for (rel, contents) in [("a.txt", "alpha"), ("docs/b.txt", "beta"), ("docs/deep/c.txt", "gamma")]
	{
		assert_eq!(fs::read_to_string(replica.path().join(rel)).unwrap(), contents);
	}

	// Replica now matches the store exactly
	let plan = run(Direction::Pull, replica.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert!(plan.is_empty());
}

#[tokio::test]
async fn test_push_scenario_classification() {
	// local {a.txt, b.txt}, remote {a.txt, c.txt}:
	// push must upload b.txt and delete c.txt, nothing else
	let staging = TempDir::new().unwrap();
	let local = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();

	common::write_tree(staging.path(), &[("a.txt", "alpha"), ("c.txt", "gamma")]);
	run(Direction::Push, staging.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	common::write_tree(local.path(), &[("a.txt", "alpha"), ("b.txt", "beta")]);
	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();

	assert_eq!(
		plan.summary,
		SyncSummary { to_upload: 1, to_delete: 1, total: 2, ..Default::default() }
	);

	let remote = remote_inventory(store.path()).await;
	assert_eq!(remote.keys().cloned().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_empty_file_roundtrip() {
	let source = TempDir::new().unwrap();
	let replica = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();

	common::write_tree(source.path(), &[("empty.txt", "")]);
	let mtime = filetime::FileTime::from_unix_time(1_700_000_000, 0);
	filetime::set_file_mtime(source.path().join("empty.txt"), mtime).unwrap();

	run(Direction::Push, source.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	// The store cannot hold zero-byte payloads: the blob is a 1-byte
	// placeholder and the metadata carries the EMPTY_FILE flag
	let remote = remote_inventory(store.path()).await;
	let entry = &remote["empty.txt"];
	assert!(entry.meta.is_empty_file());
	assert_eq!(entry.size, 1);
	assert_eq!(entry.logical_size(), 0);

	run(Direction::Pull, replica.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	// Restored as a genuine zero-length file, not the placeholder
	let restored = replica.path().join("empty.txt");
	assert_eq!(fs::metadata(&restored).unwrap().len(), 0);
	let restored_mtime = filetime::FileTime::from_last_modification_time(
		&fs::metadata(&restored).unwrap(),
	);
	assert_eq!(restored_mtime.unix_seconds(), 1_700_000_000);
}

#[tokio::test]
async fn test_changed_push_replaces_stale_copy() {
	let local = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();

	common::write_tree(local.path(), &[("a.txt", "version one")]);
	run(Direction::Push, local.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	common::write_tree(local.path(), &[("a.txt", "version two, longer")]);
	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert_eq!(plan.summary.to_update, 1);

	// The stale record was cleaned up after the replacement landed: the
	// raw listing holds exactly one record for the path
	let store_impl = DirStore::new(store.path());
	let raw = store_impl.list_files(CONTAINER).await.unwrap();
	assert_eq!(raw.len(), 1);
	assert_eq!(raw[0].meta.checksum, common::hash_contents(b"version two, longer"));
}

#[tokio::test]
async fn test_pull_prunes_local_extras() {
	let source = TempDir::new().unwrap();
	let replica = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();

	common::write_tree(source.path(), &[("keep.txt", "keep")]);
	run(Direction::Push, source.path(), store.path(), HashPolicy::Checksum).await.unwrap();

	common::write_tree(replica.path(), &[("keep.txt", "keep"), ("extra.txt", "extra")]);
	let plan = run(Direction::Pull, replica.path(), store.path(), HashPolicy::Checksum)
		.await
		.unwrap();
	assert_eq!(plan.summary.to_delete, 1);

	assert!(replica.path().join("keep.txt").exists());
	assert!(!replica.path().join("extra.txt").exists());
}

#[tokio::test]
async fn test_modtime_policy_detects_touched_file() {
	let local = TempDir::new().unwrap();
	let store = TempDir::new().unwrap();

	common::write_tree(local.path(), &[("a.txt", "alpha")]);
	filetime::set_file_mtime(
		local.path().join("a.txt"),
		filetime::FileTime::from_unix_time(1_700_000_000, 0),
	)
	.unwrap();

	run(Direction::Push, local.path(), store.path(), HashPolicy::ModTimeSize).await.unwrap();

	// Same content, newer timestamp: mod-time mode plans an update
	filetime::set_file_mtime(
		local.path().join("a.txt"),
		filetime::FileTime::from_unix_time(1_700_000_100, 0),
	)
	.unwrap();

	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::ModTimeSize)
		.await
		.unwrap();
	assert_eq!(plan.summary.to_update, 1);

	// After the push the timestamps agree again
	let plan = run(Direction::Push, local.path(), store.path(), HashPolicy::ModTimeSize)
		.await
		.unwrap();
	assert!(plan.is_empty());
}

// vim: ts=4
