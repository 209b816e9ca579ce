//! Plan computation.
//!
//! Pure and side-effect-free: two inventories in, an ordered action plan
//! and its summary out. Inventories are sorted maps, so for a given pair
//! of inventories and comparison policy the produced plan is identical
//! run to run.

use std::collections::BTreeMap;

use crate::types::{
	HashPolicy, LocalFile, RemoteFile, SyncAction, SyncItem, SyncPlan, SyncSummary,
};

pub struct Differ {
	policy: HashPolicy,
}

impl Differ {
	pub fn new(policy: HashPolicy) -> Self {
		Differ { policy }
	}

	/// Plan to make the remote side match the local tree.
	pub fn diff_push(
		&self,
		local: &BTreeMap<String, LocalFile>,
		remote: &BTreeMap<String, RemoteFile>,
	) -> SyncPlan {
		let mut items = Vec::new();
		let mut summary = SyncSummary::default();

		for (path, local_file) in local {
			match remote.get(path) {
				None => {
					items.push(SyncItem {
						path: path.clone(),
						action: SyncAction::Upload,
						local: Some(local_file.clone()),
						remote: None,
						reason: "New file",
					});
					summary.to_upload += 1;
				}
				Some(remote_file) => {
					if self.should_update(local_file, remote_file) {
						// The stale remote entry rides along so the
						// executor can delete it once the replacement
						// is stored
						items.push(SyncItem {
							path: path.clone(),
							action: SyncAction::Upload,
							local: Some(local_file.clone()),
							remote: Some(remote_file.clone()),
							reason: "Changed",
						});
						summary.to_update += 1;
					}
				}
			}
		}

		for (path, remote_file) in remote {
			if !local.contains_key(path) {
				items.push(SyncItem {
					path: path.clone(),
					action: SyncAction::DeleteRemote,
					local: None,
					remote: Some(remote_file.clone()),
					reason: "Deleted locally",
				});
				summary.to_delete += 1;
			}
		}

		summary.total = items.len();
		SyncPlan { items, summary }
	}

	/// Mirror image of [`diff_push`](Self::diff_push): plan to make the
	/// local tree match the remote side.
	pub fn diff_pull(
		&self,
		local: &BTreeMap<String, LocalFile>,
		remote: &BTreeMap<String, RemoteFile>,
	) -> SyncPlan {
		let mut items = Vec::new();
		let mut summary = SyncSummary::default();

		for (path, remote_file) in remote {
			match local.get(path) {
				None => {
					items.push(SyncItem {
						path: path.clone(),
						action: SyncAction::Download,
						local: None,
						remote: Some(remote_file.clone()),
						reason: "New remote file",
					});
					summary.to_download += 1;
				}
				Some(local_file) => {
					if self.should_update(local_file, remote_file) {
						items.push(SyncItem {
							path: path.clone(),
							action: SyncAction::Download,
							local: Some(local_file.clone()),
							remote: Some(remote_file.clone()),
							reason: "Changed remote",
						});
						summary.to_update += 1;
					}
				}
			}
		}

		for (path, local_file) in local {
			if !remote.contains_key(path) {
				items.push(SyncItem {
					path: path.clone(),
					action: SyncAction::DeleteLocal,
					local: Some(local_file.clone()),
					remote: None,
					reason: "Deleted remotely",
				});
				summary.to_delete += 1;
			}
		}

		summary.total = items.len();
		SyncPlan { items, summary }
	}

	fn should_update(&self, local: &LocalFile, remote: &RemoteFile) -> bool {
		match self.policy {
			HashPolicy::ModTimeSize => {
				remote.meta.mod_time != local.mod_time || remote.logical_size() != local.size
			}
			HashPolicy::Checksum => remote.meta.checksum != local.checksum,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{FileMeta, RemoteId, FLAG_EMPTY_FILE};
	use std::path::PathBuf;

	fn local(path: &str, checksum: &str, mod_time: i64, size: u64) -> (String, LocalFile) {
		(
			path.to_string(),
			LocalFile {
				path: path.to_string(),
				checksum: checksum.to_string(),
				mod_time,
				size,
				abs_path: PathBuf::from("/tmp").join(path),
			},
		)
	}

	fn remote(path: &str, checksum: &str, mod_time: i64, size: u64, id: u64) -> (String, RemoteFile) {
		(
			path.to_string(),
			RemoteFile {
				meta: FileMeta {
					path: path.to_string(),
					checksum: checksum.to_string(),
					mod_time,
					flags: String::new(),
				},
				remote_id: RemoteId(id),
				size,
			},
		)
	}

	#[test]
	fn test_push_scenario() {
		let local: BTreeMap<_, _> =
			vec![local("a.txt", "H1", 100, 3), local("b.txt", "H2", 100, 3)].into_iter().collect();
		let remote: BTreeMap<_, _> =
			vec![remote("a.txt", "H1", 100, 3, 1), remote("c.txt", "H3", 100, 3, 2)]
				.into_iter()
				.collect();

		let plan = Differ::new(HashPolicy::Checksum).diff_push(&local, &remote);

		assert_eq!(plan.summary, SyncSummary { to_upload: 1, to_delete: 1, total: 2, ..Default::default() });
		let upload = plan.items.iter().find(|i| i.action == SyncAction::Upload).unwrap();
		assert_eq!(upload.path, "b.txt");
		assert_eq!(upload.reason, "New file");
		assert!(upload.remote.is_none());
		let delete = plan.items.iter().find(|i| i.action == SyncAction::DeleteRemote).unwrap();
		assert_eq!(delete.path, "c.txt");
		assert_eq!(delete.reason, "Deleted locally");
	}

	#[test]
	fn test_unchanged_inventories_give_empty_plan() {
		let local: BTreeMap<_, _> = vec![local("a.txt", "H1", 100, 3)].into_iter().collect();
		let remote: BTreeMap<_, _> = vec![remote("a.txt", "H1", 200, 3, 1)].into_iter().collect();

		let differ = Differ::new(HashPolicy::Checksum);
		assert!(differ.diff_push(&local, &remote).is_empty());
		assert!(differ.diff_pull(&local, &remote).is_empty());
	}

	#[test]
	fn test_comparison_policy_switch() {
		// Same hash and size, different mod time
		let local: BTreeMap<_, _> = vec![local("p", "H1", 100, 10)].into_iter().collect();
		let remote: BTreeMap<_, _> = vec![remote("p", "H1", 200, 10, 1)].into_iter().collect();

		let plan = Differ::new(HashPolicy::Checksum).diff_push(&local, &remote);
		assert!(plan.is_empty());

		let plan = Differ::new(HashPolicy::ModTimeSize).diff_push(&local, &remote);
		assert_eq!(plan.summary.to_update, 1);
		assert_eq!(plan.items[0].reason, "Changed");
		// Update items carry the stale remote entry for cleanup
		assert!(plan.items[0].remote.is_some());
	}

	#[test]
	fn test_empty_file_placeholder_compares_as_zero_bytes() {
		let local: BTreeMap<_, _> = vec![local("e", "", 100, 0)].into_iter().collect();
		let mut remote_file = remote("e", "", 100, 1, 1).1;
		remote_file.meta.flags = FLAG_EMPTY_FILE.to_string();
		let remote: BTreeMap<_, _> = vec![("e".to_string(), remote_file)].into_iter().collect();

		// Blob size is 1 (the placeholder) but the logical size is 0, so
		// mod-time mode sees no difference
		let plan = Differ::new(HashPolicy::ModTimeSize).diff_push(&local, &remote);
		assert!(plan.is_empty());
	}

	#[test]
	fn test_changed_pull_carries_both_sides() {
		let local: BTreeMap<_, _> = vec![local("a", "H1", 100, 3)].into_iter().collect();
		let remote: BTreeMap<_, _> = vec![remote("a", "H2", 200, 4, 9)].into_iter().collect();

		let plan = Differ::new(HashPolicy::Checksum).diff_pull(&local, &remote);
		assert_eq!(plan.summary.to_update, 1);
		let item = &plan.items[0];
		assert_eq!(item.action, SyncAction::Download);
		assert_eq!(item.reason, "Changed remote");
		assert!(item.local.is_some());
		assert!(item.remote.is_some());
	}
}

// vim: ts=4
