//! Domain entities shared by the scanner, differ and executor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Flag marking a blob stored as a 1-byte placeholder standing in for a
/// genuine zero-length file. The backend rejects zero-byte payloads, so the
/// placeholder carries the file and this flag carries the truth.
pub const FLAG_EMPTY_FILE: &str = "EMPTY_FILE";

/// Opaque handle of a stored blob.
///
/// Ordering follows upload order in the append-mostly store; when a path has
/// duplicate records, the highest id is the most recent upload and wins
/// de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteId(pub u64);

impl fmt::Display for RemoteId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Identifier of a remote blob collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub i64);

impl fmt::Display for ContainerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Metadata record stored in the caption of a remote message.
///
/// Field names are one letter on the wire to keep captions compact; empty
/// fields are omitted entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
	#[serde(rename = "p")]
	pub path: String,
	#[serde(rename = "m", default, skip_serializing_if = "String::is_empty")]
	pub checksum: String,
	#[serde(rename = "t", default, skip_serializing_if = "mod_time_unknown")]
	pub mod_time: i64,
	#[serde(rename = "f", default, skip_serializing_if = "String::is_empty")]
	pub flags: String,
}

fn mod_time_unknown(t: &i64) -> bool {
	*t == 0
}

impl FileMeta {
	/// Serialize into the caption record stored alongside the blob.
	pub fn to_caption(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Parse a message caption. Returns `None` for captions that are not
	/// valid records (foreign messages living in the same container).
	pub fn from_caption(caption: &str) -> Option<FileMeta> {
		let meta: FileMeta = serde_json::from_str(caption).ok()?;
		if meta.path.is_empty() || (meta.checksum.is_empty() && meta.mod_time == 0) {
			return None;
		}
		Some(meta)
	}

	pub fn is_empty_file(&self) -> bool {
		self.flags == FLAG_EMPTY_FILE
	}
}

/// A file found on the local filesystem. Rebuilt on every scan and owned by
/// the scan that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
	/// Relative slash-separated path; the join key between inventories
	pub path: String,
	/// Content hash, empty when hashing is skipped
	pub checksum: String,
	/// Modification time in unix seconds, 0 = unknown
	pub mod_time: i64,
	pub size: u64,
	/// Absolute location for reading the content
	pub abs_path: PathBuf,
}

/// A file stored in the remote blob collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
	pub meta: FileMeta,
	/// The sole handle needed to fetch or delete the blob
	pub remote_id: RemoteId,
	/// Stored blob size; 1 for an EMPTY_FILE placeholder
	pub size: u64,
}

impl RemoteFile {
	/// Logical content size: an EMPTY_FILE placeholder counts as zero bytes
	/// no matter what the stored blob measures.
	pub fn logical_size(&self) -> u64 {
		if self.meta.is_empty_file() {
			0
		} else {
			self.size
		}
	}
}

/// The four things a plan can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
	Upload,
	Download,
	DeleteRemote,
	DeleteLocal,
}

impl SyncAction {
	pub fn is_transfer(&self) -> bool {
		matches!(self, SyncAction::Upload | SyncAction::Download)
	}
}

impl fmt::Display for SyncAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncAction::Upload => write!(f, "upload"),
			SyncAction::Download => write!(f, "download"),
			SyncAction::DeleteRemote => write!(f, "delete remote"),
			SyncAction::DeleteLocal => write!(f, "delete local"),
		}
	}
}

/// One unit of work in a plan.
///
/// The side an action operates on must be present; both sides are present on
/// updates so the executor can delete the stale copy after the replacement
/// has landed.
#[derive(Debug, Clone)]
pub struct SyncItem {
	pub path: String,
	pub action: SyncAction,
	pub local: Option<LocalFile>,
	pub remote: Option<RemoteFile>,
	pub reason: &'static str,
}

/// Counts of planned actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
	pub to_upload: usize,
	pub to_update: usize,
	pub to_download: usize,
	pub to_delete: usize,
	pub total: usize,
}

impl fmt::Display for SyncSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} new upload(s), {} update(s), {} download(s), {} deletion(s) - {} action(s) total",
			self.to_upload, self.to_update, self.to_download, self.to_delete, self.total
		)
	}
}

/// Immutable action plan produced by the differ, consumed once by the
/// executor.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
	pub items: Vec<SyncItem>,
	pub summary: SyncSummary,
}

impl SyncPlan {
	/// The canonical "nothing to do" signal.
	pub fn is_empty(&self) -> bool {
		self.summary.total == 0
	}
}

/// Comparability key used to decide whether two entries carry the same
/// content. Selected once per operation and applied uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashPolicy {
	/// Exact byte identity via content hash
	Checksum,
	/// Cheap `(mod_time, size)` pair when hashing is skipped
	ModTimeSize,
}


// vim: ts=4
