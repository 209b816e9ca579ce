//! Plan execution.
//!
//! Two phases: transfers run first under a bounded worker pool sharing one
//! cancellation scope, then deletions run sequentially and best-effort.
//! Deletions are deferred until every transfer has landed so a crash
//! mid-run leaves "updates not applied yet", never "data lost".

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::fs::FileSystem;
use crate::logging::{debug, info, warn};
use crate::progress::{format_size, ProgressTask, SyncReporter};
use crate::retry::with_retry;
use crate::store::BlobStore;
use crate::types::{ContainerId, RemoteFile, SyncAction, SyncItem, SyncPlan};

pub struct Executor {
	fs: Arc<dyn FileSystem>,
	store: Arc<dyn BlobStore>,
	workers: usize,
	upload_attempts: u32,
	download_attempts: u32,
	retry_base_delay: Duration,
	reporter: Option<Arc<dyn SyncReporter>>,
}

impl Executor {
	pub fn new(fs: Arc<dyn FileSystem>, store: Arc<dyn BlobStore>, workers: usize) -> Self {
		Executor {
			fs,
			store,
			workers: workers.max(1),
			upload_attempts: 1,
			download_attempts: 5,
			retry_base_delay: Duration::from_secs(1),
			reporter: None,
		}
	}

	pub fn with_reporter(mut self, reporter: Arc<dyn SyncReporter>) -> Self {
		self.reporter = Some(reporter);
		self
	}

	/// Attempt count for uploads; 1 reproduces the historical
	/// upload-is-never-retried behavior.
	pub fn upload_attempts(mut self, attempts: u32) -> Self {
		self.upload_attempts = attempts.max(1);
		self
	}

	pub fn download_attempts(mut self, attempts: u32) -> Self {
		self.download_attempts = attempts.max(1);
		self
	}

	pub fn retry_base_delay(mut self, delay: Duration) -> Self {
		self.retry_base_delay = delay;
		self
	}

	/// Drive `plan` to completion.
	///
	/// Returns `Ok` only when the transfer phase fully succeeded; delete
	/// phase failures are logged, not propagated.
	pub async fn execute(
		&self,
		plan: &SyncPlan,
		root: &Path,
		container: ContainerId,
		cancel: &CancellationToken,
	) -> SyncResult<()> {
		if plan.is_empty() {
			info!("everything is up to date");
			return Ok(());
		}

		validate(plan)?;

		if let Some(reporter) = &self.reporter {
			if !reporter.confirm_plan(plan)? {
				info!("sync cancelled by user");
				return Ok(());
			}
			reporter.set_total_files(plan.summary.total);
		}

		let run = Uuid::new_v4();
		debug!(
			"run {}: {} action(s) against container {}, {} worker(s)",
			run, plan.summary.total, container, self.workers
		);

		let mut transfers = Vec::new();
		let mut deletions = Vec::new();
		for item in &plan.items {
			if item.action.is_transfer() {
				transfers.push(item.clone());
			} else {
				deletions.push(item.clone());
			}
		}

		self.run_transfers(transfers, root, container, cancel).await?;

		if let Some(reporter) = &self.reporter {
			reporter.wait();
		}

		// Deletions are independent of each other and of the sync goal:
		// log and keep going
		for item in &deletions {
			if cancel.is_cancelled() {
				return Err(SyncError::Cancelled);
			}
			if let Err(err) = self.delete_item(item, root, container).await {
				warn!("delete failed for {}: {}", item.path, err);
			}
		}

		debug!("run {} finished", run);
		Ok(())
	}

	async fn run_transfers(
		&self,
		items: Vec<SyncItem>,
		root: &Path,
		container: ContainerId,
		cancel: &CancellationToken,
	) -> SyncResult<()> {
		if items.is_empty() {
			return Ok(());
		}

		let semaphore = Arc::new(Semaphore::new(self.workers));
		let mut tasks: JoinSet<SyncResult<()>> = JoinSet::new();

		for item in items {
			if cancel.is_cancelled() {
				break;
			}
			let permit = tokio::select! {
				permit = semaphore.clone().acquire_owned() => match permit {
					Ok(permit) => permit,
					Err(_) => break,
				},
				_ = cancel.cancelled() => break,
			};

			let ctx = TransferContext {
				fs: self.fs.clone(),
				store: self.store.clone(),
				reporter: self.reporter.clone(),
				root: root.to_path_buf(),
				container,
				upload_attempts: self.upload_attempts,
				download_attempts: self.download_attempts,
				retry_base_delay: self.retry_base_delay,
				cancel: cancel.clone(),
			};
			tasks.spawn(async move {
				let _permit = permit;
				if ctx.cancel.is_cancelled() {
					return Err(SyncError::Cancelled);
				}
				let result = ctx.transfer(&item).await;
				if result.is_err() {
					// First failure cancels the whole scope; queued items
					// are abandoned, in-flight ones observe the token
					ctx.cancel.cancel();
				}
				result
			});
		}

		let mut first_err: Option<SyncError> = None;
		while let Some(joined) = tasks.join_next().await {
			let result = match joined {
				Ok(result) => result,
				Err(err) => Err(SyncError::Io(io::Error::new(io::ErrorKind::Other, err))),
			};
			if let Err(err) = result {
				let replace = match &first_err {
					None => true,
					// A real failure explains the run better than the
					// cancellations it triggered
					Some(existing) => existing.is_cancelled() && !err.is_cancelled(),
				};
				if replace {
					first_err = Some(err);
				}
			}
		}

		if let Some(err) = first_err {
			return Err(err);
		}
		if cancel.is_cancelled() {
			return Err(SyncError::Cancelled);
		}
		Ok(())
	}

	async fn delete_item(
		&self,
		item: &SyncItem,
		root: &Path,
		container: ContainerId,
	) -> SyncResult<()> {
		match item.action {
			SyncAction::DeleteRemote => {
				let remote = item.remote.as_ref().ok_or_else(|| SyncError::Invariant {
					path: item.path.clone(),
					message: "delete item is missing its remote entry",
				})?;
				info!("[-] deleting remote file {}", item.path);
				self.store.delete(container, remote.remote_id).await
			}
			SyncAction::DeleteLocal => {
				info!("[-] deleting local file {}", item.path);
				self.fs.delete_file(&root.join(&item.path)).await
			}
			SyncAction::Upload | SyncAction::Download => Ok(()),
		}
	}
}

/// Everything one transfer task needs, owned by that task. No shared
/// mutable state crosses worker boundaries besides the semaphore and the
/// cancellation token.
struct TransferContext {
	fs: Arc<dyn FileSystem>,
	store: Arc<dyn BlobStore>,
	reporter: Option<Arc<dyn SyncReporter>>,
	root: PathBuf,
	container: ContainerId,
	upload_attempts: u32,
	download_attempts: u32,
	retry_base_delay: Duration,
	cancel: CancellationToken,
}

impl TransferContext {
	async fn transfer(&self, item: &SyncItem) -> SyncResult<()> {
		match item.action {
			SyncAction::Upload => self.upload(item).await,
			SyncAction::Download => self.download(item).await,
			// Deletions never reach the transfer pool
			SyncAction::DeleteRemote | SyncAction::DeleteLocal => Ok(()),
		}
	}

	async fn upload(&self, item: &SyncItem) -> SyncResult<()> {
		let local = item.local.as_ref().ok_or_else(|| SyncError::Invariant {
			path: item.path.clone(),
			message: "upload item is missing its local file",
		})?;

		info!("[>] uploading {} ({})", item.path, format_size(local.size));
		let task = self.start_task(&item.path, local.size);

		let result = with_retry(
			&format!("push {}", item.path),
			|| self.store.upload(self.container, local),
			self.upload_attempts,
			self.retry_base_delay,
			&self.cancel,
		)
		.await;
		finish_task(&task, &result);
		result?;

		// This was an update: the replacement is confirmed stored, so the
		// stale copy can go. Its deletion is cleanup, not correctness.
		if let Some(remote) = &item.remote {
			debug!("replacing stale copy of {}", item.path);
			if let Err(err) = self.store.delete(self.container, remote.remote_id).await {
				warn!("failed to delete stale copy of {}: {}", item.path, err);
			}
		}
		Ok(())
	}

	async fn download(&self, item: &SyncItem) -> SyncResult<()> {
		let remote = item.remote.as_ref().ok_or_else(|| SyncError::Invariant {
			path: item.path.clone(),
			message: "download item is missing its remote file",
		})?;
		let full_path = self.root.join(&item.path);

		if remote.meta.is_empty_file() {
			// The stored blob is a placeholder; restore the genuine
			// zero-length file without touching the network
			info!("[=] restoring empty file {}", item.path);
			self.fs.write_file(&full_path, Box::new(tokio::io::empty())).await?;
			if remote.meta.mod_time > 0 {
				if let Err(err) = self.fs.set_mod_time(&full_path, remote.meta.mod_time).await {
					warn!("failed to set modification time for {}: {}", item.path, err);
				}
			}
			return Ok(());
		}

		info!("[<] downloading {} ({})", item.path, format_size(remote.size));
		let task = self.start_task(&item.path, remote.size);

		let result = with_retry(
			&format!("pull {}", item.path),
			|| self.fetch(remote, &full_path, &item.path),
			self.download_attempts,
			self.retry_base_delay,
			&self.cancel,
		)
		.await;
		finish_task(&task, &result);
		result
	}

	/// One download attempt: stream the blob to disk, then restore the
	/// original modification time when it is known.
	async fn fetch(&self, remote: &RemoteFile, full_path: &Path, path: &str) -> SyncResult<()> {
		let stream = self
			.store
			.download(self.container, remote.remote_id, &remote.meta.path, remote.size)
			.await?;
		self.fs.write_file(full_path, stream).await?;
		if remote.meta.mod_time > 0 {
			if let Err(err) = self.fs.set_mod_time(full_path, remote.meta.mod_time).await {
				warn!("failed to set modification time for {}: {}", path, err);
			}
		}
		Ok(())
	}

	fn start_task(&self, name: &str, total: u64) -> Option<Box<dyn ProgressTask>> {
		self.reporter.as_ref().map(|r| r.start(name, total))
	}
}

fn finish_task(task: &Option<Box<dyn ProgressTask>>, result: &SyncResult<()>) {
	if let Some(task) = task {
		if result.is_ok() {
			task.complete();
		} else {
			task.abort();
		}
	}
}

/// Reject malformed plans before any side effect happens.
fn validate(plan: &SyncPlan) -> SyncResult<()> {
	for item in &plan.items {
		let (ok, message) = match item.action {
			SyncAction::Upload => (item.local.is_some(), "upload item is missing its local file"),
			SyncAction::Download => {
				(item.remote.is_some(), "download item is missing its remote file")
			}
			SyncAction::DeleteRemote => {
				(item.remote.is_some(), "delete item is missing its remote entry")
			}
			SyncAction::DeleteLocal => {
				(item.local.is_some(), "delete item is missing its local file")
			}
		};
		if !ok {
			return Err(SyncError::Invariant { path: item.path.clone(), message });
		}
	}
	Ok(())
}

// vim: ts=4
