//! Confirmation and progress reporting.
//!
//! The executor drives these callbacks; implementations decide how to
//! render them. Every transfer owns its `ProgressTask` handle outright, so
//! no shared per-file state exists between workers.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::{SyncError, SyncResult};
use crate::logging::{info, warn};
use crate::types::SyncPlan;

/// Handle for one in-flight transfer.
pub trait ProgressTask: Send + Sync {
	fn increment(&self, n: u64);
	fn set_current(&self, current: u64);
	fn complete(&self);
	fn abort(&self);
}

/// Confirmation and progress sink wired into the executor.
pub trait SyncReporter: Send + Sync {
	/// Show the plan and ask for a go-ahead; `Ok(false)` cancels the run
	/// before any side effect.
	fn confirm_plan(&self, plan: &SyncPlan) -> SyncResult<bool>;

	fn set_total_files(&self, total: usize);

	fn start(&self, name: &str, total: u64) -> Box<dyn ProgressTask>;

	/// Drain any buffered display; called at the barrier between the
	/// transfer and delete phases.
	fn wait(&self);
}

/// Plain terminal reporter.
///
/// In non-interactive mode the confirmation prompt is skipped and every
/// plan is accepted; per-file lines still go to the log.
pub struct ConsoleReporter {
	non_interactive: bool,
}

impl ConsoleReporter {
	pub fn new(non_interactive: bool) -> Self {
		ConsoleReporter { non_interactive }
	}
}

impl SyncReporter for ConsoleReporter {
	fn confirm_plan(&self, plan: &SyncPlan) -> SyncResult<bool> {
		let mut out = io::stdout();
		for item in &plan.items {
			writeln!(out, "  {:<13} {}  ({})", item.action.to_string(), item.path, item.reason)?;
		}
		writeln!(out, "{}", plan.summary)?;

		if self.non_interactive {
			return Ok(true);
		}

		write!(out, "Proceed? [y/N] ")?;
		out.flush()?;

		let mut answer = String::new();
		io::stdin().lock().read_line(&mut answer).map_err(SyncError::Io)?;
		let answer = answer.trim();
		Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
	}

	fn set_total_files(&self, total: usize) {
		info!("synchronizing {} file(s)", total);
	}

	fn start(&self, name: &str, total: u64) -> Box<dyn ProgressTask> {
		Box::new(ConsoleTask {
			name: name.to_string(),
			total,
			current: AtomicU64::new(0),
			started: Instant::now(),
		})
	}

	fn wait(&self) {
		// Completion lines are written unbuffered as they happen; nothing
		// left to drain at the phase barrier
		let _ = io::stdout().flush();
	}
}

struct ConsoleTask {
	name: String,
	total: u64,
	current: AtomicU64,
	started: Instant,
}

impl ProgressTask for ConsoleTask {
	fn increment(&self, n: u64) {
		self.current.fetch_add(n, Ordering::Relaxed);
	}

	fn set_current(&self, current: u64) {
		self.current.store(current, Ordering::Relaxed);
	}

	fn complete(&self) {
		let elapsed = self.started.elapsed().as_secs_f64();
		let speed = if elapsed > 0.0 { (self.total as f64 / elapsed) as u64 } else { 0 };
		info!("finished {} ({}, {}/s)", self.name, format_size(self.total), format_size(speed));
	}

	fn abort(&self) {
		warn!("aborted {} ({} of {} transferred)", self.name, format_size(self.current.load(Ordering::Relaxed)), format_size(self.total));
	}
}

/// Human-readable byte count ("1.5 KB", "2.0 MB").
pub fn format_size(bytes: u64) -> String {
	const UNIT: u64 = 1024;
	if bytes < UNIT {
		return format!("{} B", bytes);
	}
	let mut div = UNIT;
	let mut exp = 0;
	let mut n = bytes / UNIT;
	while n >= UNIT {
		div *= UNIT;
		exp += 1;
		n /= UNIT;
	}
	format!("{:.1} {}B", bytes as f64 / div as f64, ['K', 'M', 'G', 'T', 'P', 'E'][exp])
}


// vim: ts=4
