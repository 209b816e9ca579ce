//! Error types for sync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for the reconciliation engine
#[derive(Debug)]
pub enum SyncError {
	/// Listing one side failed; fatal before a plan is built
	Scan { side: &'static str, source: Box<dyn Error + Send + Sync> },

	/// A plan item is missing its required counterpart
	Invariant { path: String, message: &'static str },

	/// An operation failed after its allowed attempts
	Transfer { name: String, attempts: u32, source: Box<SyncError> },

	/// Operation cancelled by the caller or a deadline
	Cancelled,

	/// Failure reported by the blob store backend
	Store { message: String },

	/// I/O error
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },
}

impl SyncError {
	/// True for cancellation-class errors; these propagate immediately and
	/// are never retried.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, SyncError::Cancelled)
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Scan { side, source } => {
				write!(f, "failed to list {} files: {}", side, source)
			}
			SyncError::Invariant { path, message } => {
				write!(f, "{}: {}", message, path)
			}
			SyncError::Transfer { name, attempts, source } => {
				write!(f, "{} failed after {} attempts: {}", name, attempts, source)
			}
			SyncError::Cancelled => write!(f, "operation cancelled"),
			SyncError::Store { message } => write!(f, "blob store error: {}", message),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "invalid configuration: {}", message)
			}
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Scan { source, .. } => Some(source.as_ref()),
			SyncError::Transfer { source, .. } => Some(source.as_ref()),
			SyncError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Store { message: e }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transfer_display_keeps_cause() {
		let err = SyncError::Transfer {
			name: "pull a.txt".to_string(),
			attempts: 5,
			source: Box::new(SyncError::Store { message: "gone".to_string() }),
		};
		let msg = format!("{}", err);
		assert!(msg.contains("pull a.txt"));
		assert!(msg.contains("5 attempts"));
		assert!(msg.contains("gone"));
	}

	#[test]
	fn test_cancelled_classification() {
		assert!(SyncError::Cancelled.is_cancelled());
		assert!(!SyncError::Store { message: "x".to_string() }.is_cancelled());
	}
}

// vim: ts=4
