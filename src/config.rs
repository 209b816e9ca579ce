//! Runtime configuration.
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (`~/.config/blobsync/config.toml`, or `--config`)
//! 3. CLI flags (highest priority, merged in `main`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::{SyncError, SyncResult};
use crate::types::HashPolicy;

/// Configuration for a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
	/// Number of concurrent transfer workers
	pub workers: usize,

	/// Attempts for a single upload; 1 means no retry
	pub upload_attempts: u32,

	/// Attempts for a single download
	pub download_attempts: u32,

	/// Base backoff delay between attempts, in milliseconds
	pub retry_base_delay_ms: u64,

	/// Compare by `(mod_time, size)` instead of content checksum
	pub skip_checksum: bool,

	/// Restrict the run to a sub-tree of the synchronized directory
	pub scope: Option<String>,

	/// Glob patterns excluded from both inventories
	pub exclude_patterns: Vec<String>,

	/// Skip confirmation prompts and interactive output
	pub non_interactive: bool,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			workers: 4,
			upload_attempts: 1,
			download_attempts: 5,
			retry_base_delay_ms: 1000,
			skip_checksum: false,
			scope: None,
			exclude_patterns: vec![],
			non_interactive: false,
		}
	}
}

impl Config {
	/// The comparability key this configuration selects.
	pub fn hash_policy(&self) -> HashPolicy {
		if self.skip_checksum {
			HashPolicy::ModTimeSize
		} else {
			HashPolicy::Checksum
		}
	}

	/// Load configuration from a TOML file.
	///
	/// With an explicit `path` the file must exist and parse. Without one,
	/// the default location is tried and silently skipped when absent.
	pub fn load(path: Option<&Path>) -> SyncResult<Config> {
		let (path, required) = match path {
			Some(p) => (p.to_path_buf(), true),
			None => match default_config_path() {
				Some(p) => (p, false),
				None => return Ok(Config::default()),
			},
		};

		if !path.exists() {
			if required {
				return Err(SyncError::InvalidConfig {
					message: format!("config file not found: {}", path.display()),
				});
			}
			return Ok(Config::default());
		}

		let text = fs::read_to_string(&path)?;
		toml::from_str(&text).map_err(|e| SyncError::InvalidConfig {
			message: format!("{}: {}", path.display(), e),
		})
	}
}

fn default_config_path() -> Option<PathBuf> {
	let home = env::var_os("HOME")?;
	Some(PathBuf::from(home).join(".config").join("blobsync").join("config.toml"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::default();
		assert_eq!(config.workers, 4);
		assert_eq!(config.upload_attempts, 1);
		assert_eq!(config.download_attempts, 5);
		assert!(!config.skip_checksum);
		assert_eq!(config.hash_policy(), HashPolicy::Checksum);
	}

	#[test]
	fn test_parse_kebab_case_keys() {
		let config: Config = toml::from_str(
			r#"
			workers = 2
			skip-checksum = true
			exclude-patterns = ["*.tmp"]
			"#,
		)
		.unwrap();
		assert_eq!(config.workers, 2);
		assert_eq!(config.hash_policy(), HashPolicy::ModTimeSize);
		assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string()]);
		// Untouched fields keep their defaults
		assert_eq!(config.download_attempts, 5);
	}
}

// vim: ts=4
