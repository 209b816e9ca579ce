use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use blobsync::fs::{FileSystem, LocalFileSystem};
use blobsync::logging::{self, info, warn};
use blobsync::progress::{format_size, ConsoleReporter, SyncReporter};
use blobsync::store::{BlobStore, DirStore};
use blobsync::types::ContainerId;
use blobsync::{Config, Differ, Executor, Scanner, SyncError};

enum Direction {
	Push,
	Pull,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = Command::new("blobsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Directory <-> blob-store synchronizer")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Path to a TOML config file"),
		)
		.subcommand(
			sync_command("push").about("Upload local changes into the remote container"),
		)
		.subcommand(
			sync_command("pull").about("Download remote changes into the local directory"),
		)
		.subcommand(
			Command::new("list")
				.about("List the remote container inventory")
				.arg(store_arg())
				.arg(container_arg())
				.arg(scope_arg()),
		)
		.get_matches();

	match matches.subcommand() {
		Some(("push", sub)) => run_sync(Direction::Push, sub).await,
		Some(("pull", sub)) => run_sync(Direction::Pull, sub).await,
		Some(("list", sub)) => run_list(sub).await,
		_ => unreachable!("subcommand is required"),
	}
}

fn sync_command(name: &'static str) -> Command {
	Command::new(name)
		.arg(
			Arg::new("dir")
				.short('d')
				.long("dir")
				.value_name("DIR")
				.required(true)
				.help("Local directory to synchronize"),
		)
		.arg(store_arg())
		.arg(container_arg())
		.arg(scope_arg())
		.arg(
			Arg::new("workers")
				.short('w')
				.long("workers")
				.value_name("N")
				.help("Number of concurrent transfers"),
		)
		.arg(
			Arg::new("modtime")
				.long("modtime")
				.action(ArgAction::SetTrue)
				.help("Compare by modification time and size instead of content checksum"),
		)
		.arg(
			Arg::new("exclude")
				.long("exclude")
				.value_name("GLOB")
				.action(ArgAction::Append)
				.help("Exclude paths matching the glob (repeatable)"),
		)
		.arg(
			Arg::new("yes")
				.short('y')
				.long("yes")
				.action(ArgAction::SetTrue)
				.help("Skip the confirmation prompt"),
		)
}

fn store_arg() -> Arg {
	Arg::new("store")
		.long("store")
		.value_name("DIR")
		.required(true)
		.help("Root directory of the blob store")
}

fn container_arg() -> Arg {
	Arg::new("container")
		.long("container")
		.value_name("ID")
		.required(true)
		.help("Container id inside the store")
}

fn scope_arg() -> Arg {
	Arg::new("scope")
		.long("scope")
		.value_name("PREFIX")
		.help("Restrict the operation to a sub-tree")
}

fn load_config(matches: &ArgMatches) -> Result<Config, SyncError> {
	let mut config = Config::load(matches.get_one::<String>("config").map(Path::new))?;

	if let Some(workers) = matches.try_get_one::<String>("workers").ok().flatten() {
		config.workers = workers.parse().map_err(|_| SyncError::InvalidConfig {
			message: format!("--workers expects a number, got {:?}", workers),
		})?;
	}
	if matches.try_contains_id("modtime").unwrap_or(false) && matches.get_flag("modtime") {
		config.skip_checksum = true;
	}
	if let Some(scope) = matches.get_one::<String>("scope") {
		config.scope = Some(scope.clone());
	}
	if let Some(patterns) = matches.try_get_many::<String>("exclude").ok().flatten() {
		config.exclude_patterns.extend(patterns.cloned());
	}
	if matches.try_contains_id("yes").unwrap_or(false) && matches.get_flag("yes") {
		config.non_interactive = true;
	}

	Ok(config)
}

fn parse_container(matches: &ArgMatches) -> Result<ContainerId, SyncError> {
	let raw = matches
		.get_one::<String>("container")
		.ok_or_else(|| SyncError::InvalidConfig { message: "--container is required".into() })?;
	let id = raw.parse::<i64>().map_err(|_| SyncError::InvalidConfig {
		message: format!("--container expects a numeric id, got {:?}", raw),
	})?;
	Ok(ContainerId(id))
}

async fn run_sync(direction: Direction, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config = load_config(matches)?;
	let container = parse_container(matches)?;
	let root = PathBuf::from(matches.get_one::<String>("dir").map(String::as_str).unwrap_or("."));
	let store_dir = matches
		.get_one::<String>("store")
		.ok_or_else(|| SyncError::InvalidConfig { message: "--store is required".into() })?;

	let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
	let store: Arc<dyn BlobStore> = Arc::new(DirStore::new(store_dir));

	let scanner = Scanner::new(
		fs.clone(),
		store.clone(),
		config.scope.as_deref(),
		&config.exclude_patterns,
		config.hash_policy(),
	)?;

	info!("scanning...");
	let (local, remote) = scanner.scan_both(&root, container).await?;
	info!("{} local file(s), {} remote file(s)", local.len(), remote.len());

	let differ = Differ::new(config.hash_policy());
	let plan = match direction {
		Direction::Push => differ.diff_push(&local, &remote),
		Direction::Pull => differ.diff_pull(&local, &remote),
	};

	let reporter: Arc<dyn SyncReporter> = Arc::new(ConsoleReporter::new(config.non_interactive));
	let executor = Executor::new(fs, store, config.workers)
		.upload_attempts(config.upload_attempts)
		.download_attempts(config.download_attempts)
		.retry_base_delay(Duration::from_millis(config.retry_base_delay_ms))
		.with_reporter(reporter);

	let cancel = CancellationToken::new();
	let interrupt = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("interrupt received, cancelling");
			interrupt.cancel();
		}
	});

	executor.execute(&plan, &root, container, &cancel).await?;
	info!("done");
	Ok(())
}

async fn run_list(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config = load_config(matches)?;
	let container = parse_container(matches)?;
	let store_dir = matches
		.get_one::<String>("store")
		.ok_or_else(|| SyncError::InvalidConfig { message: "--store is required".into() })?;

	let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
	let store: Arc<dyn BlobStore> = Arc::new(DirStore::new(store_dir));
	let scanner = Scanner::new(
		fs,
		store,
		config.scope.as_deref(),
		&config.exclude_patterns,
		config.hash_policy(),
	)?;

	let remote = scanner.scan_remote(container).await?;
	if remote.is_empty() {
		println!("no files in container {}", container);
		return Ok(());
	}

	for (path, file) in &remote {
		println!(
			"{:>10}  {:>12}  {}",
			format_size(file.logical_size()),
			file.meta.mod_time,
			path
		);
	}
	println!("{} file(s)", remote.len());
	Ok(())
}

// vim: ts=4
