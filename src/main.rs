use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use filesyncer::callbacks::LogTransferCallback;
use filesyncer::config::{ConfigFile, SyncConfig, DEFAULT_CONFIG_FILE};
use filesyncer::dispatch::SyncDispatcher;
use filesyncer::error::ConfigError;
use filesyncer::git::{GitCli, TrackingQuery};
use filesyncer::logging::{self, error, info, warn};
use filesyncer::probe;
use filesyncer::types::{Batch, SyncOutcome, SyncRequest};
use filesyncer::utils::wait_for_shutdown;
use filesyncer::watch::WatchSession;

///////////////////////
// Utility functions //
///////////////////////

fn config_arg() -> Arg {
	Arg::new("config")
		.short('c')
		.long("config")
		.value_name("FILE")
		.default_value(DEFAULT_CONFIG_FILE)
		.help("Config file")
}

fn config_file(matches: &ArgMatches) -> ConfigFile {
	let path = matches.get_one::<String>("config").map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE);
	ConfigFile::new(PathBuf::from(path))
}

fn load_config(matches: &ArgMatches) -> Result<SyncConfig, Box<dyn Error>> {
	let file = config_file(matches);
	let config = file.load()?;
	info!("Loaded {}", file.path().display());
	Ok(config)
}

fn warn_mirror_deletes(config: &SyncConfig) {
	if config.delete_remote_files {
		warn!("deleteRemoteFiles is enabled: files missing locally WILL BE DELETED on {}", config.host);
	}
}

fn report_batch(batch: &Batch) {
	info!("Batch {}: {} change(s)", batch.id(), batch.len());
	for event in batch.events() {
		info!("  {} {}", event.kind, event.path.display());
	}
}

fn report_outcome(label: &str, outcome: &SyncOutcome) {
	if outcome.succeeded {
		info!("{}: ok ({} path(s), {}ms)", label, outcome.files_attempted, outcome.duration_ms);
	} else {
		error!("{}: {} error(s)", label, outcome.errors.len());
		for e in &outcome.errors {
			error!("  {}", e);
		}
	}
}

/////////////////
// Subcommands //
/////////////////

fn cmd_init(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let file = config_file(matches);
	match file.create_default() {
		Ok(_) => {
			info!("Created {}; edit it before running `filesyncer watch`", file.path().display());
			Ok(())
		}
		Err(ConfigError::AlreadyExists { path }) => {
			println!("{} already exists, leaving it unchanged", path.display());
			Ok(())
		}
		Err(e) => Err(e.into()),
	}
}

async fn cmd_watch(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config = load_config(matches)?;
	probe::ensure_reachable(&config.endpoint(), config.probe_timeout()).await?;
	warn_mirror_deletes(&config);

	let dispatcher = Arc::new(
		SyncDispatcher::from_config(&config, &config.source_dir())
			.with_callback(Arc::new(LogTransferCallback)),
	);

	let on_flush = move |batch: Batch| {
		report_batch(&batch);
		let dispatcher = dispatcher.clone();
		let label = format!("Batch {}", batch.id());
		tokio::spawn(async move {
			let outcome = dispatcher.execute(SyncRequest::Incremental(batch)).await;
			report_outcome(&label, &outcome);
		});
	};

	let session = WatchSession::start(&config, Arc::new(on_flush))?;
	info!("Press Ctrl-C to stop");

	let shutdown = wait_for_shutdown().await;
	session.stop().await;
	match shutdown.exit_code() {
		0 => Ok(()),
		code => std::process::exit(code),
	}
}

async fn cmd_deploy(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config = load_config(matches)?;
	let dispatcher = SyncDispatcher::from_config(&config, &config.source_dir())
		.with_callback(Arc::new(LogTransferCallback));

	let request = SyncRequest::FullTree { mirror_deletes: config.delete_remote_files };
	dispatcher.check(&request)?;

	probe::ensure_reachable(&config.endpoint(), config.probe_timeout()).await?;
	warn_mirror_deletes(&config);

	let outcome = dispatcher.execute(request).await;
	report_outcome("Deploy", &outcome);
	if outcome.succeeded {
		Ok(())
	} else {
		Err("deploy failed".into())
	}
}

async fn cmd_ls_tracked(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let config = load_config(matches)?;
	let git = GitCli::new(config.source_dir());
	for path in git.tracked_files().await? {
		println!("{}", path.display());
	}
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = Command::new("filesyncer")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Watch a directory and push changes to a remote host")
		.subcommand_required(true)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Debug logging"),
		)
		.subcommand(Command::new("init").about("Create a default config file").arg(config_arg()))
		.subcommand(
			Command::new("watch").about("Watch the source and sync changes").arg(config_arg()),
		)
		.subcommand(
			Command::new("deploy").about("Sync the whole source tree once").arg(config_arg()),
		)
		.subcommand(
			Command::new("ls-tracked").about("List git-tracked files in the source").arg(config_arg()),
		)
		.get_matches();

	let verbose = matches.get_flag("verbose")
		|| matches.subcommand().map(|(_, sub)| sub.get_flag("verbose")).unwrap_or(false);
	logging::init_tracing(verbose);

	let result = match matches.subcommand() {
		Some(("init", sub)) => cmd_init(sub),
		Some(("watch", sub)) => cmd_watch(sub).await,
		Some(("deploy", sub)) => cmd_deploy(sub).await,
		Some(("ls-tracked", sub)) => cmd_ls_tracked(sub).await,
		_ => Err("unknown subcommand".into()),
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
