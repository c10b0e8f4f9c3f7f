//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;
mod error;
mod steps;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use error::Error;
use nosconf_gnmi::{Client, GrpcTransport};
use nosconf_reconcile::{Database, DbStore, Reconciler, Step};
use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use steps::FileResolver;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tonic::transport::{Certificate, ClientTlsConfig, Endpoint};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer().expect("couldn't connect to journald")
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.stdout.fmt.show_thread_id)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("nosconf=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald)
        .with(file)
        .with(stdout)
        .init();
}

// Loads the done markers from a file, or initializes a new store if one
// doesn't exist.
fn init_db<P: AsRef<Path>>(
    path: P,
) -> Result<PickleDb, pickledb::error::Error> {
    let dump_policy = PickleDbDumpPolicy::AutoDump;
    let serialization_method = SerializationMethod::Json;
    match path.as_ref().exists() {
        true => PickleDb::load(path, dump_policy, serialization_method),
        false => Ok(PickleDb::new(path, dump_policy, serialization_method)),
    }
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

fn build_version() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    match rustc_tools_util::get_version_info!().commit_hash {
        Some(hash) => format!("{VERSION} ({hash})"),
        None => VERSION.to_owned(),
    }
}

// Opens the gNMI session and negotiates the device capabilities.
async fn connect(config: &config::Device) -> Result<Client, Error> {
    let timeout = Duration::from_secs(config.timeout);
    let mut endpoint = Endpoint::from_shared(config.address.clone())
        .map_err(|error| Error::Endpoint(config.address.clone(), error))?
        .connect_timeout(timeout)
        .timeout(timeout);

    if config.tls.enabled {
        let mut tls = ClientTlsConfig::new();
        if let Some(path) = &config.tls.ca_certificate {
            let pem = std::fs::read(path)
                .map_err(|error| Error::TlsCertificate(path.clone(), error))?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }
        if let Some(domain_name) = &config.tls.domain_name {
            tls = tls.domain_name(domain_name);
        }
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|error| Error::Endpoint(config.address.clone(), error))?;
    }

    let transport =
        GrpcTransport::connect(endpoint).await.map_err(Error::Connect)?;
    Client::connect(transport, Instant::now() + timeout)
        .await
        .map_err(Error::Capabilities)
}

// Runs reconciliation passes until interrupted, or only once if requested.
//
// Returns whether the last pass succeeded.
async fn run(
    config: &Config,
    db: Database,
    once: bool,
    mut signal_rx: mpsc::Receiver<()>,
) -> bool {
    let client = match connect(&config.device).await {
        Ok(client) => client,
        Err(error) => {
            error.log();
            return false;
        }
    };
    info!(address = %config.device.address, "connected to device");

    let steps: Vec<Box<dyn Step>> = steps::build(&config.steps);
    let reconciler = Reconciler::new(DbStore::new(db), FileResolver)
        .with_timeout(Duration::from_secs(config.reconcile.step_timeout));

    let mut interval = tokio::time::interval(Duration::from_secs(
        config.reconcile.interval.max(1),
    ));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let success = match reconciler.run(&client, &steps).await {
                    Ok(report) => {
                        info!(
                            executed = report.executed.len(),
                            skipped = report.skipped.len(),
                            "reconciliation pass succeeded"
                        );
                        true
                    }
                    Err(error) => {
                        error.log();
                        false
                    }
                };
                if once {
                    return success;
                }
            }
            _ = signal_rx.recv() => {
                return true;
            }
        }
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Nosconf reconciliation agent")
        .version(build_version().as_str())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .arg(
            Arg::with_name("once")
                .long("once")
                .help("Run a single reconciliation pass and exit."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);
    let once = matches.is_present("once");

    // Initialize tracing.
    init_tracing(&config.logging);

    // Initialize non-volatile storage.
    let db = init_db(&config.reconcile.database_path)
        .expect("failed to initialize non-volatile storage");
    let db = Arc::new(Mutex::new(db));

    // We're ready to go!
    info!(steps = config.steps.len(), "starting up");

    let success = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            // Spawn signal listener.
            let signal_rx = signal_listener();

            run(&config, db, once, signal_rx).await
        });

    info!("exiting");
    if !success {
        error!("last reconciliation pass failed");
        std::process::exit(1);
    }
}
