// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::adapters::cli::Command;
use crate::app::ports::CredentialStorePort;
use crate::app::services::rate_limit::FixedWindowRateLimiter;
use crate::app::services::retry::RetryPolicy;
use crate::app::services::sessions::{ConnectionDefaults, SessionFactory};
use crate::app::types::{NewBackupJob, NewDestination, NewHost};
use crate::app::usecases::{UseCaseSettings, UseCases};

mod adapters;
mod app;
mod config;
mod logging;

const HEARTBEAT_INTERVAL_SECS: i64 = 30;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => {
            tracing::info!(
                "config path: {} (source={}, present={})",
                path.display(),
                source.as_str(),
                report.config_file_present
            );
        }
        (Some(path), None) => {
            tracing::info!(
                "config path: {} (present={})",
                path.display(),
                report.config_file_present
            );
        }
        (None, _) => {
            tracing::info!("config path: (none)");
        }
    }
    tracing::info!(
        "config database_path: {} (source={})",
        report.database_path.value.display(),
        report.database_path.source.as_str()
    );
    tracing::info!(
        "config listen: {}:{} (source={}/{})",
        report.listen_address.value,
        report.port.value,
        report.listen_address.source.as_str(),
        report.port.source.as_str()
    );
    tracing::info!(
        "config scheduler_tick_secs: {} (source={})",
        report.scheduler_tick_secs.value,
        report.scheduler_tick_secs.source.as_str()
    );
    tracing::info!(
        "config storage_root: {} (source={})",
        report.storage_root.value.display(),
        report.storage_root.source.as_str()
    );
    tracing::info!(
        "config verbose: {} (source={})",
        report.verbose.value,
        report.verbose.source.as_str()
    );
    tracing::info!(
        "config key_passphrase: set (source={})",
        report.key_passphrase_source.as_str()
    );
}

/// Runs `task` every `period` until the process exits; failures are logged.
fn spawn_interval<F, Fut>(name: &'static str, period: Duration, task: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = task().await {
                tracing::warn!(task = name, "periodic task failed: {err:#}");
            }
        }
    });
}

async fn serve(config: &config::Config, usecases: UseCases) -> anyhow::Result<()> {
    let scheduler = usecases.clone();
    spawn_interval(
        "scheduler",
        Duration::from_secs(config.scheduler_tick_secs),
        move || {
            let usecases = scheduler.clone();
            async move {
                usecases.run_scheduler_tick().await?;
                Ok::<_, anyhow::Error>(())
            }
        },
    );

    let watchdog = usecases.clone();
    spawn_interval(
        "watchdog",
        Duration::from_secs(config.watchdog_interval_secs),
        move || {
            let usecases = watchdog.clone();
            async move {
                usecases.run_watchdog().await?;
                Ok::<_, anyhow::Error>(())
            }
        },
    );

    if config.connectivity_sweep_secs > 0 {
        let sweeper = usecases.clone();
        spawn_interval(
            "connectivity",
            Duration::from_secs(config.connectivity_sweep_secs),
            move || {
                let usecases = sweeper.clone();
                async move {
                    let online = usecases.verify_all_hosts().await?;
                    tracing::debug!(online, "connectivity sweep finished");
                    Ok::<_, anyhow::Error>(())
                }
            },
        );
    }

    let addr = SocketAddr::new(config.listen_address, config.port);
    adapters::http::serve(addr, usecases).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = adapters::cli::parse_opts();
    let command = parsed.command();
    let opts = parsed.opts;
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config,
        config::Overrides {
            database_path: opts.database_path,
            scheduler_tick_secs: opts.scheduler_tick_secs,
            port: opts.port,
            verbose: parsed.verbose_override,
        },
    )?;
    logging::init(config.verbose);
    log_config_report(&report);
    config::ensure_parent_dir(&config.database_path)?;
    config::ensure_dir(&config.staging_dir)?;
    config::ensure_dir(&config.storage_root)?;

    let credentials = Arc::new(adapters::credentials::FileCredentialStore::new(
        config.private_key_path.clone(),
        config.public_key_path.clone(),
        Some(config.key_passphrase.clone()),
    ));
    credentials
        .private_key()
        .await
        .context("service private key is not readable")?;

    let store = adapters::db::BackupStore::open(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
    let db = Arc::new(adapters::db::SqliteStoreAdapter::new(store));
    let connector = Arc::new(adapters::ssh::RusshConnector::new(adapters::ssh::SshSettings {
        known_hosts_path: config.known_hosts_path.clone(),
        inactivity_timeout: Duration::from_secs(config.ssh_inactivity_timeout_secs),
        keepalive_interval: Duration::from_secs(config.ssh_keepalive_secs),
    }));
    let sessions = SessionFactory::new(
        connector,
        ConnectionDefaults::from_credentials(credentials.as_ref()),
    );
    let (queue, receiver) = adapters::queue::WorkerQueue::bounded(config.worker_count * 4);

    let usecases = UseCases::new(
        db.clone(),
        db,
        sessions,
        Arc::new(adapters::storage::FilesystemStorageProvider::new(
            config.storage_root.clone(),
        )),
        credentials,
        Arc::new(adapters::notify::TracingNotifier::new()),
        Arc::new(queue.clone()),
        Arc::new(adapters::time::SystemClock::new()),
        FixedWindowRateLimiter::new(
            config.webhook_rate_limit,
            Duration::from_secs(config.webhook_rate_window_secs),
        ),
        UseCaseSettings {
            transfer_policy: RetryPolicy::new(
                config.transfer_max_retries,
                Duration::from_secs(config.transfer_retry_delay_secs),
            ),
            inoperative_threshold: time::Duration::minutes(
                i64::try_from(config.inoperative_threshold_mins)
                    .context("inoperative_threshold_mins is out of range")?,
            ),
            heartbeat_interval: time::Duration::seconds(HEARTBEAT_INTERVAL_SECS),
            staging_dir: config.staging_dir.clone(),
        },
    );
    let pool = adapters::queue::WorkerPool::spawn(config.worker_count, receiver, usecases.clone());

    match command {
        Command::Serve => serve(&config, usecases).await?,
        Command::CheckHost { host_id } => {
            let status = usecases.check_host_connectivity(host_id).await?;
            println!("host {host_id}: {status}");
        }
        Command::RemoveKey { host_id } => {
            let removal = usecases.remove_service_key(host_id).await?;
            println!("host {host_id}: {removal:?}");
        }
        Command::RunJob { job_id } => {
            let outcome = usecases.run_job_now(job_id).await?;
            println!("job {job_id}: {}", outcome.as_str());
        }
        Command::Tick => {
            let tick = usecases.run_scheduler_tick().await?;
            let reset = usecases.run_watchdog().await?;
            println!(
                "dispatched: {:?}, skipped (host busy): {:?}, reset: {:?}",
                tick.dispatched, tick.skipped_busy, reset
            );
        }
        Command::AddHost(args) => {
            let id = usecases
                .register_host(NewHost {
                    name: args.name,
                    address: args.address,
                    port: args.ssh_port,
                    username: args.username,
                })
                .await?;
            println!("host registered: {id}");
        }
        Command::AddDestination(args) => {
            let id = usecases
                .register_destination(NewDestination {
                    name: args.name,
                    bucket: args.bucket,
                    prefix: args.prefix,
                    keep_last: args.keep_last,
                })
                .await?;
            println!("destination registered: {id}");
        }
        Command::AddJob(args) => {
            let id = usecases
                .register_job(NewBackupJob {
                    name: args.name,
                    host_id: args.host_id,
                    destination_id: args.destination_id,
                    frequency: args.frequency,
                    time_to_run_at: args.time_to_run_at,
                    custom_cron_expression: args.custom_cron_expression,
                    owner_utc_offset_minutes: args.utc_offset_minutes,
                    backup_command: args.backup_command,
                    webhook_token: args.webhook_token,
                    ..NewBackupJob::default()
                })
                .await?;
            println!("job registered: {id}");
        }
        Command::ListBackups { job_id, pattern } => {
            let objects = usecases
                .list_stored_backups(job_id, pattern.as_deref())
                .await?;
            for object in objects {
                println!("{}\t{}\t{}", object.last_modified, object.size, object.key);
            }
        }
        Command::DeleteBackup { job_id, file_name } => {
            usecases.delete_stored_backup(job_id, &file_name).await?;
            println!("deleted {file_name}");
        }
    }

    queue.close();
    pool.join().await;
    Ok(())
}
