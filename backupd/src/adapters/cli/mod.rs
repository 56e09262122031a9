// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::app::types::Frequency;

#[derive(Parser, Debug)]
#[command(
    name = "backupd",
    version,
    about,
    long_about = None,
    after_help = "backupd backup orchestration daemon\n\
\n\
Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: defaults < BACKUPD_CONFIG_PATH < command-line flags.\n\
The key passphrase must be configured (key_passphrase or BACKUPD_KEY_PASSPHRASE); an empty value means an unencrypted key.\n\
Paths in the config file are resolved relative to the config file directory; paths passed as flags are resolved relative to the current working directory."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, backupd uses BACKUPD_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Path to the SQLite database file. Overrides `database_path` from the config file."
    )]
    pub database_path: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        help = "How often the scheduler evaluates jobs. Overrides `scheduler_tick_secs` from the config file."
    )]
    pub scheduler_tick_secs: Option<u64>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[arg(
        long,
        global = true,
        value_name = "PORT",
        help = "Port for the webhook listener. Overrides `port` from the config file."
    )]
    pub port: Option<u16>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon: scheduler, watchdog, workers and webhook listener (default).
    Serve,
    /// Check one host once and record its connectivity.
    CheckHost {
        #[arg(value_name = "HOST_ID")]
        host_id: i64,
    },
    /// Remove the service public key from a host's authorized_keys.
    RemoveKey {
        #[arg(value_name = "HOST_ID")]
        host_id: i64,
    },
    /// Execute one backup job in the foreground, ignoring its schedule.
    RunJob {
        #[arg(value_name = "JOB_ID")]
        job_id: i64,
    },
    /// Evaluate one scheduler tick and one watchdog pass, then exit.
    Tick,
    /// Register a host reachable with the service key.
    AddHost(AddHostArgs),
    /// Register an object-storage destination.
    AddDestination(AddDestinationArgs),
    /// Register a backup job; it starts Ready.
    AddJob(AddJobArgs),
    /// List a job's stored archives, newest first.
    ListBackups {
        #[arg(value_name = "JOB_ID")]
        job_id: i64,
        #[arg(long, value_name = "GLOB", help = "Only archives whose file name matches")]
        pattern: Option<String>,
    },
    /// Delete one stored archive of a job.
    DeleteBackup {
        #[arg(value_name = "JOB_ID")]
        job_id: i64,
        #[arg(value_name = "FILE_NAME")]
        file_name: String,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddHostArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, value_name = "HOST")]
    pub address: String,
    #[arg(long = "ssh-port", default_value_t = 22, value_name = "PORT")]
    pub ssh_port: u16,
    #[arg(long)]
    pub username: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddDestinationArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub bucket: String,
    #[arg(long, default_value = "")]
    pub prefix: String,
    #[arg(long, value_name = "N", help = "Archives to retain per job; omit to keep all")]
    pub keep_last: Option<u32>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddJobArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long = "host", value_name = "HOST_ID")]
    pub host_id: i64,
    #[arg(long = "destination", value_name = "DESTINATION_ID")]
    pub destination_id: i64,
    #[arg(long, default_value = "daily", help = "daily, weekly or custom")]
    pub frequency: Frequency,
    #[arg(long = "at", value_name = "HH:MM", help = "Wall-clock time for daily and weekly jobs")]
    pub time_to_run_at: Option<String>,
    #[arg(long = "cron", value_name = "EXPR", help = "Five-field cron expression for custom jobs")]
    pub custom_cron_expression: Option<String>,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_name = "MINUTES")]
    pub utc_offset_minutes: i32,
    #[arg(long = "command", value_name = "COMMAND", help = "Remote command that prints the archive path last")]
    pub backup_command: String,
    #[arg(long, value_name = "TOKEN", help = "Secret required by the run webhook")]
    pub webhook_token: Option<String>,
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

impl ParsedOpts {
    pub fn command(&self) -> Command {
        self.opts.command.clone().unwrap_or(Command::Serve)
    }
}

pub fn cli_command() -> clap::Command {
    Opts::command()
}

fn parsed_from_matches(matches: &clap::ArgMatches) -> Result<ParsedOpts, clap::Error> {
    let verbose_override = if matches.get_flag("verbose") {
        Some(true)
    } else {
        None
    };
    let opts = Opts::from_arg_matches(matches)?;
    Ok(ParsedOpts {
        opts,
        verbose_override,
    })
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    parsed_from_matches(&matches).unwrap_or_else(|err| err.exit())
}
