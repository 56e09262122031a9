// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fmt,
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

const APP_DIR_NAME: &str = "backupd";
const CONFIG_FILE_NAME: &str = "backupd.toml";
const CONFIG_ENV_VAR: &str = "BACKUPD_CONFIG_PATH";
const PASSPHRASE_ENV_VAR: &str = "BACKUPD_KEY_PASSPHRASE";
const DATABASE_FILE_NAME: &str = "backupd.sqlite";
const DEFAULT_PORT: u16 = 8470;
const DEFAULT_SCHEDULER_TICK_SECS: u64 = 60;
const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 60;
const DEFAULT_INOPERATIVE_THRESHOLD_MINS: u64 = 30;
const MAX_INOPERATIVE_THRESHOLD_MINS: u64 = 7 * 24 * 60;
const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_TRANSFER_MAX_RETRIES: u32 = 3;
const DEFAULT_TRANSFER_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_WEBHOOK_RATE_LIMIT: u32 = 10;
const DEFAULT_WEBHOOK_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_SSH_INACTIVITY_TIMEOUT_SECS: u64 = 600;
const DEFAULT_SSH_KEEPALIVE_SECS: u64 = 15;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_path: Option<String>,
    listen_address: Option<IpAddr>,
    port: Option<u16>,
    verbose: Option<bool>,
    scheduler_tick_secs: Option<u64>,
    watchdog_interval_secs: Option<u64>,
    inoperative_threshold_mins: Option<u64>,
    connectivity_sweep_secs: Option<u64>,
    worker_count: Option<usize>,
    transfer_max_retries: Option<u32>,
    transfer_retry_delay_secs: Option<u64>,
    webhook_rate_limit: Option<u32>,
    webhook_rate_window_secs: Option<u64>,
    staging_dir: Option<String>,
    storage_root: Option<String>,
    private_key_path: Option<String>,
    public_key_path: Option<String>,
    key_passphrase: Option<String>,
    known_hosts_path: Option<String>,
    ssh_inactivity_timeout_secs: Option<u64>,
    ssh_keepalive_secs: Option<u64>,
}

pub struct Config {
    pub database_path: PathBuf,
    pub listen_address: IpAddr,
    pub port: u16,
    pub verbose: bool,
    pub scheduler_tick_secs: u64,
    pub watchdog_interval_secs: u64,
    pub inoperative_threshold_mins: u64,
    /// Zero disables the periodic connectivity sweep.
    pub connectivity_sweep_secs: u64,
    pub worker_count: usize,
    pub transfer_max_retries: u32,
    pub transfer_retry_delay_secs: u64,
    pub webhook_rate_limit: u32,
    pub webhook_rate_window_secs: u64,
    pub staging_dir: PathBuf,
    pub storage_root: PathBuf,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    /// Empty means the private key is not encrypted.
    pub key_passphrase: String,
    pub known_hosts_path: Option<PathBuf>,
    pub ssh_inactivity_timeout_secs: u64,
    pub ssh_keepalive_secs: u64,
    pub config_path: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("listen_address", &self.listen_address)
            .field("port", &self.port)
            .field("verbose", &self.verbose)
            .field("scheduler_tick_secs", &self.scheduler_tick_secs)
            .field("worker_count", &self.worker_count)
            .field("storage_root", &self.storage_root)
            .field("private_key_path", &self.private_key_path)
            .field("key_passphrase", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub database_path: ConfigValue<PathBuf>,
    pub listen_address: ConfigValue<IpAddr>,
    pub port: ConfigValue<u16>,
    pub verbose: ConfigValue<bool>,
    pub scheduler_tick_secs: ConfigValue<u64>,
    pub storage_root: ConfigValue<PathBuf>,
    pub key_passphrase_source: ConfigSource,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub scheduler_tick_secs: Option<u64>,
    pub port: Option<u16>,
    pub verbose: Option<bool>,
}

fn layered<T>(override_value: Option<T>, file_value: Option<T>, default: T) -> (T, ConfigSource) {
    match (override_value, file_value) {
        (Some(value), _) => (value, ConfigSource::Override),
        (None, Some(value)) => (value, ConfigSource::ConfigFile),
        (None, None) => (default, ConfigSource::Default),
    }
}

#[cfg(test)]
pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path.as_deref().and_then(|path| path.parent());
    let from_file = |raw: Option<String>| raw.map(|raw| resolve_path(&raw, base_dir));

    let (database_path, database_source) = match overrides.database_path {
        Some(path) => (expand_path(path), ConfigSource::Override),
        None => match from_file(file_config.database_path) {
            Some(path) => (path, ConfigSource::ConfigFile),
            None => (
                default_data_dir()
                    .map(|dir| dir.join(DATABASE_FILE_NAME))
                    .with_context(|| {
                        "failed to resolve default database path; specify --database-path or set database_path in the config file"
                    })?,
                ConfigSource::Default,
            ),
        },
    };

    let (port, port_source) = layered(overrides.port, file_config.port, DEFAULT_PORT);
    if port == 0 {
        anyhow::bail!("port must be between 1 and 65535");
    }
    let (listen_address, listen_address_source) = layered(
        None,
        file_config.listen_address,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
    );
    let (verbose, verbose_source) = layered(overrides.verbose, file_config.verbose, false);
    let (scheduler_tick_secs, scheduler_tick_source) = layered(
        overrides.scheduler_tick_secs,
        file_config.scheduler_tick_secs,
        DEFAULT_SCHEDULER_TICK_SECS,
    );

    let watchdog_interval_secs = file_config
        .watchdog_interval_secs
        .unwrap_or(DEFAULT_WATCHDOG_INTERVAL_SECS);
    let inoperative_threshold_mins = file_config
        .inoperative_threshold_mins
        .unwrap_or(DEFAULT_INOPERATIVE_THRESHOLD_MINS);
    let worker_count = file_config.worker_count.unwrap_or(DEFAULT_WORKER_COUNT);
    let transfer_max_retries = file_config
        .transfer_max_retries
        .unwrap_or(DEFAULT_TRANSFER_MAX_RETRIES);
    let webhook_rate_limit = file_config
        .webhook_rate_limit
        .unwrap_or(DEFAULT_WEBHOOK_RATE_LIMIT);
    let webhook_rate_window_secs = file_config
        .webhook_rate_window_secs
        .unwrap_or(DEFAULT_WEBHOOK_RATE_WINDOW_SECS);

    for (name, value) in [
        ("scheduler_tick_secs", scheduler_tick_secs),
        ("watchdog_interval_secs", watchdog_interval_secs),
        ("inoperative_threshold_mins", inoperative_threshold_mins),
        ("webhook_rate_window_secs", webhook_rate_window_secs),
    ] {
        if value == 0 {
            anyhow::bail!("{name} must be at least 1");
        }
    }
    if inoperative_threshold_mins > MAX_INOPERATIVE_THRESHOLD_MINS {
        anyhow::bail!(
            "inoperative_threshold_mins must be at most {MAX_INOPERATIVE_THRESHOLD_MINS}"
        );
    }
    if worker_count == 0 {
        anyhow::bail!("worker_count must be at least 1");
    }
    if transfer_max_retries == 0 {
        anyhow::bail!("transfer_max_retries must be at least 1");
    }
    if webhook_rate_limit == 0 {
        anyhow::bail!("webhook_rate_limit must be at least 1");
    }

    let (storage_root, storage_root_source) = match from_file(file_config.storage_root) {
        Some(path) => (path, ConfigSource::ConfigFile),
        None => (
            default_data_dir()
                .map(|dir| dir.join("storage"))
                .context("failed to resolve default storage root; set storage_root in the config file")?,
            ConfigSource::Default,
        ),
    };
    let staging_dir = match from_file(file_config.staging_dir) {
        Some(path) => path,
        None => std::env::temp_dir().join(APP_DIR_NAME),
    };
    let private_key_path = match from_file(file_config.private_key_path) {
        Some(path) => path,
        None => dirs::home_dir()
            .map(|home| home.join(".ssh").join("id_ed25519"))
            .context("failed to resolve home directory; set private_key_path in the config file")?,
    };
    let public_key_path = from_file(file_config.public_key_path)
        .unwrap_or_else(|| default_public_key_path(&private_key_path));

    let (key_passphrase, key_passphrase_source) =
        match (passphrase_from_env(), file_config.key_passphrase) {
            (Some(value), _) => (value, ConfigSource::Env),
            (None, Some(value)) => (value, ConfigSource::ConfigFile),
            (None, None) => anyhow::bail!(
                "key_passphrase is not configured; set it in the config file or via {PASSPHRASE_ENV_VAR} (use an empty value for an unencrypted key)"
            ),
        };

    let config = Config {
        database_path,
        listen_address,
        port,
        verbose,
        scheduler_tick_secs,
        watchdog_interval_secs,
        inoperative_threshold_mins,
        connectivity_sweep_secs: file_config.connectivity_sweep_secs.unwrap_or(0),
        worker_count,
        transfer_max_retries,
        transfer_retry_delay_secs: file_config
            .transfer_retry_delay_secs
            .unwrap_or(DEFAULT_TRANSFER_RETRY_DELAY_SECS),
        webhook_rate_limit,
        webhook_rate_window_secs,
        staging_dir,
        storage_root,
        private_key_path,
        public_key_path,
        key_passphrase,
        known_hosts_path: from_file(file_config.known_hosts_path),
        ssh_inactivity_timeout_secs: file_config
            .ssh_inactivity_timeout_secs
            .unwrap_or(DEFAULT_SSH_INACTIVITY_TIMEOUT_SECS),
        ssh_keepalive_secs: file_config
            .ssh_keepalive_secs
            .unwrap_or(DEFAULT_SSH_KEEPALIVE_SECS),
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        database_path: ConfigValue {
            value: config.database_path.clone(),
            source: database_source,
        },
        listen_address: ConfigValue {
            value: config.listen_address,
            source: listen_address_source,
        },
        port: ConfigValue {
            value: config.port,
            source: port_source,
        },
        verbose: ConfigValue {
            value: config.verbose,
            source: verbose_source,
        },
        scheduler_tick_secs: ConfigValue {
            value: config.scheduler_tick_secs,
            source: scheduler_tick_source,
        },
        storage_root: ConfigValue {
            value: config.storage_root.clone(),
            source: storage_root_source,
        },
        key_passphrase_source,
    };

    Ok(LoadResult { config, report })
}

/// Creates the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory {}", path.display()))
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn default_public_key_path(private_key_path: &Path) -> PathBuf {
    let mut raw = private_key_path.as_os_str().to_owned();
    raw.push(".pub");
    PathBuf::from(raw)
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn passphrase_from_env() -> Option<String> {
    std::env::var_os(PASSPHRASE_ENV_VAR).map(|value| value.to_string_lossy().into_owned())
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data directory")?;
    Ok(base.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        prev: Option<OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn clear(key: &'static str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::set_var(self.key, value);
                    }
                }
                None => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::remove_var(self.key);
                    }
                }
            }
        }
    }

    /// Holds the env lock with both backupd variables cleared.
    struct CleanEnv {
        _passphrase: EnvVarGuard,
        _config: EnvVarGuard,
        _lock: MutexGuard<'static, ()>,
    }

    fn clean_env() -> CleanEnv {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        CleanEnv {
            _config: EnvVarGuard::clear(CONFIG_ENV_VAR),
            _passphrase: EnvVarGuard::clear(PASSPHRASE_ENV_VAR),
            _lock: lock,
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("backupd.toml");
        fs::write(&config_path, body).unwrap();
        config_path
    }

    #[test]
    fn missing_optional_config_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let cfg = read_config_file(&dir.path().join("missing.toml"), false).unwrap();
        assert!(cfg.database_path.is_none());
        assert!(cfg.key_passphrase.is_none());
    }

    #[test]
    fn missing_required_config_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = read_config_file(&dir.path().join("missing.toml"), true).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "key_passphrase = \"\"\nworkers = 3\n");
        let err = read_config_file(&path, true).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn resolves_relative_paths_from_config_dir() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            "database_path = \"db/backupd.sqlite\"\nstorage_root = \"objects\"\nprivate_key_path = \"keys/id_ed25519\"\nkey_passphrase = \"\"\n",
        );
        let config_dir = config_path.parent().unwrap().to_path_buf();

        let config = load(Some(config_path.clone()), Overrides::default()).unwrap();

        assert_eq!(config.database_path, config_dir.join("db").join("backupd.sqlite"));
        assert_eq!(config.storage_root, config_dir.join("objects"));
        assert_eq!(config.private_key_path, config_dir.join("keys").join("id_ed25519"));
        assert_eq!(
            config.public_key_path,
            config_dir.join("keys").join("id_ed25519.pub")
        );
        assert_eq!(config.config_path, Some(config_path));
    }

    #[test]
    fn defaults_apply_when_keys_are_missing() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, "key_passphrase = \"\"\n");

        let LoadResult { config, report } =
            load_with_report(Some(config_path), Overrides::default()).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.listen_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.scheduler_tick_secs, 60);
        assert_eq!(config.watchdog_interval_secs, 60);
        assert_eq!(config.inoperative_threshold_mins, 30);
        assert_eq!(config.connectivity_sweep_secs, 0);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.transfer_max_retries, 3);
        assert_eq!(config.transfer_retry_delay_secs, 5);
        assert_eq!(config.webhook_rate_limit, 10);
        assert_eq!(config.webhook_rate_window_secs, 60);
        assert_eq!(config.ssh_inactivity_timeout_secs, 600);
        assert_eq!(config.ssh_keepalive_secs, 15);
        assert!(config.known_hosts_path.is_none());
        assert_eq!(report.port.source, ConfigSource::Default);
        assert_eq!(report.key_passphrase_source, ConfigSource::ConfigFile);
    }

    #[test]
    fn cli_overrides_take_precedence_per_field() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            "database_path = \"db/from_config.sqlite\"\nscheduler_tick_secs = 9\nport = 40001\nverbose = false\nkey_passphrase = \"\"\n",
        );

        let LoadResult { config, report } = load_with_report(
            Some(config_path),
            Overrides {
                database_path: Some(PathBuf::from("from_flag.sqlite")),
                scheduler_tick_secs: None,
                port: Some(40002),
                verbose: Some(true),
            },
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("from_flag.sqlite"));
        assert_eq!(config.scheduler_tick_secs, 9);
        assert_eq!(config.port, 40002);
        assert!(config.verbose);
        assert_eq!(report.database_path.source, ConfigSource::Override);
        assert_eq!(report.scheduler_tick_secs.source, ConfigSource::ConfigFile);
    }

    #[test]
    fn missing_passphrase_fails_fast() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, "port = 40001\n");

        let err = load(Some(config_path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("key_passphrase is not configured"));
    }

    #[test]
    fn passphrase_from_env_wins_over_file() {
        let _env = clean_env();
        let _pass = EnvVarGuard::set(PASSPHRASE_ENV_VAR, "from-env");
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, "key_passphrase = \"from-file\"\n");

        let LoadResult { config, report } =
            load_with_report(Some(config_path), Overrides::default()).unwrap();
        assert_eq!(config.key_passphrase, "from-env");
        assert_eq!(report.key_passphrase_source, ConfigSource::Env);
        assert!(!format!("{config:?}").contains("from-env"));
    }

    #[test]
    fn zero_values_are_rejected() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        for (body, needle) in [
            ("port = 0\n", "port"),
            ("worker_count = 0\n", "worker_count"),
            ("transfer_max_retries = 0\n", "transfer_max_retries"),
            ("webhook_rate_limit = 0\n", "webhook_rate_limit"),
            ("watchdog_interval_secs = 0\n", "watchdog_interval_secs"),
        ] {
            let config_path = write_config(&dir, &format!("key_passphrase = \"\"\n{body}"));
            let err = load(Some(config_path), Overrides::default()).unwrap_err();
            assert!(err.to_string().contains(needle), "{body}: {err}");
        }
    }

    #[test]
    fn oversized_inoperative_threshold_is_rejected() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let body = format!(
            "key_passphrase = \"\"\ninoperative_threshold_mins = {}\n",
            i64::MAX
        );
        let err = load(Some(write_config(&dir, &body)), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("inoperative_threshold_mins"), "{err}");

        let body = "key_passphrase = \"\"\ninoperative_threshold_mins = 10080\n";
        let config = load(Some(write_config(&dir, body)), Overrides::default()).unwrap();
        assert_eq!(config.inoperative_threshold_mins, 10080);
    }

    #[test]
    fn ensure_parent_dir_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("backupd.sqlite");
        ensure_parent_dir(&db_path).unwrap();
        assert!(dir.path().join("nested").is_dir());
        ensure_parent_dir(Path::new("backupd.sqlite")).unwrap();
    }

    #[test]
    fn env_config_path_used_when_no_override() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, "port = 40001\nkey_passphrase = \"\"\n");
        let _path = EnvVarGuard::set(CONFIG_ENV_VAR, config_path.to_str().unwrap());

        let LoadResult { config, report } =
            load_with_report(None, Overrides::default()).unwrap();
        assert_eq!(config.port, 40001);
        assert_eq!(config.config_path, Some(config_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Env));
    }

    #[test]
    fn cli_config_path_takes_precedence_over_env() {
        let _env = clean_env();
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("env.toml");
        let cli_path = dir.path().join("cli.toml");
        fs::write(&env_path, "port = 40001\nkey_passphrase = \"\"\n").unwrap();
        fs::write(&cli_path, "port = 40002\nkey_passphrase = \"\"\n").unwrap();
        let _path = EnvVarGuard::set(CONFIG_ENV_VAR, env_path.to_str().unwrap());

        let LoadResult { config, report } =
            load_with_report(Some(cli_path.clone()), Overrides::default()).unwrap();
        assert_eq!(config.port, 40002);
        assert_eq!(config.config_path, Some(cli_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Override));
    }
}
