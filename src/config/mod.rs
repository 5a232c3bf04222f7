//! Configuration management for `poker_jira`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`PPJ_*`)
//! 3. Project config (.poker/config.yaml)
//! 4. User config (~/.config/ppj/config.yaml)
//! 5. Defaults

use crate::error::{PokerError, Result};
use crate::secret::FieldCipher;
use crate::storage::SqliteStorage;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workspace directory name.
pub const WORKSPACE_DIR: &str = ".poker";
/// Default database filename inside the workspace.
pub const DEFAULT_DB_FILENAME: &str = "poker.db";
/// Project config filename inside the workspace.
pub const CONFIG_FILENAME: &str = "config.yaml";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;

/// Environment variables and the config keys they set.
const ENV_KEYS: &[(&str, &str)] = &[
    ("PPJ_DB", "db"),
    ("PPJ_LOCK_TIMEOUT", "lock-timeout"),
    ("PPJ_SECRET_KEY", "secret-key"),
    ("PPJ_FIELD_ENCRYPTION_KEYS", "field-encryption-keys"),
    ("PPJ_TRACKER_CONNECT_TIMEOUT", "tracker.connect-timeout"),
    ("PPJ_TRACKER_READ_TIMEOUT", "tracker.read-timeout"),
    ("PPJ_TRACKER_MAX_RETRIES", "tracker.max-retries"),
    ("PPJ_TRACKER_PAGE_SIZE", "tracker.page-size"),
    ("PPJ_IMPORT_MAX_RESULTS", "import.max-results"),
];

/// Keys whose values are never printed.
const SECRET_KEYS: &[&str] = &["secret-key", "field-encryption-keys"];

/// Locate the `.poker` workspace: `PPJ_DIR`, else the nearest ancestor of
/// `start` (or the CWD) that contains one.
///
/// # Errors
///
/// Returns `NotInitialized` if no workspace is found, or an I/O error if the
/// CWD cannot be read.
pub fn discover_poker_dir(start: Option<&Path>) -> Result<PathBuf> {
    let env_dir = env::var("PPJ_DIR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);
    discover_poker_dir_with_env(start, env_dir.as_deref())
}

fn discover_poker_dir_with_env(start: Option<&Path>, env_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = env_dir {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(WORKSPACE_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !current.pop() {
            break;
        }
    }

    Err(PokerError::NotInitialized)
}

/// A flat map of normalized config keys (`tracker.page-size`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Set a key, normalizing it first.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Look up a key; empty values count as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&normalize_key(key))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build a layer from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut flat = HashMap::new();
        flatten_yaml(&value, "", &mut flat);
        let mut layer = Self::default();
        for (key, value) in flat {
            layer.set(&key, value);
        }
        Ok(layer)
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_vars(env::vars())
    }

    /// Build a layer from `(name, value)` pairs; unknown names are ignored.
    #[must_use]
    pub fn from_env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::default();
        for (name, value) in vars {
            if let Some((_, key)) = ENV_KEYS.iter().find(|(env_name, _)| *env_name == name.as_ref())
            {
                layer.set(key, value);
            }
        }
        layer
    }

    /// Sorted key/value pairs with secret values masked, for display.
    #[must_use]
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(key, value)| {
                let shown = if SECRET_KEYS.contains(&key.as_str()) {
                    "<redacted>".to_string()
                } else {
                    value.clone()
                };
                (key.clone(), shown)
            })
            .collect()
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db: Option<PathBuf>,
    pub lock_timeout: Option<u64>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        if let Some(path) = &self.db {
            layer.set("db", path.to_string_lossy());
        }
        if let Some(lock_timeout) = self.lock_timeout {
            layer.set("lock-timeout", lock_timeout.to_string());
        }
        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set("lock-timeout", DEFAULT_LOCK_TIMEOUT_MS.to_string());
    layer.set("tracker.connect-timeout", "5");
    layer.set("tracker.read-timeout", "15");
    layer.set("tracker.max-retries", "0");
    layer.set("tracker.page-size", "50");
    layer
}

/// Load project config (.poker/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(poker_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&poker_dir.join(CONFIG_FILENAME))
}

/// Load user config (~/.config/ppj/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("ppj")
        .join(CONFIG_FILENAME);
    ConfigLayer::from_yaml(&path)
}

/// Load configuration with the full precedence chain.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(poker_dir: &Path, cli: &CliOverrides) -> Result<ConfigLayer> {
    Ok(ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_user_config()?,
        load_project_config(poker_dir)?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]))
}

/// Network settings for the tracker client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Extra attempts after a connection failure.
    pub max_retries: u32,
    pub page_size: usize,
    /// Cap on imported issues; `None` imports everything.
    pub max_results: Option<usize>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(15),
            max_retries: 0,
            page_size: 50,
            max_results: None,
        }
    }
}

impl TrackerSettings {
    /// Read tracker settings; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `PokerError::Config` for values that do not parse or are out
    /// of range.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let defaults = Self::default();
        let page_size = parse_value::<usize>(layer, "tracker.page-size")?
            .unwrap_or(defaults.page_size);
        if page_size == 0 {
            return Err(PokerError::Config(
                "tracker.page-size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            connect_timeout: parse_seconds(layer, "tracker.connect-timeout")?
                .unwrap_or(defaults.connect_timeout),
            read_timeout: parse_seconds(layer, "tracker.read-timeout")?
                .unwrap_or(defaults.read_timeout),
            max_retries: parse_value(layer, "tracker.max-retries")?
                .unwrap_or(defaults.max_retries),
            page_size,
            max_results: parse_value(layer, "import.max-results")?,
        })
    }
}

/// Build the password cipher: `field-encryption-keys` (comma separated,
/// newest first), else `secret-key`.
///
/// # Errors
///
/// Returns `PokerError::Secret` if neither is configured.
pub fn cipher_from_layer(layer: &ConfigLayer) -> Result<FieldCipher> {
    if let Some(keys) = layer.get("field-encryption-keys") {
        return FieldCipher::new(keys.split(',').map(str::trim));
    }
    match layer.get("secret-key") {
        Some(key) => FieldCipher::new([key]),
        None => FieldCipher::new(Vec::<&str>::new()),
    }
}

/// Busy timeout for the database in milliseconds.
///
/// # Errors
///
/// Returns `PokerError::Config` if the value is not a number.
pub fn lock_timeout_from_layer(layer: &ConfigLayer) -> Result<u64> {
    Ok(parse_value(layer, "lock-timeout")?.unwrap_or(DEFAULT_LOCK_TIMEOUT_MS))
}

/// Database path: the `db` key, else `.poker/poker.db`.
#[must_use]
pub fn db_path_from_layer(poker_dir: &Path, layer: &ConfigLayer) -> PathBuf {
    layer
        .get("db")
        .map_or_else(|| poker_dir.join(DEFAULT_DB_FILENAME), PathBuf::from)
}

/// Everything a command needs from the workspace.
#[derive(Debug)]
pub struct Workspace {
    pub poker_dir: PathBuf,
    pub db_path: PathBuf,
    pub config: ConfigLayer,
    pub tracker: TrackerSettings,
}

/// Load config for the workspace and open its database.
///
/// # Errors
///
/// Returns an error if config is invalid, no key is configured, or the
/// database cannot be opened.
pub fn open_storage(poker_dir: &Path, cli: &CliOverrides) -> Result<(SqliteStorage, Workspace)> {
    let config = load_config(poker_dir, cli)?;
    let tracker = TrackerSettings::from_layer(&config)?;
    let cipher = cipher_from_layer(&config)?;
    let lock_timeout = lock_timeout_from_layer(&config)?;
    let db_path = db_path_from_layer(poker_dir, &config);

    let storage = SqliteStorage::open_with_timeout(&db_path, cipher, Some(lock_timeout))?;
    Ok((
        storage,
        Workspace {
            poker_dir: poker_dir.to_path_buf(),
            db_path,
            config,
            tracker,
        },
    ))
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn parse_value<T: std::str::FromStr>(layer: &ConfigLayer, key: &str) -> Result<Option<T>> {
    layer
        .get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| PokerError::Config(format!("invalid value for {key}: {raw:?}")))
        })
        .transpose()
}

fn parse_seconds(layer: &ConfigLayer, key: &str) -> Result<Option<Duration>> {
    let Some(seconds) = parse_value::<f64>(layer, key)? else {
        return Ok(None);
    };
    if seconds <= 0.0 {
        return Err(PokerError::Config(format!(
            "{key} must be a positive number of seconds"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| PokerError::Config(format!("{key} is out of range: {seconds}")))
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
