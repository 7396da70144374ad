//! Loader for keeper configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached, with `KEEPER_`-prefixed
//! environment variables always winning (`KEEPER_FETCH__USE_PROXY=true` maps to
//! `fetch.use_proxy`). String values may reference other variables as `${VAR}`;
//! those are expanded after merging. Every field has a default, so an empty
//! source set yields a usable configuration.
use config::{Config, ConfigError, Environment, File};
use keeper_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Root of the archive: documents, `images/` and `INDEX.json` live here.
    pub output_dir: PathBuf,
    pub fetch: FetchSettings,
    pub log: LogSettings,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("articles"),
            fetch: FetchSettings::default(),
            log: LogSettings::default(),
        }
    }
}

/// Knobs for the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Total attempts per page request.
    pub retries: usize,
    pub page_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub base_delay_secs: f64,
    /// Add 0.5–2.0 s of jitter on top of `base_delay_secs` before each page request.
    pub random_delay: bool,
    pub rotate_user_agent: bool,
    pub use_proxy: bool,
    /// `host:port` entries.
    pub proxies: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            page_timeout_secs: 15,
            image_timeout_secs: 30,
            base_delay_secs: 1.0,
            random_delay: true,
            rotate_user_agent: true,
            use_proxy: false,
            proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            stderr: false,
            filter: "info".into(),
            dir: None,
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct KeeperConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for KeeperConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl KeeperConfigLoader {
    /// Start with no file sources; `KEEPER_` env overrides are always applied last.
    ///
    /// ```
    /// use keeper_config::KeeperConfigLoader;
    ///
    /// let config = KeeperConfigLoader::new()
    ///     .with_yaml_str("output_dir: archive")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.output_dir.to_str(), Some("archive"));
    /// assert_eq!(config.fetch.retries, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI).
    ///
    /// ```
    /// use keeper_config::KeeperConfigLoader;
    ///
    /// let cfg = KeeperConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// fetch:
    ///   use_proxy: true
    ///   proxies: ["10.0.0.1:8080", "10.0.0.2:8080"]
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(cfg.fetch.use_proxy);
    /// assert_eq!(cfg.fetch.proxies.len(), 2);
    /// assert!(cfg.fetch.random_delay);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// Attached sources apply in order, then the environment. `${VAR}`
    /// placeholders are expanded before the typed structs are built.
    pub fn load(self) -> Result<KeeperConfig, ConfigError> {
        let builder = self.builder.add_source(
            Environment::with_prefix("KEEPER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("fetch.proxies"),
        );

        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
