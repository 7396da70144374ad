//! Turns the loaded configuration plus command-line overrides into the
//! immutable values the library crates take.

use std::path::PathBuf;
use std::time::Duration;

use keeper_archive::ArchiveConfig;
use keeper_common::observability::LogConfig;
use keeper_config::KeeperConfig;
use keeper_http::{FetchPolicy, parse_proxy_list};

/// Flags that win over whatever the config file and environment said.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    /// Raw `host:port` list; enables proxying when non-empty.
    pub proxy: Option<String>,
    pub no_delay: bool,
}

pub fn apply(mut cfg: KeeperConfig, overrides: &Overrides) -> KeeperConfig {
    if let Some(dir) = &overrides.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(raw) = &overrides.proxy {
        let proxies = parse_proxy_list(raw);
        if !proxies.is_empty() {
            cfg.fetch.use_proxy = true;
            cfg.fetch.proxies = proxies;
        }
    }
    if overrides.no_delay {
        cfg.fetch.base_delay_secs = 0.0;
        cfg.fetch.random_delay = false;
    }
    cfg
}

pub fn fetch_policy(cfg: &KeeperConfig) -> FetchPolicy {
    let fetch = &cfg.fetch;
    // config entries may themselves be comma or newline separated
    let proxies = fetch
        .proxies
        .iter()
        .flat_map(|raw| parse_proxy_list(raw))
        .collect();

    FetchPolicy {
        attempts: fetch.retries.max(1),
        page_timeout: Duration::from_secs(fetch.page_timeout_secs),
        asset_timeout: Duration::from_secs(fetch.image_timeout_secs),
        base_delay: Duration::try_from_secs_f64(fetch.base_delay_secs).unwrap_or(Duration::ZERO),
        random_delay: fetch.random_delay,
        rotate_user_agent: fetch.rotate_user_agent,
        use_proxy: fetch.use_proxy,
        proxies,
        ..FetchPolicy::default()
    }
}

pub fn archive_config(cfg: &KeeperConfig) -> ArchiveConfig {
    ArchiveConfig::new(&cfg.output_dir)
}

pub fn log_config(cfg: &KeeperConfig) -> LogConfig {
    LogConfig {
        log_dir: cfg.log.dir.clone(),
        emit_stderr: cfg.log.stderr,
        format: cfg.log.format,
        default_filter: cfg.log.filter.clone(),
        ..LogConfig::default()
    }
}
