//! The frozen, validated runtime configuration.
//!
//! Built once at startup from a `LoadedConfig`'s canonical JSON. Every knob
//! the pipeline reads is named here explicitly — unlike passing the loose
//! `serde_json::Value` around, a missing or mistyped key fails at startup
//! instead of surfacing as a silent default deep in some worker loop.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::loader::LoadedConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSettings {
    pub workers: u32,
    pub max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSettings {
    pub min_interval_ms: i64,
    pub lock_timeout_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerSettings {
    pub submit_timeout_ms: i64,
    pub retry_max: u32,
    pub retry_base_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaperSettings {
    pub match_timeout_ms: i64,
    pub buffer_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DswSettings {
    pub batch_size: u32,
    pub interval_min_ms: i64,
    pub interval_max_ms: i64,
    pub compress_threshold_bytes: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    pub inactive_ttl_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
}

/// The complete set of runtime knobs. Unknown top-level or nested keys fail
/// deserialization rather than being silently ignored; every field here is
/// required unless it carries an explicit `Option`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub queue: QueueSettings,
    pub order: OrderSettings,
    pub broker: BrokerSettings,
    pub paper: PaperSettings,
    pub dsw: DswSettings,
    pub session: SessionSettings,
    pub redis: RedisSettings,
    pub db: DbSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Parse and validate a `LoadedConfig`'s canonical JSON into a `Config`.
    /// Any missing required key, unknown key, or type mismatch is an error
    /// naming the offending field — never a default substituted silently.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: Config = serde_json::from_value(loaded.config_json.clone())
            .context("configuration failed validation")?;
        cfg.check_invariants()?;
        Ok(cfg)
    }

    fn check_invariants(&self) -> Result<()> {
        if self.dsw.interval_min_ms > self.dsw.interval_max_ms {
            bail!(
                "dsw.interval_min_ms ({}) must be <= dsw.interval_max_ms ({})",
                self.dsw.interval_min_ms,
                self.dsw.interval_max_ms
            );
        }
        if self.queue.workers == 0 {
            bail!("queue.workers must be >= 1");
        }
        if self.broker.retry_max == 0 {
            bail!("broker.retry_max must be >= 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_layered_yaml;
    use std::io::Write;

    fn valid_yaml() -> &'static str {
        r#"
queue:
  workers: 4
  max_size: 10000
order:
  min_interval_ms: 1000
  lock_timeout_ms: 30000
broker:
  submit_timeout_ms: 10000
  retry_max: 3
  retry_base_ms: 500
paper:
  match_timeout_ms: 60000
  buffer_size: 256
dsw:
  batch_size: 64
  interval_min_ms: 100
  interval_max_ms: 5000
  compress_threshold_bytes: 1024
session:
  inactive_ttl_ms: 28800000
redis:
  url: "redis://localhost:6379"
db:
  url: "postgres://localhost/sfp"
  max_connections: 10
logging:
  level: "info"
"#
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{content}").unwrap();
        f
    }

    #[test]
    fn valid_config_parses() {
        let f = write_temp(valid_yaml());
        let loaded = load_layered_yaml(&[f.path().to_str().unwrap()]).unwrap();
        let cfg = Config::from_loaded(&loaded).unwrap();
        assert_eq!(cfg.queue.workers, 4);
        assert_eq!(cfg.dsw.interval_min_ms, 100);
    }

    #[test]
    fn unknown_key_fails() {
        let mut yaml = valid_yaml().to_string();
        yaml.push_str("bogus_top_level_key: 1\n");
        let f = write_temp(&yaml);
        let loaded = load_layered_yaml(&[f.path().to_str().unwrap()]).unwrap();
        assert!(Config::from_loaded(&loaded).is_err());
    }

    #[test]
    fn missing_required_key_fails() {
        let yaml = valid_yaml().replace("  workers: 4\n", "");
        let f = write_temp(&yaml);
        let loaded = load_layered_yaml(&[f.path().to_str().unwrap()]).unwrap();
        assert!(Config::from_loaded(&loaded).is_err());
    }

    #[test]
    fn inverted_dsw_interval_bounds_fail_invariant_check() {
        let yaml = valid_yaml()
            .replace("interval_min_ms: 100", "interval_min_ms: 9999")
            .replace("interval_max_ms: 5000", "interval_max_ms: 100");
        let f = write_temp(&yaml);
        let loaded = load_layered_yaml(&[f.path().to_str().unwrap()]).unwrap();
        assert!(Config::from_loaded(&loaded).is_err());
    }
}
