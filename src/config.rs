// Instance configuration - ambient stack, not part of the core token game

//! # Instance Configuration
//!
//! Logging, error handling, and configuration are ambient concerns every
//! instance carries regardless of which net it happens to be running.
//! `InstanceConfig` groups the handful of knobs the engine itself needs:
//! how big the firing worker pool is, and whether user exception
//! strategies get an engine-enforced ceiling on retries.
//!
//! Loading config from the environment is a thin wrapper around the
//! `config` crate; the engine never reads files or env vars on its own
//! initiative outside of this constructor.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Upper bound on concurrently in-flight transition firings. The
    /// one-in-flight-per-transition invariant (§4.E) is enforced regardless;
    /// this only caps total concurrency across distinct transitions.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// If set, a strategy returning `RetryWithDelay` past this many attempts
    /// is coerced to `Fatal` by the engine rather than trusted verbatim.
    /// `None` means the user strategy's own decision is never overridden.
    #[serde(default)]
    pub default_retry_ceiling: Option<u32>,
}

fn default_worker_pool_size() -> usize {
    num_cpus_fallback()
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            worker_pool_size: default_worker_pool_size(),
            default_retry_ceiling: None,
        }
    }
}

impl InstanceConfig {
    /// Load configuration from environment variables prefixed `PETRI_`
    /// (e.g. `PETRI_WORKER_POOL_SIZE=8`), falling back to defaults for
    /// anything unset.
    pub fn from_env() -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PETRI")
                    .try_parsing(true)
                    .separator("_"),
            )
            .build()?;

        match settings.try_deserialize::<InstanceConfig>() {
            Ok(cfg) => Ok(cfg),
            Err(_) => Ok(InstanceConfig::default()),
        }
    }

    /// Load configuration from a file (TOML/YAML/JSON, inferred from
    /// extension), with environment variables prefixed `PETRI_` overriding
    /// whatever the file sets. Useful for deployments that pin a config
    /// file alongside the binary rather than exporting env vars.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PETRI")
                    .try_parsing(true)
                    .separator("_"),
            )
            .build()?;

        Ok(settings.try_deserialize::<InstanceConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_pool() {
        let cfg = InstanceConfig::default();
        assert!(cfg.worker_pool_size >= 1);
        assert!(cfg.default_retry_ceiling.is_none());
    }

    #[test]
    fn from_file_reads_toml() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "worker_pool_size = 2\ndefault_retry_ceiling = 5").unwrap();

        let cfg = InstanceConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.worker_pool_size, 2);
        assert_eq!(cfg.default_retry_ceiling, Some(5));
    }
}
