use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid slots: {0}. Must be at least 1")]
    InvalidSlots(usize),

    #[error("Invalid sample interval: {0} ms. Must be at least 1")]
    InvalidSampleInterval(u64),

    #[error("Invalid stable sample count: {0}. Must be at least 1")]
    InvalidStableSamples(u32),

    #[error(
        "Invalid sample budget: max_samples ({max_samples}) must be at least required_stable ({required_stable})"
    )]
    InvalidSampleBudget {
        max_samples: u32,
        required_stable: u32,
    },

    #[error("Invalid render dimensions: {width}x{height}. Both must be positive")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid host grace period: {0} s. Must be at least 1")]
    InvalidGracePeriod(u64),

    #[error("Endpoint host cannot be empty")]
    EmptyEndpointHost,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. chartsnap.yaml in the working directory
    /// 3. Environment variables (CHARTSNAP_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            // 1. Start with programmatic defaults
            .merge(Serialized::defaults(Config::default()))
            // 2. Merge project config if present
            .merge(Yaml::file("chartsnap.yaml"))
            // 3. Merge environment variables (highest priority)
            .merge(Env::prefixed("CHARTSNAP_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CHARTSNAP_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.slots == 0 {
            return Err(ConfigError::InvalidSlots(config.slots));
        }

        if config.sampling.interval_ms == 0 {
            return Err(ConfigError::InvalidSampleInterval(
                config.sampling.interval_ms,
            ));
        }

        if config.sampling.required_stable == 0 {
            return Err(ConfigError::InvalidStableSamples(
                config.sampling.required_stable,
            ));
        }

        // A budget below the required run length makes settlement
        // impossible, so every job would be abandoned.
        if let Some(max_samples) = config.sampling.max_samples {
            if max_samples < config.sampling.required_stable {
                return Err(ConfigError::InvalidSampleBudget {
                    max_samples,
                    required_stable: config.sampling.required_stable,
                });
            }
        }

        if config.render.width == 0 || config.render.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: config.render.width,
                height: config.render.height,
            });
        }

        if config.host.grace_period_secs == 0 {
            return Err(ConfigError::InvalidGracePeriod(
                config.host.grace_period_secs,
            ));
        }

        if config.endpoint.host.is_empty() {
            return Err(ConfigError::EmptyEndpointHost);
        }

        if let Some(command) = &config.host.command {
            if command.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Host command cannot be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{
        EndpointConfig, HostConfig, RenderConfig, SamplingConfig,
    };

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.slots, 1);
        assert_eq!(config.sampling.interval_ms, 200);
        assert_eq!(config.sampling.required_stable, 3);
        assert_eq!(config.render.width, 600);
        assert_eq!(config.render.height, 400);
        assert_eq!(config.endpoint.port, 0);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_zero_slots() {
        let config = Config {
            slots: 0,
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidSlots(0)));
    }

    #[test]
    fn test_validate_zero_sample_interval() {
        let config = Config {
            sampling: SamplingConfig {
                interval_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidSampleInterval(0)
        ));
    }

    #[test]
    fn test_validate_zero_stable_samples() {
        let config = Config {
            sampling: SamplingConfig {
                required_stable: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidStableSamples(0)
        ));
    }

    #[test]
    fn test_validate_budget_below_required_run() {
        let config = Config {
            sampling: SamplingConfig {
                required_stable: 3,
                max_samples: Some(2),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidSampleBudget {
                max_samples: 2,
                required_stable: 3,
            }
        ));
    }

    #[test]
    fn test_validate_budget_equal_to_required_run() {
        let config = Config {
            sampling: SamplingConfig {
                required_stable: 3,
                max_samples: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_dimensions() {
        let config = Config {
            render: RenderConfig {
                width: 0,
                height: 400,
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidDimensions {
                width: 0,
                height: 400,
            }
        ));
    }

    #[test]
    fn test_validate_zero_grace_period() {
        let config = Config {
            host: HostConfig {
                grace_period_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidGracePeriod(0)
        ));
    }

    #[test]
    fn test_validate_empty_endpoint_host() {
        let config = Config {
            endpoint: EndpointConfig {
                host: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::EmptyEndpointHost
        ));
    }

    #[test]
    fn test_validate_blank_host_command() {
        let config = Config {
            host: HostConfig {
                command: Some("   ".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationFailed(_)
        ));
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "slots: 6\nsampling:\n  interval_ms: 100\nhost:\n  command: firefox"
        )
        .unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();

        assert_eq!(config.slots, 6);
        assert_eq!(config.sampling.interval_ms, 100);
        assert_eq!(config.host.command.as_deref(), Some("firefox"));
        assert_eq!(
            config.sampling.required_stable, 3,
            "Defaults should persist for fields the file omits"
        );
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("CHARTSNAP_SLOTS", Some("8")),
                ("CHARTSNAP_SAMPLING__INTERVAL_MS", Some("50")),
                ("CHARTSNAP_STRIP_ANIMATION", Some("true")),
            ],
            || {
                let config = ConfigLoader::load().expect("Config should load from env");
                assert_eq!(config.slots, 8);
                assert_eq!(config.sampling.interval_ms, 50);
                assert!(config.strip_animation);
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "slots: 2\nsampling:\n  interval_ms: 100\n  required_stable: 4"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "slots: 5\nsampling:\n  interval_ms: 25").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.slots, 5, "Override should win");
        assert_eq!(
            config.sampling.interval_ms, 25,
            "Override should win for nested fields"
        );
        assert_eq!(
            config.sampling.required_stable, 4,
            "Base value should persist when not overridden"
        );
    }
}
