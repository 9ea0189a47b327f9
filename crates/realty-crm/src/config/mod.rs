use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::pipeline::{
    standard_stage_definitions, StageDefinition, StageId, StageRegistry, StageRegistryError,
    INITIAL_CONTACT,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let pipeline = PipelineConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Stage layout for this deployment.
///
/// `PIPELINE_STAGES` is a comma-separated list of `id:Name` pairs (a bare `id` uses the id as its
/// name) and defaults to the standard broker pipeline. `PIPELINE_DEFAULT_STAGE` names the stage
/// new leads land in when the form leaves it blank and defaults to `initial_contact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub default_stage: StageId,
    pub stages: Vec<StageDefinition>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_stage: StageId::from(INITIAL_CONTACT),
            stages: standard_stage_definitions(),
        }
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stages = match env::var("PIPELINE_STAGES") {
            Ok(raw) if !raw.trim().is_empty() => parse_stage_list(&raw),
            _ => standard_stage_definitions(),
        };

        let default_stage = env::var("PIPELINE_DEFAULT_STAGE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(StageId)
            .unwrap_or_else(|| StageId::from(INITIAL_CONTACT));

        let config = Self {
            default_stage,
            stages,
        };
        config.validate()?;
        Ok(config)
    }

    /// Registry must build, and the default stage must exist unless no stages are configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = StageRegistry::new(self.stages.clone()).map_err(ConfigError::Stages)?;
        if !registry.is_empty() && !registry.contains(&self.default_stage) {
            return Err(ConfigError::UnknownDefaultStage(self.default_stage.clone()));
        }
        Ok(())
    }
}

fn parse_stage_list(raw: &str) -> Vec<StageDefinition> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((id, name)) => StageDefinition::new(id.trim(), name.trim()),
            None => StageDefinition::new(entry, entry),
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    Stages(StageRegistryError),
    UnknownDefaultStage(StageId),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::Stages(err) => write!(f, "PIPELINE_STAGES is invalid: {}", err),
            ConfigError::UnknownDefaultStage(stage) => write!(
                f,
                "PIPELINE_DEFAULT_STAGE '{}' is not one of the configured stages",
                stage
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::UnknownDefaultStage(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Stages(err) => Some(err),
        }
    }
}
