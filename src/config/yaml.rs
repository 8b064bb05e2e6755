use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values specified
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   public_url: "wss://bridge.example.com"
///
/// phonic:
///   api_key: "your-phonic-key"
///
/// agent:
///   voice: "greta"
///   system_prompt: "You are a helpful assistant. Keep responses brief."
///   welcome_message: "Hello! How can I help you today?"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub phonic: Option<PhonicYaml>,
    pub agent: Option<AgentYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Publicly reachable base URL Twilio connects back to (ws:// or wss://)
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Phonic credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PhonicYaml {
    /// Phonic API key used for the STS stream and the voices listing
    pub api_key: Option<String>,
    /// Custom STS WebSocket endpoint
    pub sts_url: Option<String>,
    /// Custom REST API base URL
    pub api_url: Option<String>,
}

/// Voice agent settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
    pub welcome_message: Option<String>,
    pub input_format: Option<String>,
    pub output_format: Option<String>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

/// Load and parse a YAML configuration file.
pub fn load_yaml_config(path: &Path) -> Result<YamlConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: YamlConfig = serde_yaml::from_str(&contents)?;
    Ok(config)
}
