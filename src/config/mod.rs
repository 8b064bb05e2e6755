//! Configuration module for the bridge server
//!
//! Handles server configuration from .env files, YAML files, and environment
//! variables. Priority: YAML > ENV vars > defaults.
//!
//! # Example
//! ```rust,no_run
//! use phonic_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::sts::StsAudioFormat;

mod yaml;

pub use yaml::YamlConfig;

/// Default system prompt for the voice agent.
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Keep responses brief and informative.";

/// Default welcome message spoken when a call connects.
const DEFAULT_WELCOME_MESSAGE: &str =
    "Hello! I'm your virtual assistant. How can I help you today?";

/// Default Phonic voice.
const DEFAULT_VOICE: &str = "greta";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a YAML configuration file
    #[error("Failed to parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A configuration value is invalid
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Voice agent settings sent to Phonic when a call session opens.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Phonic voice ID
    pub voice_id: String,
    /// System prompt for the assistant
    pub system_prompt: String,
    /// Message spoken when the session opens
    pub welcome_message: String,
    /// Audio format of frames sent to Phonic
    pub input_format: StsAudioFormat,
    /// Audio format of frames received from Phonic
    pub output_format: StsAudioFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            input_format: StsAudioFormat::Mulaw8000,
            output_format: StsAudioFormat::Mulaw8000,
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port, public URL, TLS)
/// - Phonic credentials and endpoint overrides
/// - Voice agent settings
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Publicly reachable base URL Twilio connects back to (ws:// or wss://).
    /// When unset, the TwiML document points at localhost, which only works
    /// for local testing.
    pub public_url: Option<String>,

    // Phonic settings
    /// Phonic API key used for the STS stream and the voices listing
    pub phonic_api_key: Option<String>,
    /// Custom STS WebSocket endpoint (defaults to the public Phonic URL)
    pub phonic_sts_url: Option<String>,
    /// Custom REST API base URL (defaults to the public Phonic URL)
    pub phonic_api_url: Option<String>,

    // Voice agent settings
    pub agent: AgentConfig,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            public_url: None,
            phonic_api_key: None,
            phonic_sts_url: None,
            phonic_api_url: None,
            agent: AgentConfig::default(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
        }
    }
}

/// Zeroize the API key when the config is dropped so the secret does not
/// linger in freed memory.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.phonic_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = env_var("HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {port}")))?;
        }
        config.public_url = env_var("PUBLIC_URL");
        config.phonic_api_key = env_var("PHONIC_API_KEY");
        config.phonic_sts_url = env_var("PHONIC_STS_URL");
        config.phonic_api_url = env_var("PHONIC_API_URL");

        if let Some(voice) = env_var("PHONIC_VOICE") {
            config.agent.voice_id = voice;
        }
        if let Some(prompt) = env_var("SYSTEM_PROMPT") {
            config.agent.system_prompt = prompt;
        }
        if let Some(message) = env_var("WELCOME_MESSAGE") {
            config.agent.welcome_message = message;
        }
        if let Some(format) = env_var("STS_INPUT_FORMAT") {
            config.agent.input_format = StsAudioFormat::from_str_or_default(&format);
        }
        if let Some(format) = env_var("STS_OUTPUT_FORMAT") {
            config.agent.output_format = StsAudioFormat::from_str_or_default(&format);
        }

        config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");
        if let Some(rps) = env_var("RATE_LIMIT_REQUESTS_PER_SECOND") {
            config.rate_limit_requests_per_second = rps.parse().map_err(|_| {
                ConfigError::Invalid(format!("RATE_LIMIT_REQUESTS_PER_SECOND is not a number: {rps}"))
            })?;
        }
        if let Some(burst) = env_var("RATE_LIMIT_BURST_SIZE") {
            config.rate_limit_burst_size = burst.parse().map_err(|_| {
                ConfigError::Invalid(format!("RATE_LIMIT_BURST_SIZE is not a number: {burst}"))
            })?;
        }

        if let (Some(cert), Some(key)) = (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
            config.tls = Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as the
    /// base layer.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = yaml::load_yaml_config(path)?;
        let config = Self::from_env()?.merged_with(yaml);
        config.validate()?;
        Ok(config)
    }

    /// Apply YAML overrides on top of this configuration.
    fn merged_with(mut self, yaml: YamlConfig) -> Self {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(public_url) = server.public_url {
                self.public_url = Some(public_url);
            }
            if let Some(tls) = server.tls
                && tls.enabled.unwrap_or(true)
                && let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path)
            {
                self.tls = Some(TlsConfig {
                    cert_path: PathBuf::from(cert),
                    key_path: PathBuf::from(key),
                });
            }
        }

        if let Some(phonic) = yaml.phonic {
            if let Some(api_key) = phonic.api_key {
                self.phonic_api_key = Some(api_key);
            }
            if let Some(sts_url) = phonic.sts_url {
                self.phonic_sts_url = Some(sts_url);
            }
            if let Some(api_url) = phonic.api_url {
                self.phonic_api_url = Some(api_url);
            }
        }

        if let Some(agent) = yaml.agent {
            if let Some(voice) = agent.voice {
                self.agent.voice_id = voice;
            }
            if let Some(prompt) = agent.system_prompt {
                self.agent.system_prompt = prompt;
            }
            if let Some(message) = agent.welcome_message {
                self.agent.welcome_message = message;
            }
            if let Some(format) = agent.input_format {
                self.agent.input_format = StsAudioFormat::from_str_or_default(&format);
            }
            if let Some(format) = agent.output_format {
                self.agent.output_format = StsAudioFormat::from_str_or_default(&format);
            }
        }

        if let Some(security) = yaml.security {
            if let Some(origins) = security.cors_allowed_origins {
                self.cors_allowed_origins = Some(origins);
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                self.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                self.rate_limit_burst_size = burst;
            }
        }

        self
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.public_url
            && !url.starts_with("ws://")
            && !url.starts_with("wss://")
        {
            return Err(ConfigError::Invalid(format!(
                "public_url must be a ws:// or wss:// URL, got: {url}"
            )));
        }

        if self.rate_limit_requests_per_second == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.rate_limit_burst_size == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_burst_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The socket address to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS is enabled.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// The media-stream WebSocket URL advertised in the TwiML document.
    pub fn stream_url(&self) -> String {
        match self.public_url {
            Some(ref base) => format!("{}/media", base.trim_end_matches('/')),
            None => format!("ws://localhost:{}/media", self.port),
        }
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
