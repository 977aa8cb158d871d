//! Process configuration.
//!
//! All credentials come from the environment (optionally via a `.env` file).
//! Validation happens once at construction: every missing required variable is
//! collected and reported together, before any network call is made.

use thiserror::Error;

pub const ENV_SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_SPOTIFY_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_SPOTIFY_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "missing required environment variables: {}. Set them in the environment or in a .env file.",
        .0.join(", ")
    )]
    Missing(Vec<String>),
}

/// Resolved configuration, built once at startup and passed by reference into
/// the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_redirect_uri: String,
    pub openai_api_key: String,
    pub openai_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Separated from
    /// `from_env` so validation can be tested without touching process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |key: &str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let spotify_client_id = require(ENV_SPOTIFY_CLIENT_ID);
        let spotify_client_secret = require(ENV_SPOTIFY_CLIENT_SECRET);
        let openai_api_key = require(ENV_OPENAI_API_KEY);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            spotify_client_id,
            spotify_client_secret,
            spotify_redirect_uri: lookup(ENV_SPOTIFY_REDIRECT_URI)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            openai_api_key,
            openai_model: lookup(ENV_OPENAI_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}
