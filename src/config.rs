// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase Web API key (used for the Auth REST endpoints)
    pub firebase_api_key: String,
    /// GCP / Firebase project ID
    pub gcp_project_id: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Firebase Auth emulator `host:port`, if running against the emulator
    pub auth_emulator_host: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            auth_emulator_host: env::var("FIREBASE_AUTH_EMULATOR_HOST")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: "test_api_key".to_string(),
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            auth_emulator_host: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_API_KEY", "  test_key \n");
        env::set_var("PORT", "not-a-port");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_api_key, "test_key");
        assert_eq!(config.port, 8080);

        env::remove_var("PORT");
    }
}
