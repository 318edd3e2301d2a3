//! Configuration for the Manifold gateway
//!
//! Configuration comes from a TOML file with `{{ env.VAR }}` placeholder
//! expansion, or entirely from environment variables for deployments that
//! ship no config file.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod env;
mod loader;
mod providers;
mod server;

use serde::Deserialize;

pub use providers::{ProviderConfig, ProviderKind};
pub use server::ServerConfig;

/// Top-level gateway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Backend provider configurations, in pool order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Build a configuration entirely from environment variables
    ///
    /// Recognizes the per-provider variable families (`OPENAI_API_KEY[S]`,
    /// `QWEN_API_KEY[S]`, `DEEPSEEK_API_KEY[S]`, `CLAUDE_ACCESS_KEY[S]`,
    /// `GEMINI_API_KEY[S]` and their companions). Comma-separated key lists
    /// yield one pool entry per key.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider can be assembled from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let providers = providers::from_env();
        if providers.is_empty() {
            anyhow::bail!("no provider configurations found in environment variables");
        }

        Ok(Self {
            server: ServerConfig::default(),
            providers,
        })
    }
}
