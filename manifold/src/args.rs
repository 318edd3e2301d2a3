use std::path::PathBuf;

use clap::Parser;

/// Manifold LLM gateway
#[derive(Debug, Parser)]
#[command(name = "manifold", about = "One completion endpoint over many LLM backends")]
pub struct Args {
    /// Path to configuration file; falls back to environment variables
    /// when the file does not exist
    #[arg(short, long, default_value = "manifold.toml", env = "MANIFOLD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "MANIFOLD_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
