/// Database configuration and connection management
pub mod database;

/// Secrets read from environment variables
pub mod env;

/// Application settings loaded from config.toml
pub mod settings;
