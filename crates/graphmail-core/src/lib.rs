//! Core library for graphmail - Microsoft Graph users and mail from the terminal.
//!
//! This crate provides:
//! - Configuration loading and management
//! - Config file discovery and path expansion
//! - Client-credential authentication against Entra ID
//! - A thin Microsoft Graph client for users and mail
//! - Common types and error handling

pub mod config;
pub mod error;
pub mod graph;
pub mod paths;

pub use config::{AppConfig, GraphConfig, LogLevel, LoggingConfig};
pub use error::{CoreError, Result};
pub use graph::{
    AccessToken, ClientSecretCredential, Credentials, GraphClient, MessagePage, MessageSummary,
    NO_EMAIL, OutgoingMessage, TokenClaims, UserSummary, decode_claims,
};
pub use paths::AppPaths;

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "graphmail";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_prefix_is_uppercased_app_name() {
        assert_eq!(env_prefix(), "GRAPHMAIL");
    }
}
