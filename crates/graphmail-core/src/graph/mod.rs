//! Microsoft Graph access with app-only authentication.
//!
//! This module provides:
//! - Client-credential token acquisition and caching
//! - A Graph client for users, inbox listing and sending mail
//! - Wire models and their terminal projections

pub mod auth;
pub mod client;
pub mod models;

pub use auth::{AccessToken, ClientSecretCredential, Credentials, TokenClaims, decode_claims};
pub use client::GraphClient;
pub use models::{MessagePage, MessageSummary, NO_EMAIL, OutgoingMessage, UserSummary};
