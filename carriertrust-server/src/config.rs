use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use carriertrust_core::UserId;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Base URL of the identity provider's auth API (`<auth_url>/user`).
    pub auth_url: Option<String>,
    /// API key sent with identity lookups. Required when `auth_url` is set.
    pub backend_api_key: Option<String>,
    /// Base URL of the notification functions. Without it, notifications
    /// are only logged.
    pub functions_url: Option<String>,
    pub functions_key: Option<String>,
    /// Users granted the admin capability at startup.
    pub admin_user_ids: Vec<UserId>,
    /// Development token table, `token=user_id:email;...`.
    pub static_tokens: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = lookup("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let auth_url = parse_optional(lookup("AUTH_URL"));
        let backend_api_key = parse_optional(lookup("BACKEND_API_KEY"));
        if auth_url.is_some() && backend_api_key.is_none() {
            bail!("BACKEND_API_KEY environment variable is required when AUTH_URL is set");
        }

        let functions_url = parse_optional(lookup("FUNCTIONS_URL"));
        let functions_key = parse_optional(lookup("FUNCTIONS_KEY"));
        if functions_url.is_some() && functions_key.is_none() {
            bail!("FUNCTIONS_KEY environment variable is required when FUNCTIONS_URL is set");
        }

        let static_tokens = parse_optional(lookup("STATIC_TOKENS"));
        if auth_url.is_none() && static_tokens.is_none() {
            bail!("Either AUTH_URL or STATIC_TOKENS must be set to authenticate users");
        }

        let admin_user_ids = parse_admin_user_ids(lookup("ADMIN_USER_IDS").as_deref());

        Ok(Config {
            port,
            state_dir,
            auth_url,
            backend_api_key,
            functions_url,
            functions_key,
            admin_user_ids,
            static_tokens,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("carriertrust.db")
    }
}

/// Treat missing, empty and whitespace-only values as unset.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Comma-separated user ids; blanks are ignored.
pub fn parse_admin_user_ids(value: Option<&str>) -> Vec<UserId> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(UserId::from)
        .collect()
}
