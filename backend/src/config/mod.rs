//! Central module for application-wide configuration settings.
//!
//! Settings come from command-line flags with environment fallbacks: the bind
//! address, which backend-as-a-service implementation to use and its
//! credentials, and how long the route guard waits for a session to settle.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Hosted Supabase project (GoTrue + PostgREST).
    Supabase,
    /// In-process tables and user directory, for local development.
    Memory,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "hconnect", about = "H Connect healthcare scheduling backend")]
pub struct Config {
    #[arg(long, env = "HCONNECT_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    #[arg(long, env = "HCONNECT_BACKEND", value_enum, default_value_t = Backend::Supabase)]
    pub backend: Backend,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,

    /// Upper bound on how long a guarded request waits for the session to
    /// finish loading before answering with the loading indicator.
    #[arg(long, env = "HCONNECT_RESOLVER_WAIT_MS", default_value_t = 2000)]
    pub resolver_wait_ms: u64,

    /// Browser sessions unused for this long are dropped.
    #[arg(long, env = "HCONNECT_SESSION_IDLE_SECS", default_value_t = 3600)]
    pub session_idle_secs: u64,
}

impl Config {
    pub fn resolver_wait(&self) -> Duration {
        Duration::from_millis(self.resolver_wait_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Supabase URL and anon key, required when the Supabase backend is selected.
    pub fn supabase_credentials(&self) -> Result<(String, String), AppError> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                Ok((url.clone(), key.clone()))
            }
            _ => Err(AppError::Config(
                "the supabase backend needs --supabase-url and --supabase-anon-key".to_string(),
            )),
        }
    }

    /// Configuration for tests: memory backend, short guard wait.
    #[cfg(test)]
    pub fn memory() -> Self {
        Config {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            backend: Backend::Memory,
            supabase_url: None,
            supabase_anon_key: None,
            resolver_wait_ms: 500,
            session_idle_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_defaults() {
        let config = Config::try_parse_from(["hconnect", "--backend", "memory"]).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.resolver_wait(), Duration::from_millis(2000));
        assert_eq!(config.session_idle(), Duration::from_secs(3600));
    }

    #[test]
    fn supabase_requires_credentials() {
        let mut config = Config::memory();
        assert!(config.supabase_credentials().is_err());
        config.supabase_url = Some("https://example.supabase.co".into());
        config.supabase_anon_key = Some("anon".into());
        assert!(config.supabase_credentials().is_ok());
    }
}
