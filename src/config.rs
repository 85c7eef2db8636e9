//! Server configuration, read once from the environment at startup

use crate::runtime::hub::DEFAULT_SUBSCRIBER_BUFFER;
use crate::state_machine::state::{DEFAULT_MAX_TURNS, DEFAULT_PAUSE_TIMEOUT};
use crate::state_machine::ConversationLimits;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Allowed browser origins for cross-origin requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_origins: CorsOrigins,
    pub limits: ConversationLimits,
    pub subscriber_buffer: usize,
    /// JSON roster replacing the built-in participants
    pub participants_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Unparseable values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = get("ROUNDTABLE_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".roundtable").join("transcripts.db")
            },
            PathBuf::from,
        );

        let cors_origins = match get("ROUNDTABLE_CORS_ORIGINS").as_deref() {
            Some("*") => CorsOrigins::Any,
            Some(list) => CorsOrigins::List(
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => CorsOrigins::List(vec![DEFAULT_CORS_ORIGIN.to_string()]),
        };

        let max_turns = parse_or(&get, "ROUNDTABLE_MAX_TURNS", DEFAULT_MAX_TURNS).max(1);
        let pause_secs = parse_or(
            &get,
            "ROUNDTABLE_PAUSE_TIMEOUT_SECS",
            DEFAULT_PAUSE_TIMEOUT.as_secs(),
        );

        Self {
            port: parse_or(&get, "ROUNDTABLE_PORT", DEFAULT_PORT),
            db_path,
            cors_origins,
            limits: ConversationLimits {
                max_turns,
                pause_timeout: Duration::from_secs(pause_secs),
            },
            subscriber_buffer: parse_or(&get, "ROUNDTABLE_SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER)
                .max(1),
            participants_file: get("ROUNDTABLE_PARTICIPANTS_FILE").map(PathBuf::from),
        }
    }
}

fn parse_or<T: FromStr + Copy>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(variable = key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}
