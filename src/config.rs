//! Runtime configuration.
//!
//! The host passes a JSON document to [`crate::create_review_store`]; any
//! missing field takes its default. [`ReviewConfig::from_env`] builds the same
//! structure from `REVIEWS_*` environment variables, ignoring values that do
//! not parse or fall outside their accepted range.

use std::env;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::dedup::DUPLICATE_WINDOW_MS;
use crate::retry::RetryPolicy;

pub const DEFAULT_DB_PATH: &str = "customer_reviews";
pub const DEFAULT_LOCAL_CAPACITY: usize = 100;
pub const DEFAULT_DISPLAY_LIMIT: usize = 20;
pub const DEFAULT_RATE_LIMIT_MS: i64 = 60_000;
pub const DEFAULT_NOTICE_TTL_MS: i64 = 5_000;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_API_KEY_HEADER: &str = "X-Master-Key";

/// Wire protocol spoken by the remote blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteProtocol {
    /// `GET`/`PUT` on the endpoint itself; the body is the bare collection.
    #[default]
    RealtimeDatabase,
    /// `GET <endpoint>/latest` returns `{"record": [...]}`; `PUT <endpoint>`
    /// replaces the collection.
    VersionedBlob,
}

impl RemoteProtocol {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "realtime_database" | "realtime" => Some(Self::RealtimeDatabase),
            "versioned_blob" | "blob" => Some(Self::VersionedBlob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub protocol: RemoteProtocol,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protocol: RemoteProtocol::default(),
            endpoint: String::new(),
            api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    /// Remote storage is used only when enabled and pointed somewhere.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.endpoint.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// LMDB location; the environment lives in `<db_path>.lmdb`.
    pub db_path: String,
    pub local_quota_bytes: Option<usize>,
    pub local_capacity: usize,
    pub display_limit: usize,
    pub duplicate_window_ms: i64,
    pub rate_limit_ms: i64,
    pub retry: RetryPolicy,
    pub notice_ttl_ms: i64,
    pub user_agent: String,
    pub remote: RemoteConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            local_quota_bytes: None,
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            duplicate_window_ms: DUPLICATE_WINDOW_MS,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            retry: RetryPolicy::default(),
            notice_ttl_ms: DEFAULT_NOTICE_TTL_MS,
            user_agent: String::new(),
            remote: RemoteConfig::default(),
        }
    }
}

impl ReviewConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config.normalized())
    }

    /// Replaces limits that would leave the store unusable with their
    /// defaults.
    pub fn normalized(mut self) -> Self {
        if self.local_capacity == 0 {
            warn!("local_capacity of 0 ignored, using {DEFAULT_LOCAL_CAPACITY}");
            self.local_capacity = DEFAULT_LOCAL_CAPACITY;
        }
        if self.display_limit == 0 {
            warn!("display_limit of 0 ignored, using {DEFAULT_DISPLAY_LIMIT}");
            self.display_limit = DEFAULT_DISPLAY_LIMIT;
        }
        self
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(path) = env_string("REVIEWS_DB_PATH") {
            config.db_path = path;
        }
        if let Some(enabled) = env::var("REVIEWS_REMOTE_ENABLED").ok().and_then(|v| parse_flag(&v)) {
            config.remote.enabled = enabled;
        }
        if let Some(protocol) = env::var("REVIEWS_REMOTE_PROTOCOL")
            .ok()
            .and_then(|v| RemoteProtocol::parse(&v))
        {
            config.remote.protocol = protocol;
        }
        if let Some(endpoint) = env_string("REVIEWS_REMOTE_URL") {
            config.remote.endpoint = endpoint;
        }
        if let Some(key) = env_string("REVIEWS_REMOTE_API_KEY") {
            config.remote.api_key = Some(key);
        }
        if let Some(timeout) = env::var("REVIEWS_REMOTE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| (100..=60_000).contains(v))
        {
            config.remote.timeout_ms = timeout;
        }

        config
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
