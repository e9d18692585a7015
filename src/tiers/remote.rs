//! Remote blob store reached over HTTP.
//!
//! The whole collection is one JSON value: `GET` fetches it, `PUT` replaces
//! it. There is no versioning, so concurrent writers from different devices
//! race and the last `PUT` wins.

use std::time::Duration;

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::config::{RemoteConfig, RemoteProtocol};
use crate::error::StoreError;
use crate::review_model::ReviewRecord;
use crate::tiers::{encode_collection, CollectionStore, TierKind};

pub struct RemoteStore {
    agent: ureq::Agent,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self { agent, config }
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn read_url(&self) -> String {
        match self.config.protocol {
            RemoteProtocol::RealtimeDatabase => self.base_url().to_string(),
            RemoteProtocol::VersionedBlob => format!("{}/latest", self.base_url()),
        }
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => request.set(&self.config.api_key_header, key),
            _ => request,
        }
    }
}

impl CollectionStore for RemoteStore {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    fn is_available(&self) -> bool {
        self.config.is_active()
    }

    fn read_collection(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        let url = self.read_url();
        debug!("Fetching remote review collection from {url}");
        let request = self.authorize(self.agent.get(&url).set("Accept", "application/json"));
        let response = request.call().map_err(unavailable_from_ureq)?;
        let body = response.into_string().map_err(|e| StoreError::Backend {
            tier: TierKind::Remote,
            detail: format!("failed to read response body: {e}"),
        })?;
        let value: JsonValue = serde_json::from_str(&body).map_err(|e| StoreError::MalformedData {
            tier: TierKind::Remote,
            detail: e.to_string(),
        })?;
        decode_remote_collection(value)
    }

    fn write_collection(&self, records: &[ReviewRecord]) -> Result<(), StoreError> {
        let body = encode_collection(TierKind::Remote, records)?;
        let request = self.authorize(
            self.agent
                .put(self.base_url())
                .set("Content-Type", "application/json"),
        );
        let response = request.send_string(&body).map_err(unavailable_from_ureq)?;
        if (200..=299).contains(&response.status()) {
            Ok(())
        } else {
            Err(StoreError::Backend {
                tier: TierKind::Remote,
                detail: format!("write failed with http status {}", response.status()),
            })
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write_collection(&[])
    }
}

/// Accepts every collection shape the supported providers return: a bare
/// array, `null` for an empty store, an envelope with a `record` field, or a
/// keyed object whose values are records.
pub fn decode_remote_collection(value: JsonValue) -> Result<Vec<ReviewRecord>, StoreError> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(_) => serde_json::from_value(value).map_err(|e| StoreError::MalformedData {
            tier: TierKind::Remote,
            detail: e.to_string(),
        }),
        JsonValue::Object(mut map) => {
            if let Some(inner) = map.remove("record") {
                return decode_remote_collection(inner);
            }
            let mut records = Vec::with_capacity(map.len());
            for (key, entry) in map {
                match serde_json::from_value::<ReviewRecord>(entry) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping malformed remote entry {key}: {e}"),
                }
            }
            Ok(records)
        }
        other => Err(StoreError::MalformedData {
            tier: TierKind::Remote,
            detail: format!("unexpected collection shape: {other}"),
        }),
    }
}

fn unavailable_from_ureq(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(code, _) => StoreError::Backend {
            tier: TierKind::Remote,
            detail: format!("http status {code}"),
        },
        ureq::Error::Transport(transport) => StoreError::Backend {
            tier: TierKind::Remote,
            detail: format!("transport error: {transport}"),
        },
    }
}
