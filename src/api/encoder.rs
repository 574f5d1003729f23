//! Response encoding for `/peers`
//!
//! Two formats:
//! - text: comma-separated peer IPs, unsigned, uncompressed
//! - binary (default): `gzip(length_delimited(SignedPeerSeeds))`, where the
//!   envelope carries the serialized `PeerSeeds`, our public key, and a DER
//!   ECDSA signature over SHA-256 of exactly those serialized bytes

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use std::io::Write;

use crate::identity::Identity;
use crate::types::{PeerRecord, PeerSeedsMessage, SignedPeerSeeds};

/// Path suffix that selects the plain-text format
pub const TEXT_SUFFIX: &str = ".txt";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Output format of a `/peers` response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedFormat {
    Text,
    SignedBinary,
}

impl SeedFormat {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(TEXT_SUFFIX) {
            SeedFormat::Text
        } else {
            SeedFormat::SignedBinary
        }
    }
}

/// Encoded body plus the headers it needs
#[derive(Debug)]
pub struct EncodedSeeds {
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub cache_control: Option<String>,
}

impl IntoResponse for EncodedSeeds {
    fn into_response(self) -> Response {
        let mut response = self.body.into_response();
        let headers = response.headers_mut();

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(cache_control) = self.cache_control {
            if let Ok(value) = HeaderValue::from_str(&cache_control) {
                headers.insert(header::CACHE_CONTROL, value);
            }
        }

        response
    }
}

/// Builds seed responses from selected peers
pub struct SeedEncoder {
    identity: Identity,
    network_name: String,
    cache_max_age_secs: u64,
}

impl SeedEncoder {
    pub fn new(identity: Identity, network_name: String, cache_max_age_secs: u64) -> Self {
        Self {
            identity,
            network_name,
            cache_max_age_secs,
        }
    }

    /// Fresh message stamped with the current time
    pub fn message(&self, peers: Vec<PeerRecord>) -> PeerSeedsMessage {
        PeerSeedsMessage {
            peers,
            timestamp: chrono::Utc::now().timestamp(),
            network_name: self.network_name.clone(),
        }
    }

    pub fn encode(
        &self,
        message: &PeerSeedsMessage,
        format: SeedFormat,
        nocache: bool,
    ) -> anyhow::Result<EncodedSeeds> {
        let (content_type, body) = match format {
            SeedFormat::Text => (TEXT_CONTENT_TYPE, message.to_ip_list().into_bytes()),
            SeedFormat::SignedBinary => (BINARY_CONTENT_TYPE, self.encode_signed(message)?),
        };

        let cache_control = (!nocache)
            .then(|| format!("no-transform,public,max-age={}", self.cache_max_age_secs));

        Ok(EncodedSeeds {
            content_type,
            body,
            cache_control,
        })
    }

    /// Serialize, sign, wrap, length-delimit and gzip
    pub fn encode_signed(&self, message: &PeerSeedsMessage) -> anyhow::Result<Vec<u8>> {
        let peer_seeds = message.to_wire().encode_to_vec();
        let signature = self.identity.sign(&peer_seeds)?;

        let envelope = SignedPeerSeeds {
            peer_seeds,
            signature,
            pubkey: self.identity.public_key_bytes(),
        };

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&envelope.encode_length_delimited_to_vec())?;
        Ok(encoder.finish()?)
    }
}
