//! Seed signing identity
//!
//! A secp256k1 keypair loaded once at startup. Peer lists are signed with
//! ECDSA over the SHA-256 digest of the serialized payload, DER-encoded, so
//! nodes can reject lists altered by caches or proxies in between.
//!
//! The private key lives in a single-line hex file next to the data directory.
//! It is created on first start and never rotated while the process runs.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// secp256k1 private scalar length
const SECRET_KEY_LENGTH: usize = 32;

/// Immutable signing identity of this seed
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Fresh random identity
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Rebuild an identity from raw private key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(IdentityError::InvalidKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LENGTH,
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;

        Ok(Self { signing_key })
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .as_affine()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// DER-encoded ECDSA signature over SHA-256 of `payload`
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let digest = Sha256::digest(payload);
        let signature: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|e| IdentityError::Signing(e.to_string()))?;

        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// KEY FILE
// =============================================================================

/// Load the identity from `path`, or create and persist a new one if the
/// file does not exist.
///
/// Only the first line of an existing file is read. It is trimmed and
/// hex-decoded case-insensitively. Any failure here must stop startup.
pub async fn load_or_create_identity(path: &Path) -> Result<Identity, IdentityError> {
    if tokio::fs::try_exists(path).await? {
        info!("🔑 Loading seed identity from {:?}", path);
        load_identity(path).await
    } else {
        info!("🔑 No key file at {:?}, generating new identity", path);
        let identity = Identity::generate();
        save_identity(&identity, path).await?;
        info!("🔑 Identity saved to {:?}", path);
        Ok(identity)
    }
}

/// Write the private key as one lowercase hex line
pub async fn save_identity(identity: &Identity, path: &Path) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let line = format!("{}\n", identity.secret_hex());
    tokio::fs::write(path, line).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

/// Read an identity from an existing key file
pub async fn load_identity(path: &Path) -> Result<Identity, IdentityError> {
    let content = tokio::fs::read_to_string(path).await?;
    let first_line = content.lines().next().unwrap_or("").trim();
    let bytes = hex::decode(first_line)?;
    Identity::from_secret_bytes(&bytes)
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("key file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("key file is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

// =============================================================================
// TESTS
// =============================================================================
