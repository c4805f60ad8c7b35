use crate::{Error, Result};

use base58check::ToBase58Check;
use ed25519_dalek::PublicKey;

use std::fmt;

/// The host-native identity of a peer: its Ed25519 public key.
///
/// Displayed using the Base58check format.
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize)]
pub struct PeerId([u8; 32]);

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_base58check(0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_base58check(0))
    }
}

impl PeerId {
    pub fn from_public_key(public_key: &PublicKey) -> PeerId {
        PeerId(public_key.to_bytes())
    }

    /// Recovers the public key, failing if the bytes are not a valid curve point.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_bytes(&self.0).map_err(|_| Error::InvalidPublicKey)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
