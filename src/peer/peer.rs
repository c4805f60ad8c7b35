use crate::address::Address;
use crate::{Error, Result};

use ed25519_dalek::PublicKey;

use std::hash::{Hash, Hasher};

/// A staked participant of the network.
///
/// The `address` is always derived from `public_key`, so two peers with the same address are
/// the same peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// The Ed25519 public key of the peer.
    pub public_key: PublicKey,
    /// `SHA256(public_key)[..20]`.
    pub address: Address,
    /// The `host:port` the peer listens on.
    pub service_url: String,
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl Peer {
    pub fn new(public_key: PublicKey, service_url: String) -> Self {
        let address = Address::from_public_key(&public_key);
        Peer { public_key, address, service_url }
    }

    /// Parse a peer description from the format `PUBKEY_HEX@HOST:PORT`.
    pub fn from_description(s: &str) -> Result<Peer> {
        let parts: Vec<&str> = s.split('@').collect();
        if parts.len() != 2 || parts[1].is_empty() {
            return Err(Error::PeerParseError);
        }
        let key_bytes = hex::decode(parts[0]).map_err(|_| Error::PeerParseError)?;
        let public_key = PublicKey::from_bytes(&key_bytes)?;
        Ok(Peer::new(public_key, parts[1].to_owned()))
    }
}
