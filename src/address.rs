//! Peer addresses used throughout the overlay
//!
//! See the documentation of [Address] for details.

use std::convert::TryInto;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use ed25519_dalek::PublicKey;
use rand::{self, Rng};
use sha2::{Digest, Sha256};

/// Length in bytes of an [Address].
pub const ADDRESS_LEN: usize = 20;

/// The address of a peer.
///
/// An `Address` is the first 20 bytes of the SHA-256 hash of the peer's Ed25519 public key.
/// Addresses are ordered byte-wise, which is the order used by the sorted peers view.
///
/// They are displayed as lowercase hex.
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    /// Parses a hex encoded address
    fn from_str(s: &str) -> Result<Self, crate::Error> {
        let bytes = hex::decode(s).map_err(|_| crate::Error::InvalidAddress)?;
        Address::from_slice(&bytes)
    }
}

impl Address {
    /// Derives the address of an Ed25519 public key.
    pub fn from_public_key(public_key: &PublicKey) -> Address {
        let digest = Sha256::digest(public_key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(bytes)
    }

    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Address {
        Address(bytes)
    }

    /// Wraps a slice, failing unless it is exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Address, crate::Error> {
        let bytes: [u8; ADDRESS_LEN] =
            bytes.try_into().map_err(|_| crate::Error::InvalidAddress)?;
        Ok(Address(bytes))
    }

    /// Generate a random `Address` (for testing)
    pub fn generate() -> Address {
        let mut rng = rand::thread_rng();
        let v: [u8; ADDRESS_LEN] = rng.gen();
        Address(v)
    }

    /// An address made of a single repeated byte (for testing)
    pub fn repeat(byte: u8) -> Address {
        Address([byte; ADDRESS_LEN])
    }

    pub fn bytes(&self) -> [u8; ADDRESS_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// overloads array indexing (e.g: address[1] = second byte of the address)
impl Index<usize> for Address {
    type Output = u8;

    fn index(&self, i: usize) -> &u8 {
        &self.0[i]
    }
}
