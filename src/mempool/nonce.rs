use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use tracing::warn;

/// Returns a non-zero random nonce.
///
/// The nonce is drawn from the operating system's entropy source, falling back to the thread
/// local generator if that source fails.
pub fn get_nonce() -> u64 {
    loop {
        let mut bytes = [0u8; 8];
        let nonce = match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => u64::from_le_bytes(bytes),
            Err(err) => {
                warn!("entropy source failed, using fallback: {}", err);
                rand::thread_rng().gen::<u64>()
            }
        };
        if nonce != 0 {
            return nonce;
        }
    }
}
