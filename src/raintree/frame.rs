use crate::Result;

use prost::Message;

/// A message in flight through the RainTree.
///
/// ```proto
/// message RainTreeFrame {
///   uint32 level = 1;
///   bytes data = 2;
///   uint64 nonce = 3;
///   optional uint64 height = 4;
/// }
/// ```
///
/// `height` is the height of the peer set the originator routed with; decoders which predate
/// it skip the field.
#[derive(Clone, PartialEq, Message)]
pub struct RainTreeFrame {
    #[prost(uint32, tag = "1")]
    pub level: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub nonce: u64,
    #[prost(uint64, optional, tag = "4")]
    pub height: Option<u64>,
}

impl RainTreeFrame {
    pub fn new(level: u32, data: Vec<u8>, nonce: u64, height: Option<u64>) -> Self {
        RainTreeFrame { level, data, nonce, height }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<RainTreeFrame> {
        Ok(RainTreeFrame::decode(bytes)?)
    }
}
