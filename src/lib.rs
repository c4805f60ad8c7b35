#[macro_use]
extern crate serde_derive;
#[macro_use(Message, MessageResponse)]
extern crate actix_derive;
extern crate colored;

pub mod address;
pub mod host;
pub mod mempool;
pub mod peer;
pub mod raintree;
pub mod server;
pub mod telemetry;

use address::Address;
use host::PeerId;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Dalek(ed25519_dalek::ed25519::Error),
    Actix(actix::MailboxError),
    Bincode(bincode::Error),
    Config(config::ConfigError),

    /// A RainTree frame could not be decoded
    Decode(prost::DecodeError),

    // configuration errors
    InvalidConfig(String),

    // peer set errors
    PeerstoreUnavailable(u64),
    EmptyPeerstore,
    /// Peers can't be added or removed
    StaticPeerSet,

    // send errors
    NoKnownPeer(Address),
    NoKnownAddress(PeerId),
    ConnectionRefused(PeerId),
    HostClosed,
    UnsupportedProtocol(String),
    HeaderTooLarge(u32),
    Timeout,
    /// Peers which could not be added to the host
    HostPopulation(Vec<String>),

    // fifo set errors
    SetCollision,
    EmptySet,

    /// Error when parsing a hex encoded `Address`
    InvalidAddress,
    /// Bytes which are not an Ed25519 public key
    InvalidPublicKey,
    /// Error when parsing a peer description `PUBKEY@HOST:PORT`
    PeerParseError,
    UrlParseError(String),
    ResolveError(String),
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<ed25519_dalek::ed25519::Error> for Error {
    fn from(error: ed25519_dalek::ed25519::Error) -> Self {
        Error::Dalek(error)
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(error: actix::MailboxError) -> Self {
        Error::Actix(error)
    }
}

impl std::convert::From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Bincode(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::convert::From<prost::DecodeError> for Error {
    fn from(error: prost::DecodeError) -> Self {
        Error::Decode(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
