use crate::raintree::RainTreeConfig;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use std::fmt;

// For explanation, see issue: https://github.com/serde-rs/serde/issues/368
fn default_listener_address() -> String {
    "127.0.0.1:42069".to_string()
}
fn default_service_url() -> String {
    "127.0.0.1:42069".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The socket address the TCP host binds.
    #[serde(default = "default_listener_address")]
    pub listener_address: String,
    /// The `host:port` announced to peers, usually the public form of `listener_address`.
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Hex encoded Ed25519 secret key. A fresh key is generated when empty.
    #[serde(default)]
    pub secret_key: String,
    /// The staked peers, as `PUBKEY_HEX@HOST:PORT`. This node is always staked.
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default)]
    pub raintree: RainTreeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listener_address: default_listener_address(),
            service_url: default_service_url(),
            secret_key: String::new(),
            peers: vec![],
            raintree: RainTreeConfig::default(),
        }
    }
}

const CONFIG_FILE_PATH: &str = "src/server/settings/Default.json";
const CONFIG_FILE_PREFIX: &str = "src/server/settings/";

#[derive(Clone, Debug, Deserialize)]
pub enum ENV {
    Testing,
    Development,
    Production,
}

impl fmt::Display for ENV {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ENV::Testing => write!(f, "Testing"),
            ENV::Production => write!(f, "Production"),
            ENV::Development => write!(f, "Development"),
        }
    }
}

impl From<&str> for ENV {
    fn from(env: &str) -> Self {
        match env {
            "Testing" => ENV::Testing,
            "Production" => ENV::Production,
            _ => ENV::Development,
        }
    }
}

impl Settings {
    /// Loads the default settings overlaid with those of the `RUN_ENV` environment.
    ///
    /// Both files are optional.
    pub fn new() -> Result<Self, ConfigError> {
        let env = ENV::from(std::env::var("RUN_ENV").unwrap_or_else(|_| "Development".into()).as_str());
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE_PATH).required(false))
            .add_source(File::with_name(&format!("{}{}", CONFIG_FILE_PREFIX, env)).required(false))
            .build()?
            .try_deserialize()
    }
}
