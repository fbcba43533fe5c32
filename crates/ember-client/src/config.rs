// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use ember_xmpp::{KeepAlive, ResourceParts, ServerAddress};

/// Server and session settings. Read once per connection attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub domain: String,
    pub port: u16,
    pub use_ssl: bool,
    /// Seconds between keep-alive pings. Zero turns them off.
    pub ping_interval: u64,
    /// Seconds to wait for a keep-alive answer.
    pub ping_timeout: u64,
    pub private_chat_friends_only: bool,
    pub app_id: String,
    pub platform: String,
    pub platform_user_id: String,
    pub muc_domain: Option<String>,
    pub muc_history_depth: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: String::new(),
            domain: String::new(),
            port: 5222,
            use_ssl: true,
            ping_interval: 60,
            ping_timeout: 30,
            private_chat_friends_only: false,
            app_id: String::new(),
            platform: String::new(),
            platform_user_id: String::new(),
            muc_domain: None,
            muc_history_depth: None,
        }
    }
}

impl ServerConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        ServerConfig {
            address: domain.clone(),
            domain,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn muc_domain(&self) -> String {
        match &self.muc_domain {
            Some(domain) if !domain.is_empty() => domain.clone(),
            _ => format!("muc.{}", self.domain),
        }
    }

    pub fn server_address(&self) -> ServerAddress {
        let address = if self.address.is_empty() {
            self.domain.clone()
        } else {
            self.address.clone()
        };
        ServerAddress {
            address,
            port: self.port,
            use_ssl: self.use_ssl,
        }
    }

    pub fn keep_alive(&self) -> KeepAlive {
        KeepAlive {
            interval: Duration::from_secs(self.ping_interval),
            timeout: Duration::from_secs(self.ping_timeout),
        }
    }

    pub fn resource_parts(&self) -> ResourceParts {
        ResourceParts {
            app_id: self.app_id.clone(),
            platform: self.platform.clone(),
            platform_user_id: self.platform_user_id.clone(),
        }
    }
}
