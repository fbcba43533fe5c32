// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt;
use std::str::FromStr;

use jid::{BareJid, FullJid, Jid};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RESOURCE_VERSION: &str = "V2";

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum JidParseError {
    #[error("JID is empty")]
    Empty,
    #[error("JID '{jid}' has an empty domain")]
    MissingDomain { jid: String },
    #[error("JID '{jid}' is not a full JID")]
    MissingResource { jid: String },
    #[error("{msg}")]
    Invalid { msg: String },
}

/// An XMPP address in the form `id@domain/resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserJid {
    pub id: String,
    pub domain: String,
    pub resource: String,
}

/// The values encoded into the resource part of a JID created by this library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceParts {
    pub app_id: String,
    pub platform: String,
    pub platform_user_id: String,
}

impl UserJid {
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        UserJid {
            id: id.into(),
            domain: domain.into(),
            resource: resource.into(),
        }
    }

    pub fn bare(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::new(id, domain, "")
    }

    pub fn parse(jid: &str) -> Result<Self, JidParseError> {
        let jid = jid.trim();
        if jid.is_empty() {
            return Err(JidParseError::Empty);
        }

        let parsed = Jid::from_str(jid).map_err(|err| match err {
            jid::Error::DomainEmpty => JidParseError::MissingDomain {
                jid: jid.to_string(),
            },
            err => JidParseError::Invalid {
                msg: format!("Invalid JID '{}'. {}", jid, err),
            },
        })?;

        Ok(UserJid::new(
            parsed.node_str().unwrap_or_default(),
            parsed.domain_str(),
            parsed.resource_str().unwrap_or_default(),
        ))
    }

    /// A JID is usable for addressing a user when both the id and the domain are set and
    /// well-formed.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.domain.is_empty() && self.to_bare_jid().is_ok()
    }

    pub fn has_resource(&self) -> bool {
        !self.resource.is_empty()
    }

    pub fn bare_path(&self) -> String {
        if self.id.is_empty() {
            self.domain.clone()
        } else {
            format!("{}@{}", self.id, self.domain)
        }
    }

    pub fn full_path(&self) -> String {
        self.to_string()
    }

    pub fn to_bare(&self) -> UserJid {
        UserJid::bare(self.id.clone(), self.domain.clone())
    }

    pub fn with_resource(&self, resource: impl Into<String>) -> UserJid {
        UserJid::new(self.id.clone(), self.domain.clone(), resource)
    }

    /// Builds a resource of the form `V2:<app>:<platform>:<platform user>:<disambiguator>`.
    pub fn create_resource(parts: &ResourceParts) -> String {
        let disambiguator = Uuid::new_v4().simple().to_string();
        format!(
            "{}:{}:{}:{}:{}",
            RESOURCE_VERSION,
            parts.app_id,
            parts.platform,
            parts.platform_user_id,
            &disambiguator[..8]
        )
    }

    /// Returns the app/platform values encoded in the resource, if it was created by
    /// `create_resource`.
    pub fn parse_resource(&self) -> Option<ResourceParts> {
        let mut components = self.resource.split(':');
        if components.next() != Some(RESOURCE_VERSION) {
            return None;
        }
        let app_id = components.next()?;
        let platform = components.next()?;
        let platform_user_id = components.next().unwrap_or_default();

        Some(ResourceParts {
            app_id: app_id.to_string(),
            platform: platform.to_string(),
            platform_user_id: platform_user_id.to_string(),
        })
    }

    pub fn to_full_jid(&self) -> Result<FullJid, JidParseError> {
        if !self.has_resource() {
            return Err(JidParseError::MissingResource {
                jid: self.to_string(),
            });
        }
        FullJid::from_str(&self.full_path()).map_err(|err| JidParseError::Invalid {
            msg: err.to_string(),
        })
    }

    pub fn to_bare_jid(&self) -> Result<BareJid, JidParseError> {
        BareJid::from_str(&self.bare_path()).map_err(|err| JidParseError::Invalid {
            msg: err.to_string(),
        })
    }
}

impl fmt::Display for UserJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bare_path())?;
        if self.has_resource() {
            write!(f, "/{}", self.resource)?;
        }
        Ok(())
    }
}

impl FromStr for UserJid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserJid::parse(s)
    }
}
