// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::time::Duration;

use anyhow::Result;
use minidom::Element;
use secrecy::SecretString;

use crate::connector::WireContext;
use crate::UserJid;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Timed out")]
    TimedOut,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{msg:?}")]
    Generic { msg: String },
}

#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Disconnected { error: Option<ConnectionError> },
    Stanza(Element),
}

pub struct ConnectParams {
    pub jid: UserJid,
    pub password: SecretString,
    pub address: String,
    pub port: u16,
    pub use_ssl: bool,
}

/// The socket-level half of a `WireConnection`.
///
/// `connect` only starts the attempt. Its outcome, inbound stanzas and stream errors are all
/// reported through `poll`, which must not block for longer than `timeout`.
pub trait Transport: Send {
    fn connect(&mut self, ctx: &WireContext, params: &ConnectParams)
        -> Result<(), ConnectionError>;
    fn disconnect(&mut self, ctx: &WireContext);
    fn send(&mut self, ctx: &WireContext, stanza: Element) -> Result<()>;
    fn poll(&mut self, ctx: &WireContext, timeout: Duration) -> Vec<TransportEvent>;
}

pub type TransportProvider = Box<dyn Fn() -> Box<dyn Transport> + Send + Sync>;
