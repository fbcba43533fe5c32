// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use connector::{
    ConnectParams, ConnectionError, ConnectionEvent, ConnectionState, KeepAlive, Transport,
    TransportEvent, TransportProvider, WireConnection, WireContext, XmppRsTransport,
};
pub use deps::{IDProvider, SystemTimeProvider, TimeProvider, UUIDProvider};
pub use io_thread::{IoThread, LoginStatus, LoginStatusUpdate, ServerAddress, StanzaCallback};
pub use stanza::{ns, IqKind, MessageKind, PresenceKind, Show, StanzaTree};
pub use user_jid::{JidParseError, ResourceParts, UserJid};
pub use util::ParseError;

pub mod connector;
mod deps;
mod io_thread;
pub mod stanza;
mod user_jid;
mod util;

#[cfg(any(test, feature = "test"))]
pub mod test;
