// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use transport::{
    ConnectParams, ConnectionError, Transport, TransportEvent, TransportProvider,
};
pub use wire_connection::{ConnectionEvent, ConnectionState, KeepAlive, WireConnection};
pub use wire_context::WireContext;
pub use xmpp_rs::XmppRsTransport;

mod transport;
mod wire_connection;
mod wire_context;
pub mod xmpp_rs;
