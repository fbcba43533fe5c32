// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use client::{
    ConnectionManager, ConnectionManagerBuilder, LoginChanged, LoginComplete, LogoutComplete,
    ModuleContext,
};
pub use config::ServerConfig;
pub use delegate::{DelegateHandle, MulticastDelegate};
pub use ember_xmpp::{LoginStatus, StanzaTree, UserJid};
pub use mods::muc::RoomError;
pub use mods::{MultiUserChat, Ping, Presence, PrivateChat, PubSub};

#[cfg(any(test, feature = "test"))]
pub mod test;

mod client;
mod config;
mod delegate;
pub mod mods;
pub(crate) mod util;
