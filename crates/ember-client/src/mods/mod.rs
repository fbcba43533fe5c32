// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use ember_xmpp::StanzaTree;

pub use muc::MultiUserChat;
pub use ping::Ping;
pub use presence::Presence;
pub use private_chat::PrivateChat;
pub use pubsub::PubSub;

pub mod muc;
pub mod ping;
pub mod presence;
pub mod private_chat;
pub mod pubsub;

/// The IO-thread half of a module. Classifies an inbound stanza, queues whatever the module
/// needs from it as an owned value and reports whether the stanza was claimed.
pub(crate) trait StanzaHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn handle_stanza(&self, stanza: &StanzaTree) -> bool;
}

/// The game-thread half of a module.
pub(crate) trait Module {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler>;

    /// Drops all state that belongs to the session that just ended.
    fn handle_disconnect(&mut self) {}
}
