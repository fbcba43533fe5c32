// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use kind::{IqKind, MessageKind, PresenceKind, Show};
pub use tree::StanzaTree;

mod kind;
pub mod ns;
mod tree;
