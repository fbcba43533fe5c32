// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use constant_id_provider::ConstantIDProvider;
pub use constant_time_provider::ConstantTimeProvider;
pub use incrementing_id_provider::IncrementingIDProvider;
pub use scripted_transport::{ConnectBehavior, ScriptedTransport};

mod constant_id_provider;
mod constant_time_provider;
mod incrementing_id_provider;
mod scripted_transport;

/// Parses a stanza literal. Panics on malformed XML.
#[macro_export]
macro_rules! stanza {
    ($xml:expr) => {
        $xml.parse::<$crate::StanzaTree>().unwrap()
    };
}

#[macro_export]
macro_rules! user_jid {
    ($jid:expr) => {
        $crate::UserJid::parse($jid).unwrap()
    };
}
