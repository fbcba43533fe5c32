// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum IqKind {
    Get,
    Set,
    Result,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Error,
    Groupchat,
    Headline,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PresenceKind {
    /// Signals that the entity is no longer available for communication.
    Unavailable,
    /// The sender wishes to subscribe to the recipient's presence.
    Subscribe,
    /// The sender has allowed the recipient to receive their presence.
    Subscribed,
    /// The sender is unsubscribing from another entity's presence.
    Unsubscribe,
    /// The subscription request has been denied or a previously-granted subscription has been
    /// cancelled.
    Unsubscribed,
    /// A request for an entity's current presence.
    Probe,
    /// An error has occurred regarding processing or delivery of a previously-sent presence stanza.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Show {
    /// The entity or resource is temporarily away.
    Away,
    /// The entity or resource is actively interested in chatting.
    Chat,
    /// The entity or resource is busy (dnd = "Do Not Disturb").
    DND,
    /// The entity or resource is away for an extended period (xa = "eXtended Away").
    XA,
}
