// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ember_xmpp::{MessageKind, StanzaTree, UserJid};

use crate::client::ModuleContext;
use crate::delegate::MulticastDelegate;
use crate::mods::{Module, Presence, StanzaHandler};
use crate::util::{delay_element, delay_stamp};

/// Messages from this user are delivered even with `private_chat_friends_only` set.
pub const ADMIN_USER_ID: &str = "xmpp-admin";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub from: UserJid,
    pub to: UserJid,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// One-to-one chat.
pub struct PrivateChat {
    ctx: ModuleContext,
    handler: Arc<PrivateChatHandler>,
    receiver: Receiver<ChatMessage>,
    pub on_chat_received: MulticastDelegate<ChatMessage>,
}

struct PrivateChatHandler {
    ctx: ModuleContext,
    sender: Sender<ChatMessage>,
}

impl PrivateChat {
    pub(crate) fn new(ctx: ModuleContext) -> Self {
        let (sender, receiver) = mpsc::channel();
        PrivateChat {
            handler: Arc::new(PrivateChatHandler {
                ctx: ctx.clone(),
                sender,
            }),
            ctx,
            receiver,
            on_chat_received: MulticastDelegate::new(),
        }
    }

    pub fn send_chat(&self, to: &UserJid, body: impl Into<String>) -> bool {
        if !self.ctx.is_logged_in() {
            warn!("SendChat failed. not connected");
            return false;
        }
        if !to.is_valid() {
            warn!("SendChat failed. invalid recipient {}", to);
            return false;
        }

        let message = StanzaTree::new_message(MessageKind::Chat)
            .set_to(to)
            .set_id(self.ctx.generate_id())
            .add_body_with_text(body)
            .add_child(delay_element(self.ctx.now()));

        self.ctx.send_stanza(message)
    }

    /// Delivers queued messages. `presence` decides who counts as a friend.
    pub(crate) fn tick(&mut self, presence: &Presence) {
        let friends_only = self.ctx.config().private_chat_friends_only;

        while let Ok(message) = self.receiver.try_recv() {
            if friends_only
                && message.from.id != ADMIN_USER_ID
                && !presence.is_in_roster(&message.from.id)
            {
                info!("Dropping chat from {}. Not a friend.", message.from);
                continue;
            }
            self.on_chat_received.broadcast(&message);
        }
    }
}

impl Module for PrivateChat {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler> {
        self.handler.clone()
    }

    fn handle_disconnect(&mut self) {
        self.receiver.try_iter().for_each(drop);
    }
}

impl StanzaHandler for PrivateChatHandler {
    fn name(&self) -> &'static str {
        "private_chat"
    }

    fn handle_stanza(&self, stanza: &StanzaTree) -> bool {
        if stanza.name() != "message" || stanza.kind() != Some("chat") {
            return false;
        }

        let Some(from) = stanza.from() else {
            debug!("Ignoring chat without sender.");
            return true;
        };

        if from.domain == self.ctx.muc_domain() {
            return false;
        }

        let Some(body) = stanza.body_text() else {
            debug!("Ignoring chat without body from {}.", from);
            return true;
        };

        let to = stanza
            .to()
            .or_else(|| self.ctx.jid())
            .unwrap_or_default();

        _ = self.sender.send(ChatMessage {
            from,
            to,
            body,
            timestamp: delay_stamp(stanza).unwrap_or_else(|| self.ctx.now()),
        });
        true
    }
}
