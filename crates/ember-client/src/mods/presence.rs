// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info, warn};

use ember_xmpp::{PresenceKind, Show, StanzaTree, UserJid};

use crate::client::ModuleContext;
use crate::delegate::MulticastDelegate;
use crate::mods::{Module, StanzaHandler};
use crate::util::{delay_element, delay_stamp};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum PresenceStatus {
    Online,
    #[default]
    Offline,
    Away,
    ExtendedAway,
    DoNotDisturb,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPresence {
    pub is_available: bool,
    pub status: PresenceStatus,
    pub status_str: String,
    pub sent_time: DateTime<Utc>,
    pub app_id: String,
    pub platform: String,
}

impl Default for UserPresence {
    fn default() -> Self {
        UserPresence {
            is_available: false,
            status: PresenceStatus::Offline,
            status_str: String::new(),
            sent_time: DateTime::<Utc>::MIN_UTC,
            app_id: String::new(),
            platform: String::new(),
        }
    }
}

impl UserPresence {
    pub fn online(status_str: impl Into<String>) -> Self {
        UserPresence {
            is_available: true,
            status: PresenceStatus::Online,
            status_str: status_str.into(),
            ..Default::default()
        }
    }

    /// Parses a presence stanza. Missing `<show/>` means online for available presences.
    pub(crate) fn from_stanza(stanza: &StanzaTree, now: DateTime<Utc>) -> Self {
        let is_available = stanza.kind() != Some("unavailable");

        let show = stanza
            .child_by_name("show")
            .and_then(|show| show.text().trim().parse::<Show>().ok());

        let status = match (is_available, show) {
            (false, _) => PresenceStatus::Offline,
            (true, None) => PresenceStatus::Online,
            (true, Some(Show::Away)) => PresenceStatus::Away,
            (true, Some(Show::XA)) => PresenceStatus::ExtendedAway,
            (true, Some(Show::DND)) => PresenceStatus::DoNotDisturb,
            (true, Some(Show::Chat)) => PresenceStatus::Chat,
        };

        let resource = stanza.from().and_then(|jid| jid.parse_resource());

        UserPresence {
            is_available,
            status,
            status_str: stanza
                .child_by_name("status")
                .map(|status| status.text())
                .unwrap_or_default(),
            sent_time: delay_stamp(stanza).unwrap_or(now),
            app_id: resource
                .as_ref()
                .map(|parts| parts.app_id.clone())
                .unwrap_or_default(),
            platform: resource
                .map(|parts| parts.platform)
                .unwrap_or_default(),
        }
    }

    pub(crate) fn to_stanza(&self) -> StanzaTree {
        let mut stanza = StanzaTree::new_presence();

        if !self.is_available || self.status == PresenceStatus::Offline {
            stanza = stanza.set_kind(PresenceKind::Unavailable);
        } else {
            let show = match self.status {
                PresenceStatus::Away => Some(Show::Away),
                PresenceStatus::ExtendedAway => Some(Show::XA),
                PresenceStatus::DoNotDisturb => Some(Show::DND),
                PresenceStatus::Chat => Some(Show::Chat),
                PresenceStatus::Online | PresenceStatus::Offline => None,
            };
            if let Some(show) = show {
                stanza = stanza.add_child(StanzaTree::new_text_node("show", show.to_string()));
            }
        }

        if !self.status_str.is_empty() {
            stanza = stanza.add_child(StanzaTree::new_text_node("status", &self.status_str));
        }

        stanza.add_child(delay_element(self.sent_time))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceReceived {
    pub user_jid: UserJid,
    pub presence: UserPresence,
}

/// Outbound presence and the roster of presences received from contacts.
pub struct Presence {
    ctx: ModuleContext,
    handler: Arc<PresenceHandler>,
    receiver: Receiver<PresenceReceived>,
    last_sent: UserPresence,
    roster: HashMap<String, PresenceReceived>,
    pub on_receive_presence: MulticastDelegate<PresenceReceived>,
}

struct PresenceHandler {
    ctx: ModuleContext,
    sender: Sender<PresenceReceived>,
}

impl Presence {
    pub(crate) fn new(ctx: ModuleContext) -> Self {
        let (sender, receiver) = mpsc::channel();
        Presence {
            handler: Arc::new(PresenceHandler {
                ctx: ctx.clone(),
                sender,
            }),
            ctx,
            receiver,
            last_sent: UserPresence::default(),
            roster: HashMap::new(),
            on_receive_presence: MulticastDelegate::new(),
        }
    }

    /// Broadcasts `presence`. The cached presence is updated as soon as the stanza is queued.
    pub fn update_presence(&mut self, presence: UserPresence) -> bool {
        if !self.ctx.is_logged_in() {
            warn!("UpdatePresence failed. not connected");
            return false;
        }

        let presence = UserPresence {
            sent_time: self.ctx.now(),
            ..presence
        };

        if !self.ctx.send_stanza(presence.to_stanza()) {
            return false;
        }
        self.last_sent = presence;
        true
    }

    /// The last presence that was sent.
    pub fn presence(&self) -> &UserPresence {
        &self.last_sent
    }

    pub fn query_presence(&self, user_id: &str) -> bool {
        info!("QueryPresence for {} is not supported.", user_id);
        false
    }

    /// The most recent presence of any session of `user_id`.
    pub fn roster_presence(&self, user_id: &str) -> Option<&UserPresence> {
        self.roster
            .values()
            .filter(|entry| entry.user_jid.id == user_id)
            .map(|entry| &entry.presence)
            .max_by_key(|presence| presence.sent_time)
    }

    pub fn roster_members(&self) -> Vec<UserJid> {
        let mut members = self
            .roster
            .values()
            .map(|entry| entry.user_jid.clone())
            .collect::<Vec<_>>();
        members.sort_by_key(|jid| jid.full_path());
        members
    }

    pub fn is_in_roster(&self, user_id: &str) -> bool {
        self.roster
            .values()
            .any(|entry| entry.user_jid.id == user_id)
    }

    pub(crate) fn tick(&mut self) {
        while let Ok(received) = self.receiver.try_recv() {
            self.roster
                .insert(received.user_jid.full_path(), received.clone());
            self.on_receive_presence.broadcast(&received);
        }
    }
}

impl Module for Presence {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler> {
        self.handler.clone()
    }

    fn handle_disconnect(&mut self) {
        self.receiver.try_iter().for_each(drop);
        self.roster.clear();
        self.last_sent = UserPresence::default();
    }
}

impl StanzaHandler for PresenceHandler {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn handle_stanza(&self, stanza: &StanzaTree) -> bool {
        if stanza.name() != "presence" {
            return false;
        }

        let Some(from) = stanza.from() else {
            debug!("Ignoring presence without sender.");
            return true;
        };

        if from.domain == self.ctx.muc_domain() {
            return false;
        }

        match stanza.kind() {
            None | Some("unavailable") => (),
            Some(kind) => {
                debug!("Ignoring presence of type {} from {}.", kind, from);
                return true;
            }
        }

        if !from.has_resource() {
            debug!("Ignoring presence without resource from {}.", from);
            return true;
        }

        _ = self.sender.send(PresenceReceived {
            presence: UserPresence::from_stanza(stanza, self.ctx.now()),
            user_jid: from,
        });
        true
    }
}
