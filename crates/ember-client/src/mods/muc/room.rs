// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::VecDeque;

use ember_xmpp::{ns, IqKind, PresenceKind, StanzaTree, UserJid};

use crate::mods::muc::types::{
    ChatMember, PendingConfigWrite, RoomChatMessage, RoomConfig, RoomInfo, RoomStatus,
};

pub(crate) const MAX_HISTORY: usize = 50;

/// Everything known about one room we are in or are about to enter.
#[derive(Debug)]
pub(crate) struct Room {
    pub id: String,
    pub jid: UserJid,
    pub nickname: String,
    pub status: RoomStatus,
    pub info: RoomInfo,
    pub members: Vec<ChatMember>,
    pub last_messages: VecDeque<RoomChatMessage>,
    /// Config to apply once the server confirms we own a freshly created room.
    pub pending_create_config: Option<RoomConfig>,
    pub pending_config_write: Option<PendingConfigWrite>,
    pub pending_info_query: Option<String>,
}

impl Room {
    pub fn new(id: &str, muc_domain: &str, nickname: &str, status: RoomStatus) -> Self {
        Room {
            id: id.to_string(),
            jid: UserJid::bare(id, muc_domain),
            nickname: nickname.to_string(),
            status,
            info: RoomInfo::default(),
            members: vec![],
            last_messages: VecDeque::with_capacity(MAX_HISTORY),
            pending_create_config: None,
            pending_config_write: None,
            pending_info_query: None,
        }
    }

    pub fn occupant_jid(&self) -> UserJid {
        self.jid.with_resource(&self.nickname)
    }

    pub fn member(&self, nickname: &str) -> Option<&ChatMember> {
        self.members.iter().find(|m| m.nickname == nickname)
    }

    /// Inserts or replaces `member`. Returns the previous entry.
    pub fn upsert_member(&mut self, member: ChatMember) -> Option<ChatMember> {
        match self.members.iter_mut().find(|m| m.nickname == member.nickname) {
            Some(existing) => Some(std::mem::replace(existing, member)),
            None => {
                self.members.push(member);
                None
            }
        }
    }

    pub fn remove_member(&mut self, nickname: &str) -> Option<ChatMember> {
        let idx = self.members.iter().position(|m| m.nickname == nickname)?;
        Some(self.members.remove(idx))
    }

    pub fn add_message(&mut self, message: RoomChatMessage) {
        if self.last_messages.len() >= MAX_HISTORY {
            self.last_messages.pop_front();
        }
        self.last_messages.push_back(message);
    }

    /// The `count` oldest cached messages, or all of them if `count` is negative.
    pub fn last_messages(&self, count: i32) -> Vec<RoomChatMessage> {
        let count = usize::try_from(count).unwrap_or(self.last_messages.len());
        self.last_messages.iter().take(count).cloned().collect()
    }

    pub fn join_presence(&self, history_depth: Option<u32>, password: Option<&str>) -> StanzaTree {
        let mut x = StanzaTree::new_with_ns("x", ns::MUC);
        if let Some(depth) = history_depth {
            x = x.add_child(
                StanzaTree::new_with_ns("history", ns::MUC)
                    .set_attribute("maxstanzas", depth.to_string()),
            );
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            x = x.add_child(StanzaTree::new_with_ns("password", ns::MUC).set_text(password));
        }

        StanzaTree::new_presence()
            .set_to(self.occupant_jid())
            .add_child(x)
    }

    pub fn exit_presence(&self) -> StanzaTree {
        StanzaTree::new_presence()
            .set_kind(PresenceKind::Unavailable)
            .set_to(self.occupant_jid())
    }

    pub fn config_iq(&self, id: &str, config: &RoomConfig) -> StanzaTree {
        StanzaTree::new_iq(IqKind::Set, id)
            .set_to(&self.jid)
            .add_child(
                StanzaTree::new_with_ns("query", ns::MUC_OWNER).add_child(config_form(config)),
            )
    }

    pub fn info_query(&self, id: &str) -> StanzaTree {
        StanzaTree::new_iq(IqKind::Get, id)
            .set_to(&self.jid)
            .add_child(StanzaTree::new_with_ns("query", ns::DISCO_INFO))
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn form_field(var: &str, value: impl Into<String>) -> StanzaTree {
    StanzaTree::new_with_ns("field", ns::DATA_FORMS)
        .set_attribute("var", var)
        .set_attribute("type", "text-single")
        .add_child(StanzaTree::new_with_ns("value", ns::DATA_FORMS).set_text(value))
}

/// Serialises `config` as a `jabber:x:data` submit form.
pub(crate) fn config_form(config: &RoomConfig) -> StanzaTree {
    let mut fields = vec![
        form_field("FORM_TYPE", ns::MUC_ROOMCONFIG),
        form_field("muc#roomconfig_roomname", &config.room_name),
        form_field("muc#roomconfig_roomdesc", &config.room_desc),
        form_field(
            "muc#roomconfig_persistentroom",
            flag(config.is_persistent),
        ),
        form_field("muc#maxhistoryfetch", config.max_msg_history.to_string()),
        form_field(
            "muc#roomconfig_changesubject",
            flag(config.allow_change_subject),
        ),
        form_field(
            "muc#roomconfig_anonymity",
            config.room_anonymity.to_string(),
        ),
        form_field("muc#roomconfig_membersonly", flag(config.is_members_only)),
        form_field("muc#roomconfig_moderatedroom", flag(config.is_moderated)),
        form_field("muc#roomconfig_publicroom", flag(config.allow_public_search)),
        form_field(
            "muc#roomconfig_passwordprotectedroom",
            flag(config.is_private),
        ),
    ];
    if config.is_private {
        fields.push(form_field("muc#roomconfig_roomsecret", &config.password));
    }

    StanzaTree::new_with_ns("x", ns::DATA_FORMS)
        .set_attribute("type", "submit")
        .add_children(fields)
}
