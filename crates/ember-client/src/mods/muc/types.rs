// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use ember_xmpp::UserJid;

use crate::mods::presence::UserPresence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RoomStatus {
    NotJoined,
    CreatePending,
    JoinPublicPending,
    JoinPrivatePending,
    Joined,
    ExitPending,
}

impl RoomStatus {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RoomStatus::CreatePending
                | RoomStatus::JoinPublicPending
                | RoomStatus::JoinPrivatePending
                | RoomStatus::ExitPending
        )
    }
}

/// Long-term permission level of an occupant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Affiliation {
    Owner,
    Admin,
    Member,
    Outcast,
    #[default]
    None,
}

/// Session-scoped permission level of an occupant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Moderator,
    Participant,
    Visitor,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatMember {
    pub nickname: String,
    /// The occupant's real JID. Only known in non-anonymous rooms.
    pub member_jid: Option<UserJid>,
    pub presence: UserPresence,
    pub affiliation: Affiliation,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomInfo {
    pub owner_id: String,
    pub subject: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomChatMessage {
    pub from_nickname: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub chat_info: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomAnonymity {
    #[default]
    Semianonymous,
    Nonanonymous,
    Fullanonymous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub room_name: String,
    pub room_desc: String,
    pub is_persistent: bool,
    pub max_msg_history: u32,
    pub allow_change_subject: bool,
    pub room_anonymity: RoomAnonymity,
    pub is_members_only: bool,
    pub is_moderated: bool,
    pub allow_public_search: bool,
    pub is_private: bool,
    pub password: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        RoomConfig {
            room_name: String::new(),
            room_desc: String::new(),
            is_persistent: false,
            max_msg_history: 50,
            allow_change_subject: true,
            room_anonymity: RoomAnonymity::default(),
            is_members_only: false,
            is_moderated: false,
            allow_public_search: true,
            is_private: false,
            password: String::new(),
        }
    }
}

/// Which delegate a pending room-configuration write reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCallback {
    Create,
    Configure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfigWrite {
    pub iq_id: String,
    pub callback: ConfigCallback,
}

/// Outcome of a room create/configure/join/exit/info operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomOperationResult {
    pub success: bool,
    pub room_id: String,
    pub error: String,
}

impl RoomOperationResult {
    pub(crate) fn success(room_id: impl Into<String>) -> Self {
        RoomOperationResult {
            success: true,
            room_id: room_id.into(),
            error: String::new(),
        }
    }

    pub(crate) fn failure(room_id: impl Into<String>, error: impl Into<String>) -> Self {
        RoomOperationResult {
            success: false,
            room_id: room_id.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomMemberEvent {
    pub room_id: String,
    pub member: ChatMember,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomChatReceived {
    pub room_id: String,
    pub message: RoomChatMessage,
}

/// Turns a stanza error condition into the text reported to delegates.
pub(crate) fn error_text(condition: &str) -> String {
    let text = match condition {
        "forbidden" => "You are banned from this room",
        "not-authorized" => "A password is required to join this room",
        "item-not-found" => "This room does not exist",
        "not-allowed" => "Room creation is restricted",
        "not-acceptable" => "Your reserved room nickname must be used",
        "registration-required" => "You are not on the member list",
        "conflict" => "Your desired nickname is in use or registered by another user",
        "service-unavailable" => "The maximum number of users has been reached",
        _ => return format!("Unknown error: {}", condition),
    };
    text.to_string()
}
