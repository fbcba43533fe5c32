// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use ember_xmpp::{MessageKind, StanzaTree};

pub use types::{
    Affiliation, ChatMember, ConfigCallback, PendingConfigWrite, Role, RoomAnonymity,
    RoomChatMessage, RoomChatReceived, RoomConfig, RoomInfo, RoomMemberEvent,
    RoomOperationResult, RoomStatus,
};

use crate::client::ModuleContext;
use crate::delegate::MulticastDelegate;
use crate::mods::{Module, StanzaHandler};
use handler::{
    MucHandler, MucIqResponse, MucItem, MucMessage, MucPresence, STATUS_CONFIG_CHANGED,
    STATUS_SELF_PRESENCE,
};
use room::Room;
use types::error_text;

mod handler;
mod room;
mod types;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("no valid room id")]
    InvalidRoomId,
    #[error("no valid nickname")]
    InvalidNickname,
    #[error("not connected")]
    NotConnected,
    #[error("already joined room {room_id}")]
    AlreadyJoined { room_id: String },
    #[error("operation pending for room {room_id}")]
    OperationPending { room_id: String },
    #[error("couldnt find room {room_id}")]
    RoomNotFound { room_id: String },
    #[error("have not joined room {room_id}")]
    NotJoined { room_id: String },
    #[error("not the owner of room {room_id}")]
    NotOwner { room_id: String },
}

/// Group chat rooms. Rooms are addressed by their local id, e.g. `lobby` for
/// `lobby@<muc domain>`.
pub struct MultiUserChat {
    ctx: ModuleContext,
    handler: Arc<MucHandler>,
    receiver: Receiver<MucItem>,
    rooms: HashMap<String, Room>,

    pub on_room_created: MulticastDelegate<RoomOperationResult>,
    pub on_room_configured: MulticastDelegate<RoomOperationResult>,
    pub on_room_info_refreshed: MulticastDelegate<RoomOperationResult>,
    pub on_join_public_room: MulticastDelegate<RoomOperationResult>,
    pub on_join_private_room: MulticastDelegate<RoomOperationResult>,
    pub on_exit_room: MulticastDelegate<RoomOperationResult>,
    pub on_room_member_join: MulticastDelegate<RoomMemberEvent>,
    pub on_room_member_exit: MulticastDelegate<RoomMemberEvent>,
    pub on_room_member_changed: MulticastDelegate<RoomMemberEvent>,
    pub on_room_chat_received: MulticastDelegate<RoomChatReceived>,
}

impl MultiUserChat {
    pub(crate) fn new(ctx: ModuleContext) -> Self {
        let (sender, receiver) = mpsc::channel();
        MultiUserChat {
            handler: Arc::new(MucHandler {
                ctx: ctx.clone(),
                sender,
            }),
            ctx,
            receiver,
            rooms: HashMap::new(),
            on_room_created: MulticastDelegate::new(),
            on_room_configured: MulticastDelegate::new(),
            on_room_info_refreshed: MulticastDelegate::new(),
            on_join_public_room: MulticastDelegate::new(),
            on_join_private_room: MulticastDelegate::new(),
            on_exit_room: MulticastDelegate::new(),
            on_room_member_join: MulticastDelegate::new(),
            on_room_member_exit: MulticastDelegate::new(),
            on_room_member_changed: MulticastDelegate::new(),
            on_room_chat_received: MulticastDelegate::new(),
        }
    }
}

impl MultiUserChat {
    /// Enters `room_id` and, if the server makes us its owner, applies `config`.
    /// `on_room_created` reports the outcome.
    pub fn create_room(
        &mut self,
        room_id: &str,
        nickname: &str,
        config: RoomConfig,
    ) -> Result<(), RoomError> {
        let password = config.is_private.then(|| config.password.clone());
        let room = self.enter_room(
            room_id,
            nickname,
            RoomStatus::CreatePending,
            password.as_deref(),
        )?;
        room.pending_create_config = Some(config);
        Ok(())
    }

    pub fn join_public_room(&mut self, room_id: &str, nickname: &str) -> Result<(), RoomError> {
        self.enter_room(room_id, nickname, RoomStatus::JoinPublicPending, None)?;
        Ok(())
    }

    pub fn join_private_room(
        &mut self,
        room_id: &str,
        nickname: &str,
        password: &str,
    ) -> Result<(), RoomError> {
        self.enter_room(
            room_id,
            nickname,
            RoomStatus::JoinPrivatePending,
            Some(password),
        )?;
        Ok(())
    }

    pub fn exit_room(&mut self, room_id: &str) -> Result<(), RoomError> {
        let room = joined_room(&mut self.rooms, room_id)
            .map_err(|err| log_rejection("ExitRoom", err))?;

        if !self.ctx.send_stanza(room.exit_presence()) {
            return Err(log_rejection("ExitRoom", RoomError::NotConnected));
        }
        room.status = RoomStatus::ExitPending;
        Ok(())
    }

    /// Rewrites the configuration of a room we own. `on_room_configured` reports the outcome.
    pub fn configure_room(&mut self, room_id: &str, config: RoomConfig) -> Result<(), RoomError> {
        let room = joined_room(&mut self.rooms, room_id)
            .map_err(|err| log_rejection("ConfigureRoom", err))?;

        if room.info.owner_id != room.nickname {
            return Err(log_rejection(
                "ConfigureRoom",
                RoomError::NotOwner {
                    room_id: room_id.to_string(),
                },
            ));
        }
        if room.pending_config_write.is_some() {
            return Err(log_rejection(
                "ConfigureRoom",
                RoomError::OperationPending {
                    room_id: room_id.to_string(),
                },
            ));
        }

        let iq_id = self.ctx.generate_id();
        if !self.ctx.send_stanza(room.config_iq(&iq_id, &config)) {
            return Err(log_rejection("ConfigureRoom", RoomError::NotConnected));
        }
        room.pending_config_write = Some(PendingConfigWrite {
            iq_id,
            callback: ConfigCallback::Configure,
        });
        Ok(())
    }

    /// Queries the room's disco#info. `on_room_info_refreshed` reports the outcome.
    pub fn refresh_room_info(&mut self, room_id: &str) -> Result<(), RoomError> {
        joined_room(&mut self.rooms, room_id)
            .map_err(|err| log_rejection("RefreshRoomInfo", err))?;
        self.send_info_query(room_id)
            .map_err(|err| log_rejection("RefreshRoomInfo", err))
    }

    pub fn send_chat(
        &mut self,
        room_id: &str,
        body: &str,
        chat_info: Option<&str>,
    ) -> Result<(), RoomError> {
        let room = joined_room(&mut self.rooms, room_id)
            .map_err(|err| log_rejection("SendChat", err))?;

        let mut message = StanzaTree::new_message(MessageKind::Groupchat)
            .set_to(&room.jid)
            .set_id(self.ctx.generate_id())
            .add_body_with_text(body);
        if let Some(chat_info) = chat_info.filter(|info| !info.is_empty()) {
            message = message.add_child(StanzaTree::new_text_node("chat-info", chat_info));
        }

        if !self.ctx.send_stanza(message) {
            return Err(log_rejection("SendChat", RoomError::NotConnected));
        }
        Ok(())
    }

    pub fn joined_rooms(&self) -> Vec<String> {
        let mut rooms = self
            .rooms
            .values()
            .filter(|room| room.status == RoomStatus::Joined)
            .map(|room| room.id.clone())
            .collect::<Vec<_>>();
        rooms.sort();
        rooms
    }

    pub fn room_status(&self, room_id: &str) -> RoomStatus {
        self.rooms
            .get(room_id)
            .map(|room| room.status)
            .unwrap_or(RoomStatus::NotJoined)
    }

    pub fn room_info(&self, room_id: &str) -> Option<&RoomInfo> {
        self.rooms.get(room_id).map(|room| &room.info)
    }

    pub fn members(&self, room_id: &str) -> Vec<ChatMember> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.clone())
            .unwrap_or_default()
    }

    pub fn member(&self, room_id: &str, nickname: &str) -> Option<&ChatMember> {
        self.rooms.get(room_id)?.member(nickname)
    }

    /// Cached messages of `room_id`, oldest first. A negative `count` returns all of them.
    pub fn last_messages(&self, room_id: &str, count: i32) -> Vec<RoomChatMessage> {
        self.rooms
            .get(room_id)
            .map(|room| room.last_messages(count))
            .unwrap_or_default()
    }

    pub fn dump_state(&self) {
        info!("MUC state: {} room(s)", self.rooms.len());
        for room in self.rooms.values() {
            info!("RoomId: {} ({})", room.id, room.jid);
            info!(
                " Owner: {} Subj: {} Priv: {}",
                room.info.owner_id, room.info.subject, room.info.is_private
            );
            info!(" Status: {}", room.status);
            info!(" Members: {}", room.members.len());
            for member in room.members.iter() {
                info!(
                    "  {} affiliation={} role={} available={}",
                    member.nickname,
                    member.affiliation,
                    member.role,
                    member.presence.is_available
                );
            }
        }
    }

    pub(crate) fn tick(&mut self) {
        while let Ok(item) = self.receiver.try_recv() {
            match item {
                MucItem::Presence(presence) => self.handle_presence(presence),
                MucItem::Message(message) => self.handle_message(message),
                MucItem::IqResponse(response) => self.handle_iq_response(response),
            }
        }
    }
}

impl MultiUserChat {
    fn enter_room(
        &mut self,
        room_id: &str,
        nickname: &str,
        status: RoomStatus,
        password: Option<&str>,
    ) -> Result<&mut Room, RoomError> {
        let operation = status.to_string();

        if room_id.is_empty() {
            return Err(log_rejection(&operation, RoomError::InvalidRoomId));
        }
        if nickname.is_empty() {
            return Err(log_rejection(&operation, RoomError::InvalidNickname));
        }
        if !self.ctx.is_logged_in() {
            return Err(log_rejection(&operation, RoomError::NotConnected));
        }
        match self.rooms.get(room_id).map(|room| room.status) {
            Some(RoomStatus::Joined) => {
                return Err(log_rejection(
                    &operation,
                    RoomError::AlreadyJoined {
                        room_id: room_id.to_string(),
                    },
                ))
            }
            Some(status) if status.is_pending() => {
                return Err(log_rejection(
                    &operation,
                    RoomError::OperationPending {
                        room_id: room_id.to_string(),
                    },
                ))
            }
            _ => (),
        }

        let config = self.ctx.config();
        let room = Room::new(room_id, &config.muc_domain(), nickname, status);

        if !self
            .ctx
            .send_stanza(room.join_presence(config.muc_history_depth, password))
        {
            return Err(log_rejection(&operation, RoomError::NotConnected));
        }

        debug!("Entering room {} as {} ({}).", room_id, nickname, status);
        self.rooms.insert(room_id.to_string(), room);
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound {
                room_id: room_id.to_string(),
            })
    }

    fn send_info_query(&mut self, room_id: &str) -> Result<(), RoomError> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(RoomError::RoomNotFound {
                room_id: room_id.to_string(),
            });
        };

        let id = self.ctx.generate_id();
        if !self.ctx.send_stanza(room.info_query(&id)) {
            return Err(RoomError::NotConnected);
        }
        room.pending_info_query = Some(id);
        Ok(())
    }

    fn handle_presence(&mut self, presence: MucPresence) {
        let Some(nickname) = self
            .rooms
            .get(&presence.room_id)
            .map(|room| room.nickname.clone())
        else {
            debug!("Ignoring presence for unknown room {}.", presence.room_id);
            return;
        };

        if let Some(condition) = presence.error.as_deref() {
            self.handle_presence_error(&presence.room_id, condition);
            return;
        }

        let is_self = presence.status_codes.contains(&STATUS_SELF_PRESENCE)
            || presence.member.nickname == nickname;

        if presence.status_codes.contains(&STATUS_CONFIG_CHANGED) {
            if let Err(err) = self.send_info_query(&presence.room_id) {
                warn!("Could not refresh info of room {}. {}", presence.room_id, err);
            }
        }

        if is_self {
            self.handle_self_presence(presence)
        } else {
            self.handle_member_presence(presence)
        }
    }

    fn handle_self_presence(&mut self, presence: MucPresence) {
        let room_id = presence.room_id;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        if !presence.member.presence.is_available {
            let status = room.status;
            self.rooms.remove(&room_id);
            let reason = presence.reason.unwrap_or_default();

            match status {
                RoomStatus::ExitPending => self
                    .on_exit_room
                    .broadcast(&RoomOperationResult::success(&room_id)),
                RoomStatus::Joined => {
                    info!("Removed from room {}. {}", room_id, reason);
                    self.on_exit_room.broadcast(&RoomOperationResult {
                        success: true,
                        room_id,
                        error: reason,
                    })
                }
                RoomStatus::CreatePending => self.on_room_created.broadcast(
                    &RoomOperationResult::failure(room_id, "Failed to configure room"),
                ),
                RoomStatus::JoinPublicPending => self
                    .on_join_public_room
                    .broadcast(&RoomOperationResult::failure(room_id, reason)),
                RoomStatus::JoinPrivatePending => self
                    .on_join_private_room
                    .broadcast(&RoomOperationResult::failure(room_id, reason)),
                RoomStatus::NotJoined => (),
            }
            return;
        }

        let is_owner = presence.member.affiliation == Affiliation::Owner;
        if is_owner {
            room.info.owner_id = presence.member.nickname.clone();
        }
        room.nickname = presence.member.nickname.clone();
        room.upsert_member(presence.member);

        match room.status {
            RoomStatus::CreatePending if is_owner => {
                if room.pending_config_write.is_some() {
                    return;
                }
                let config = room.pending_create_config.take().unwrap_or_default();
                let iq_id = self.ctx.generate_id();
                if !self.ctx.send_stanza(room.config_iq(&iq_id, &config)) {
                    warn!("Could not configure room {}. not connected", room_id);
                    return;
                }
                room.pending_config_write = Some(PendingConfigWrite {
                    iq_id,
                    callback: ConfigCallback::Create,
                });
                return;
            }
            RoomStatus::CreatePending => {
                // The room existed already.
                room.status = RoomStatus::Joined;
                room.pending_create_config = None;
                self.on_room_created
                    .broadcast(&RoomOperationResult::success(&room_id));
            }
            RoomStatus::JoinPublicPending => {
                room.status = RoomStatus::Joined;
                self.on_join_public_room
                    .broadcast(&RoomOperationResult::success(&room_id));
            }
            RoomStatus::JoinPrivatePending => {
                room.status = RoomStatus::Joined;
                self.on_join_private_room
                    .broadcast(&RoomOperationResult::success(&room_id));
            }
            RoomStatus::NotJoined | RoomStatus::Joined | RoomStatus::ExitPending => return,
        }

        self.replay_joined_room(&room_id);
    }

    /// Reports the occupants and messages that arrived before the join completed.
    fn replay_joined_room(&mut self, room_id: &str) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let members = room
            .members
            .iter()
            .filter(|member| member.nickname != room.nickname)
            .cloned()
            .collect::<Vec<_>>();
        let messages = room.last_messages(-1);

        for member in members {
            self.on_room_member_join.broadcast(&RoomMemberEvent {
                room_id: room_id.to_string(),
                member,
            });
        }
        for message in messages {
            self.on_room_chat_received.broadcast(&RoomChatReceived {
                room_id: room_id.to_string(),
                message,
            });
        }
    }

    fn handle_member_presence(&mut self, presence: MucPresence) {
        let room_id = presence.room_id;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let is_joined = room.status == RoomStatus::Joined;
        let member = presence.member;

        if !member.presence.is_available {
            if room.remove_member(&member.nickname).is_some() && is_joined {
                self.on_room_member_exit
                    .broadcast(&RoomMemberEvent { room_id, member });
            }
            return;
        }

        if member.affiliation == Affiliation::Owner {
            room.info.owner_id = member.nickname.clone();
        }

        match room.upsert_member(member.clone()) {
            None if is_joined => self
                .on_room_member_join
                .broadcast(&RoomMemberEvent { room_id, member }),
            Some(previous)
                if is_joined
                    && (previous.affiliation != member.affiliation
                        || previous.role != member.role
                        || previous.presence.status != member.presence.status
                        || previous.presence.status_str != member.presence.status_str) =>
            {
                self.on_room_member_changed
                    .broadcast(&RoomMemberEvent { room_id, member })
            }
            _ => (),
        }
    }

    fn handle_presence_error(&mut self, room_id: &str, condition: &str) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let error = error_text(condition);
        warn!("Presence error in room {}: {}", room_id, error);

        let status = room.status;
        match status {
            RoomStatus::CreatePending => {
                self.rooms.remove(room_id);
                self.on_room_created
                    .broadcast(&RoomOperationResult::failure(room_id, error));
            }
            RoomStatus::JoinPublicPending => {
                self.rooms.remove(room_id);
                self.on_join_public_room
                    .broadcast(&RoomOperationResult::failure(room_id, error));
            }
            RoomStatus::JoinPrivatePending => {
                self.rooms.remove(room_id);
                self.on_join_private_room
                    .broadcast(&RoomOperationResult::failure(room_id, error));
            }
            RoomStatus::ExitPending => {
                room.status = RoomStatus::Joined;
                self.on_exit_room
                    .broadcast(&RoomOperationResult::failure(room_id, error));
            }
            RoomStatus::Joined | RoomStatus::NotJoined => (),
        }
    }

    fn handle_message(&mut self, message: MucMessage) {
        let room_id = message.room_id;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!("Ignoring message for unknown room {}.", room_id);
            return;
        };

        if let Some(subject) = message.subject {
            room.info.subject = subject;
        }

        if let Some(body) = message.body {
            let chat = RoomChatMessage {
                from_nickname: message.nickname,
                body,
                timestamp: message.timestamp,
                chat_info: message.chat_info,
            };
            room.add_message(chat.clone());

            if room.status == RoomStatus::Joined {
                self.on_room_chat_received.broadcast(&RoomChatReceived {
                    room_id: room_id.clone(),
                    message: chat,
                });
            }
        }

        if message.status_codes.contains(&STATUS_CONFIG_CHANGED) {
            if let Err(err) = self.send_info_query(&room_id) {
                warn!("Could not refresh info of room {}. {}", room_id, err);
            }
        }
    }

    fn handle_iq_response(&mut self, response: MucIqResponse) {
        let room_id = response.room_id;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!("Ignoring IQ response for unknown room {}.", room_id);
            return;
        };

        if room
            .pending_config_write
            .as_ref()
            .is_some_and(|write| write.iq_id == response.id)
        {
            let Some(write) = room.pending_config_write.take() else {
                return;
            };

            match (write.callback, response.error) {
                (ConfigCallback::Create, None) => {
                    room.status = RoomStatus::Joined;
                    self.on_room_created
                        .broadcast(&RoomOperationResult::success(&room_id));
                    self.replay_joined_room(&room_id);
                }
                (ConfigCallback::Create, Some(condition)) => {
                    let exit_presence = room.exit_presence();
                    self.rooms.remove(&room_id);
                    if !self.ctx.send_stanza(exit_presence) {
                        debug!("Could not leave room {} after failed configuration.", room_id);
                    }
                    self.on_room_created.broadcast(&RoomOperationResult::failure(
                        room_id,
                        error_text(&condition),
                    ));
                }
                (ConfigCallback::Configure, None) => self
                    .on_room_configured
                    .broadcast(&RoomOperationResult::success(room_id)),
                (ConfigCallback::Configure, Some(condition)) => {
                    self.on_room_configured.broadcast(&RoomOperationResult::failure(
                        room_id,
                        error_text(&condition),
                    ))
                }
            }
            return;
        }

        if room.pending_info_query.as_deref() == Some(response.id.as_str()) {
            room.pending_info_query = None;

            match response.error {
                None => {
                    if let Some(info) = response.info {
                        if let Some(subject) = info.subject {
                            room.info.subject = subject;
                        }
                        room.info.is_private = info.is_private;
                    }
                    self.on_room_info_refreshed
                        .broadcast(&RoomOperationResult::success(room_id));
                }
                Some(condition) => self.on_room_info_refreshed.broadcast(
                    &RoomOperationResult::failure(room_id, error_text(&condition)),
                ),
            }
            return;
        }

        debug!("Ignoring IQ response {} from room {}.", response.id, room_id);
    }
}

/// The room `room_id` if we are currently in it.
fn joined_room<'a>(
    rooms: &'a mut HashMap<String, Room>,
    room_id: &str,
) -> Result<&'a mut Room, RoomError> {
    if room_id.is_empty() {
        return Err(RoomError::InvalidRoomId);
    }
    let Some(room) = rooms.get_mut(room_id) else {
        return Err(RoomError::RoomNotFound {
            room_id: room_id.to_string(),
        });
    };
    match room.status {
        RoomStatus::Joined => Ok(room),
        status if status.is_pending() => Err(RoomError::OperationPending {
            room_id: room_id.to_string(),
        }),
        _ => Err(RoomError::NotJoined {
            room_id: room_id.to_string(),
        }),
    }
}

fn log_rejection(operation: &str, err: RoomError) -> RoomError {
    warn!("{} failed. {}", operation, err);
    err
}

impl Module for MultiUserChat {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler> {
        self.handler.clone()
    }

    fn handle_disconnect(&mut self) {
        self.receiver.try_iter().for_each(drop);
        self.rooms.clear();
    }
}
