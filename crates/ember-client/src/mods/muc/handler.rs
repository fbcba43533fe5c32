// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use tracing::debug;

use ember_xmpp::{ns, StanzaTree, UserJid};

use crate::client::ModuleContext;
use crate::mods::muc::types::{Affiliation, ChatMember, Role};
use crate::mods::presence::UserPresence;
use crate::mods::StanzaHandler;
use crate::util::delay_stamp;

pub(crate) const STATUS_SELF_PRESENCE: u16 = 110;
pub(crate) const STATUS_CONFIG_CHANGED: u16 = 104;

/// A MUC stanza, parsed on the IO thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MucItem {
    Presence(MucPresence),
    Message(MucMessage),
    IqResponse(MucIqResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MucPresence {
    pub room_id: String,
    pub member: ChatMember,
    pub status_codes: Vec<u16>,
    pub reason: Option<String>,
    /// Set for `type="error"` presences.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MucMessage {
    pub room_id: String,
    pub nickname: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub chat_info: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status_codes: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MucIqResponse {
    pub room_id: String,
    pub id: String,
    /// Set for `type="error"` responses.
    pub error: Option<String>,
    pub info: Option<DiscoInfo>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct DiscoInfo {
    pub subject: Option<String>,
    pub is_private: bool,
}

pub(crate) struct MucHandler {
    pub ctx: ModuleContext,
    pub sender: Sender<MucItem>,
}

impl StanzaHandler for MucHandler {
    fn name(&self) -> &'static str {
        "muc"
    }

    fn handle_stanza(&self, stanza: &StanzaTree) -> bool {
        let Some(from) = stanza.from() else {
            return false;
        };
        if from.domain != self.ctx.muc_domain() {
            return false;
        }

        let item = match stanza.name() {
            "presence" => Some(MucItem::Presence(parse_presence(
                &from,
                stanza,
                self.ctx.now(),
            ))),
            "message" => parse_message(&from, stanza, self.ctx.now()).map(MucItem::Message),
            "iq" => parse_iq_response(&from, stanza).map(MucItem::IqResponse),
            _ => None,
        };

        match item {
            Some(item) => {
                _ = self.sender.send(item);
            }
            None => debug!("Ignoring MUC stanza from {}.", from),
        }
        true
    }
}

fn status_codes(stanza: &StanzaTree) -> Vec<u16> {
    let Some(x) = stanza.child("x", ns::MUC_USER) else {
        return vec![];
    };
    x.children_named("status", ns::MUC_USER)
        .into_iter()
        .filter_map(|status| status.attribute("code")?.parse().ok())
        .collect()
}

fn parse_presence(from: &UserJid, stanza: &StanzaTree, now: DateTime<Utc>) -> MucPresence {
    let x = stanza.child("x", ns::MUC_USER);
    let item = x.as_ref().and_then(|x| x.child("item", ns::MUC_USER));

    let member = ChatMember {
        nickname: from.resource.clone(),
        member_jid: item
            .as_ref()
            .and_then(|item| item.attribute("jid"))
            .and_then(|jid| UserJid::parse(jid).ok()),
        presence: UserPresence::from_stanza(stanza, now),
        affiliation: item
            .as_ref()
            .and_then(|item| item.attribute("affiliation"))
            .and_then(|value| value.parse().ok())
            .unwrap_or(Affiliation::None),
        role: item
            .as_ref()
            .and_then(|item| item.attribute("role"))
            .and_then(|value| value.parse().ok())
            .unwrap_or(Role::None),
    };

    let error = (stanza.kind() == Some("error"))
        .then(|| stanza.error_condition().unwrap_or_default());

    MucPresence {
        room_id: from.id.clone(),
        member,
        status_codes: status_codes(stanza),
        reason: item
            .and_then(|item| item.child_by_name("reason"))
            .map(|reason| reason.text()),
        error,
    }
}

fn parse_message(from: &UserJid, stanza: &StanzaTree, now: DateTime<Utc>) -> Option<MucMessage> {
    match stanza.kind() {
        Some("groupchat") => (),
        Some("error") => {
            debug!(
                "MUC message error from {}: {}",
                from,
                stanza.error_condition().unwrap_or_default()
            );
            return None;
        }
        // Room notices such as configuration changes arrive without a type.
        None | Some("normal") if !status_codes(stanza).is_empty() => (),
        _ => return None,
    }

    Some(MucMessage {
        room_id: from.id.clone(),
        nickname: from.resource.clone(),
        subject: stanza.child_by_name("subject").map(|subject| subject.text()),
        body: stanza.body_text(),
        chat_info: stanza
            .child("chat-info", ns::JABBER_CLIENT)
            .map(|info| info.text()),
        timestamp: delay_stamp(stanza).unwrap_or(now),
        status_codes: status_codes(stanza),
    })
}

fn parse_iq_response(from: &UserJid, stanza: &StanzaTree) -> Option<MucIqResponse> {
    let id = stanza.id()?.to_string();

    let error = match stanza.kind() {
        Some("result") => None,
        Some("error") => Some(stanza.error_condition().unwrap_or_default()),
        _ => return None,
    };

    let info = stanza.child("query", ns::DISCO_INFO).map(|query| {
        let subject = query
            .child("x", ns::DATA_FORMS)
            .and_then(|form| {
                form.children_named("field", ns::DATA_FORMS)
                    .into_iter()
                    .find(|field| field.attribute("var") == Some("muc#roominfo_subject"))
            })
            .and_then(|field| field.child("value", ns::DATA_FORMS))
            .map(|value| value.text());

        let is_private = query
            .children_named("feature", ns::DISCO_INFO)
            .iter()
            .any(|feature| feature.attribute("var") == Some("muc_passwordprotected"));

        DiscoInfo {
            subject,
            is_private,
        }
    });

    Some(MucIqResponse {
        room_id: from.id.clone(),
        id,
        error,
        info,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use ember_xmpp::stanza;
    use ember_xmpp::test::{ConstantTimeProvider, IncrementingIDProvider};

    use crate::ServerConfig;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
    }

    fn handler() -> (MucHandler, mpsc::Receiver<MucItem>) {
        let (ctx, _) = ModuleContext::connected_for_testing(
            ServerConfig::new("prose.org"),
            UserJid::new("alice", "prose.org", "r"),
            Arc::new(IncrementingIDProvider::new("id")),
            Arc::new(ConstantTimeProvider::new(now())),
        );
        let (sender, receiver) = mpsc::channel();
        (MucHandler { ctx, sender }, receiver)
    }

    #[test]
    fn test_parses_occupant_presence() {
        let (handler, items) = handler();

        assert!(handler.handle_stanza(&stanza!(
            r#"<presence xmlns="jabber:client" from="lobby@muc.prose.org/alice">
                <x xmlns="http://jabber.org/protocol/muc#user">
                    <item affiliation="owner" role="moderator" jid="alice@prose.org/r"/>
                    <status code="110"/>
                    <status code="201"/>
                </x>
            </presence>"#
        )));

        let MucItem::Presence(presence) = items.try_recv().unwrap() else {
            panic!("Expected presence")
        };
        assert_eq!(presence.room_id, "lobby");
        assert_eq!(presence.member.nickname, "alice");
        assert_eq!(presence.member.affiliation, Affiliation::Owner);
        assert_eq!(presence.member.role, Role::Moderator);
        assert_eq!(
            presence.member.member_jid,
            Some(UserJid::new("alice", "prose.org", "r"))
        );
        assert_eq!(presence.status_codes, vec![110, 201]);
        assert_eq!(presence.error, None);
    }

    #[test]
    fn test_parses_presence_error() {
        let (handler, items) = handler();

        handler.handle_stanza(&stanza!(
            r#"<presence xmlns="jabber:client" type="error" from="vip@muc.prose.org/alice">
                <error type="auth"><not-authorized xmlns="urn:ietf:params:xml:ns:xmpp-stanzas"/></error>
            </presence>"#
        ));

        let MucItem::Presence(presence) = items.try_recv().unwrap() else {
            panic!("Expected presence")
        };
        assert_eq!(presence.error.as_deref(), Some("not-authorized"));
    }

    #[test]
    fn test_parses_groupchat() {
        let (handler, items) = handler();

        handler.handle_stanza(&stanza!(
            r#"<message xmlns="jabber:client" type="groupchat" from="lobby@muc.prose.org/bob">
                <body>hi</body>
                <chat-info>{"team":1}</chat-info>
            </message>"#
        ));

        let MucItem::Message(message) = items.try_recv().unwrap() else {
            panic!("Expected message")
        };
        assert_eq!(message.nickname, "bob");
        assert_eq!(message.body.as_deref(), Some("hi"));
        assert_eq!(message.chat_info.as_deref(), Some(r#"{"team":1}"#));
        assert_eq!(message.timestamp, now());
    }

    #[test]
    fn test_parses_disco_info() {
        let (handler, items) = handler();

        handler.handle_stanza(&stanza!(
            r#"<iq xmlns="jabber:client" type="result" id="q1" from="lobby@muc.prose.org">
                <query xmlns="http://jabber.org/protocol/disco#info">
                    <feature var="muc_passwordprotected"/>
                    <x xmlns="jabber:x:data" type="result">
                        <field var="muc#roominfo_subject"><value>Welcome</value></field>
                    </x>
                </query>
            </iq>"#
        ));

        let MucItem::IqResponse(response) = items.try_recv().unwrap() else {
            panic!("Expected iq")
        };
        assert_eq!(response.id, "q1");
        assert_eq!(
            response.info,
            Some(DiscoInfo {
                subject: Some("Welcome".to_string()),
                is_private: true
            })
        );
    }

    #[test]
    fn test_ignores_other_domains() {
        let (handler, items) = handler();

        assert!(!handler.handle_stanza(&stanza!(
            r#"<message xmlns="jabber:client" type="groupchat" from="lobby@prose.org/bob"><body>hi</body></message>"#
        )));
        assert!(items.try_recv().is_err());
    }
}
