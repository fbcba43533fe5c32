// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use secrecy::SecretString;

use ember_xmpp::test::{IncrementingIDProvider, ScriptedTransport};
use ember_xmpp::{
    stanza, ConnectionError, IDProvider, IoThread, KeepAlive, LoginStatus, LoginStatusUpdate,
    MessageKind, ServerAddress, StanzaTree, UserJid, WireConnection, WireContext,
};

struct Session {
    thread: IoThread,
    status: Receiver<LoginStatusUpdate>,
    received: Arc<Mutex<Vec<StanzaTree>>>,
}

fn start(transport: &ScriptedTransport, keep_alive: KeepAlive) -> Session {
    let jid = UserJid::new("alice", "prose.org", "desktop");
    let id_provider: Arc<dyn IDProvider> = Arc::new(IncrementingIDProvider::new("id"));

    let connection = WireConnection::new(
        WireContext::new(&jid).unwrap(),
        Box::new(transport.clone()),
        jid,
        SecretString::new("pw".to_string()),
        keep_alive,
        id_provider.clone(),
    );

    let (status_tx, status) = mpsc::channel();
    let received = Arc::new(Mutex::new(vec![]));
    let callback_received = received.clone();

    let thread = IoThread::start(
        connection,
        ServerAddress {
            address: "prose.org".to_string(),
            port: 5222,
            use_ssl: true,
        },
        id_provider,
        status_tx,
        Arc::new(move |stanza| callback_received.lock().push(stanza)),
    )
    .unwrap();

    Session {
        thread,
        status,
        received,
    }
}

fn wait_for_status(session: &Session, status: LoginStatus) -> LoginStatusUpdate {
    loop {
        let update = session
            .status
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        if update.status == status {
            return update;
        }
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        thread::sleep(Duration::from_millis(2));
    }
}

fn is_ping(stanza: &StanzaTree) -> bool {
    stanza.name() == "iq" && stanza.has_child("ping", "urn:xmpp:ping")
}

#[test]
fn test_request_response_roundtrip() {
    let transport = ScriptedTransport::new();
    transport.set_stanza_handler(|element| {
        let stanza: StanzaTree = element.clone().into();
        if stanza.name() != "message" {
            return vec![];
        }
        vec![StanzaTree::new_message(MessageKind::Chat)
            .set_from("bob@prose.org/r")
            .set_to("alice@prose.org/desktop")
            .add_body_with_text(format!("re: {}", stanza.body_text().unwrap_or_default()))
            .into_element()]
    });

    let session = start(
        &transport,
        KeepAlive {
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
        },
    );

    // Queued before the session is up.
    assert!(session.thread.send_stanza(
        StanzaTree::new_message(MessageKind::Chat)
            .set_to("bob@prose.org")
            .add_body_with_text("hello")
    ));

    wait_for_status(&session, LoginStatus::LoggedIn);
    wait_until(|| !session.received.lock().is_empty());

    let received = session.received.lock();
    assert_eq!(received[0].body_text().as_deref(), Some("re: hello"));

    let sent = transport.sent_stanza_trees();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id(), Some("id-1"));
}

#[test]
fn test_answered_keep_alive_keeps_session() {
    let transport = ScriptedTransport::new();
    transport.set_stanza_handler(|element| {
        let stanza: StanzaTree = element.clone().into();
        if !is_ping(&stanza) {
            return vec![];
        }
        vec![stanza!(format!(
            r#"<iq xmlns="jabber:client" type="result" from="prose.org" id="{}"/>"#,
            stanza.id().unwrap_or_default()
        ))
        .into_element()]
    });

    let session = start(
        &transport,
        KeepAlive {
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(100),
        },
    );
    wait_for_status(&session, LoginStatus::LoggedIn);

    let pings = || transport.sent_stanza_trees().iter().filter(|s| is_ping(s)).count();
    wait_until(|| pings() >= 3);

    assert!(session.status.try_recv().is_err());
    assert!(session.received.lock().is_empty());
    assert!(transport.is_connected());
}

#[test]
fn test_unanswered_keep_alive_times_out() {
    let transport = ScriptedTransport::new();
    let session = start(
        &transport,
        KeepAlive {
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(50),
        },
    );
    wait_for_status(&session, LoginStatus::LoggedIn);

    let update = wait_for_status(&session, LoginStatus::LoggedOut);
    assert_eq!(update.error, Some(ConnectionError::TimedOut));
    assert_eq!(transport.disconnect_count(), 1);
}
