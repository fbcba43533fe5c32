// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::connector::{ConnectionError, ConnectionEvent, ConnectionState, WireConnection};
use crate::{IDProvider, StanzaTree};

const THREAD_NAME: &str = "org.ember.xmpp-thread";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum LoginStatus {
    #[default]
    NotStarted,
    ProcessingLogin,
    ProcessingLogout,
    LoggedIn,
    LoggedOut,
}

/// A login status transition as reported by the IO thread.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginStatusUpdate {
    pub status: LoginStatus,
    pub error: Option<ConnectionError>,
}

/// Invoked on the IO thread for every inbound stanza.
pub type StanzaCallback = Arc<dyn Fn(StanzaTree) + Send + Sync>;

/// Where to connect to.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerAddress {
    pub address: String,
    pub port: u16,
    pub use_ssl: bool,
}

#[derive(Default)]
struct Flags {
    connect_requested: AtomicBool,
    disconnect_requested: AtomicBool,
}

/// Owns a `WireConnection` on a dedicated thread. The connection is opened as soon as the
/// thread starts. Dropping the `IoThread` disconnects and blocks until the thread is gone.
pub struct IoThread {
    flags: Arc<Flags>,
    outbound: Sender<StanzaTree>,
    handle: Option<JoinHandle<()>>,
}

impl IoThread {
    pub fn start(
        connection: WireConnection,
        server: ServerAddress,
        id_provider: Arc<dyn IDProvider>,
        status: Sender<LoginStatusUpdate>,
        stanza_callback: StanzaCallback,
    ) -> Result<Self> {
        let flags = Arc::new(Flags::default());
        flags.connect_requested.store(true, Ordering::SeqCst);

        let (outbound, outbound_rx) = mpsc::channel();

        let worker = Worker {
            connection,
            server,
            flags: flags.clone(),
            outbound: outbound_rx,
            id_provider,
            status,
        };

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || worker.run(stanza_callback))?;

        Ok(IoThread {
            flags,
            outbound,
            handle: Some(handle),
        })
    }

    /// Queues `stanza` for sending. Stanzas queued while the connection is not (yet) up are
    /// sent once it is.
    pub fn send_stanza(&self, stanza: StanzaTree) -> bool {
        self.outbound.send(stanza).is_ok()
    }

    pub fn outbound_sender(&self) -> Sender<StanzaTree> {
        self.outbound.clone()
    }

    /// Requests a disconnect. The thread picks it up on its next loop iteration and exits.
    pub fn stop(&self) {
        self.flags.disconnect_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("XMPP thread panicked.");
            }
        }
    }
}

struct Worker {
    connection: WireConnection,
    server: ServerAddress,
    flags: Arc<Flags>,
    outbound: Receiver<StanzaTree>,
    id_provider: Arc<dyn IDProvider>,
    status: Sender<LoginStatusUpdate>,
}

impl Worker {
    fn run(mut self, stanza_callback: StanzaCallback) {
        let span = self.connection.context().span().clone();
        let _entered = span.enter();

        info!("XMPP thread started.");

        let status = self.status.clone();
        self.connection
            .set_connection_handler(move |event| match event {
                ConnectionEvent::Connected => {
                    _ = status.send(LoginStatusUpdate {
                        status: LoginStatus::LoggedIn,
                        error: None,
                    });
                }
                ConnectionEvent::Disconnected { error } => {
                    _ = status.send(LoginStatusUpdate {
                        status: LoginStatus::LoggedOut,
                        error: error.clone(),
                    });
                }
            });
        self.connection
            .set_stanza_handler(move |stanza| (stanza_callback)(stanza));

        loop {
            let state = self.connection.state();
            let mut exit = false;

            if self.flags.connect_requested.load(Ordering::SeqCst)
                && state == ConnectionState::Disconnected
            {
                self.flags.connect_requested.store(false, Ordering::SeqCst);
                self.emit(LoginStatus::ProcessingLogin, None);

                if !self.connection.connect(
                    &self.server.address,
                    self.server.port,
                    self.server.use_ssl,
                ) {
                    self.emit(
                        LoginStatus::LoggedOut,
                        Some(ConnectionError::Generic {
                            msg: format!(
                                "Could not connect to {}:{}",
                                self.server.address, self.server.port
                            ),
                        }),
                    );
                }
            } else if self.flags.disconnect_requested.load(Ordering::SeqCst) {
                if state != ConnectionState::Disconnected {
                    self.emit(LoginStatus::ProcessingLogout, None);
                    self.connection.disconnect();
                    self.emit(LoginStatus::LoggedOut, None);
                }
                exit = true;
            }

            if self.connection.state() == ConnectionState::Connected {
                self.send_queued_stanzas();
            }

            if exit {
                break;
            }

            self.connection.pump();
        }

        self.exit();
    }

    fn send_queued_stanzas(&mut self) {
        while let Ok(stanza) = self.outbound.try_recv() {
            let stanza = if stanza.id().is_none() {
                stanza.set_id(self.id_provider.new_id())
            } else {
                stanza
            };

            if !self.connection.send_stanza(stanza) {
                debug!("Dropped outbound stanza.");
            }
        }
    }

    fn exit(&mut self) {
        self.connection.disconnect();
        self.connection.clear_handlers();
        info!("XMPP thread finished.");
    }

    fn emit(&self, status: LoginStatus, error: Option<ConnectionError>) {
        _ = self.status.send(LoginStatusUpdate { status, error });
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    use crate::connector::{KeepAlive, WireContext};
    use crate::stanza::MessageKind;
    use crate::test::{ConnectBehavior, IncrementingIDProvider, ScriptedTransport};
    use crate::UserJid;

    use super::*;

    struct Harness {
        transport: ScriptedTransport,
        status: Receiver<LoginStatusUpdate>,
        received: Arc<Mutex<Vec<StanzaTree>>>,
        thread: IoThread,
    }

    fn start(transport: ScriptedTransport) -> Harness {
        let jid = UserJid::new("alice", "prose.org", "desktop");
        let id_provider: Arc<dyn IDProvider> = Arc::new(IncrementingIDProvider::new("id"));
        let connection = WireConnection::new(
            WireContext::new(&jid).unwrap(),
            Box::new(transport.clone()),
            jid,
            SecretString::new("pw".to_string()),
            KeepAlive::default(),
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

        Harness {
            transport,
            status,
            received,
            thread,
        }
    }

    fn next_status(harness: &Harness) -> LoginStatus {
        harness
            .status
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
            .status
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "Timed out waiting for condition");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_logs_in_and_out() {
        let harness = start(ScriptedTransport::new());

        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);
        assert_eq!(next_status(&harness), LoginStatus::LoggedIn);

        harness.thread.stop();
        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogout);
        assert_eq!(next_status(&harness), LoginStatus::LoggedOut);

        wait_until(|| harness.thread.is_finished());
        assert_eq!(harness.transport.disconnect_count(), 1);
    }

    #[test]
    fn test_reports_synchronous_connect_failure() {
        let transport = ScriptedTransport::new();
        transport.set_connect_behavior(ConnectBehavior::Fail(ConnectionError::Generic {
            msg: "refused".to_string(),
        }));
        let harness = start(transport);

        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);
        assert_eq!(next_status(&harness), LoginStatus::LoggedOut);
    }

    #[test]
    fn test_reports_rejected_credentials() {
        let transport = ScriptedTransport::new();
        transport.set_connect_behavior(ConnectBehavior::Reject(
            ConnectionError::InvalidCredentials,
        ));
        let harness = start(transport);

        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);
        let update = harness
            .status
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(
            update,
            LoginStatusUpdate {
                status: LoginStatus::LoggedOut,
                error: Some(ConnectionError::InvalidCredentials)
            }
        );
    }

    #[test]
    fn test_tags_outbound_stanzas_with_ids() {
        let harness = start(ScriptedTransport::new());

        assert!(harness
            .thread
            .send_stanza(StanzaTree::new_message(MessageKind::Chat)));
        assert!(harness
            .thread
            .send_stanza(StanzaTree::new_presence().set_id("own-id")));

        wait_until(|| harness.transport.sent_stanzas().len() == 2);

        let sent = harness.transport.sent_stanzas();
        assert_eq!(sent[0].attr("id"), Some("id-1"));
        assert_eq!(sent[1].attr("id"), Some("own-id"));
    }

    #[test]
    fn test_forwards_inbound_stanzas() {
        let harness = start(ScriptedTransport::new());
        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);
        assert_eq!(next_status(&harness), LoginStatus::LoggedIn);

        harness
            .transport
            .receive_stanza(StanzaTree::new_presence().set_from("bob@prose.org/r"));

        wait_until(|| harness.received.lock().len() == 1);
        assert_eq!(
            harness.received.lock()[0].from(),
            Some(UserJid::new("bob", "prose.org", "r"))
        );
    }

    #[test]
    fn test_server_disconnect_is_reported_once() {
        let harness = start(ScriptedTransport::new());
        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);
        assert_eq!(next_status(&harness), LoginStatus::LoggedIn);

        harness.transport.close(Some(ConnectionError::Generic {
            msg: "stream error".to_string(),
        }));
        assert_eq!(next_status(&harness), LoginStatus::LoggedOut);

        harness.thread.stop();
        wait_until(|| harness.thread.is_finished());
        assert!(harness.status.try_recv().is_err());
        assert_eq!(harness.transport.connect_count(), 1);
    }

    #[test]
    fn test_drop_joins_thread() {
        let harness = start(ScriptedTransport::new());
        assert_eq!(next_status(&harness), LoginStatus::ProcessingLogin);

        let Harness {
            transport, thread, ..
        } = harness;
        drop(thread);

        assert!(!transport.is_connected());
    }
}
