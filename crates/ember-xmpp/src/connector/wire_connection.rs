// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::connector::{ConnectParams, ConnectionError, Transport, TransportEvent, WireContext};
use crate::stanza::{ns, IqKind};
use crate::{IDProvider, StanzaTree, UserJid};

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(5);
const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected { error: Option<ConnectionError> },
}

/// Keep-alive settings. A zero `interval` turns keep-alive pings off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepAlive {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        KeepAlive {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
        }
    }
}

type ConnectionHandler = Box<dyn FnMut(&ConnectionEvent) + Send>;
type StanzaHandler = Box<dyn FnMut(StanzaTree) + Send>;

struct PendingPing {
    id: String,
    sent_at: Instant,
}

/// A single protocol connection. All callbacks are invoked synchronously from `pump` on the
/// calling thread.
pub struct WireConnection {
    context: WireContext,
    transport: Box<dyn Transport>,
    jid: UserJid,
    password: SecretString,
    keep_alive: KeepAlive,
    id_provider: Arc<dyn IDProvider>,
    state: ConnectionState,
    last_ping_at: Instant,
    pending_ping: Option<PendingPing>,
    poll_timeout: Duration,
    idle_sleep: Duration,
    connection_handler: Option<ConnectionHandler>,
    stanza_handler: Option<StanzaHandler>,
}

impl WireConnection {
    pub fn new(
        context: WireContext,
        transport: Box<dyn Transport>,
        jid: UserJid,
        password: SecretString,
        keep_alive: KeepAlive,
        id_provider: Arc<dyn IDProvider>,
    ) -> Self {
        WireConnection {
            context,
            transport,
            jid,
            password,
            keep_alive,
            id_provider,
            state: ConnectionState::Disconnected,
            last_ping_at: Instant::now(),
            pending_ping: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            connection_handler: None,
            stanza_handler: None,
        }
    }

    pub fn set_pump_timing(&mut self, poll_timeout: Duration, idle_sleep: Duration) {
        self.poll_timeout = poll_timeout;
        self.idle_sleep = idle_sleep;
    }

    pub fn set_connection_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&ConnectionEvent) + Send + 'static,
    {
        self.connection_handler = Some(Box::new(handler))
    }

    pub fn set_stanza_handler<F>(&mut self, handler: F)
    where
        F: FnMut(StanzaTree) + Send + 'static,
    {
        self.stanza_handler = Some(Box::new(handler))
    }

    pub fn clear_handlers(&mut self) {
        self.connection_handler = None;
        self.stanza_handler = None;
    }

    pub fn context(&self) -> &WireContext {
        &self.context
    }

    pub fn jid(&self) -> &UserJid {
        &self.jid
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn keep_alive(&self) -> KeepAlive {
        self.keep_alive
    }
}

impl WireConnection {
    /// Starts connecting. Returns false if the attempt could not even be started.
    pub fn connect(&mut self, address: &str, port: u16, use_ssl: bool) -> bool {
        if self.state != ConnectionState::Disconnected {
            warn!("Ignoring connect request while {}.", self.state);
            return false;
        }

        info!("Connecting to {}:{}…", address, port);

        let params = ConnectParams {
            jid: self.jid.clone(),
            password: self.password.clone(),
            address: address.to_string(),
            port,
            use_ssl,
        };

        match self.transport.connect(&self.context, &params) {
            Ok(()) => {
                self.state = ConnectionState::Connecting;
                true
            }
            Err(err) => {
                error!("Failed to connect to {}:{}. {}", address, port, err);
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        info!("Disconnecting…");
        self.transport.disconnect(&self.context);
        self.state = ConnectionState::Disconnected;
        self.pending_ping = None;
    }

    pub fn send_stanza(&mut self, stanza: StanzaTree) -> bool {
        if self.state != ConnectionState::Connected {
            debug!("Not sending stanza while {}.", self.state);
            return false;
        }

        #[cfg(feature = "trace-stanzas")]
        tracing::info!(direction = "OUT", "{}", stanza);

        if let Err(err) = self.transport.send(&self.context, stanza.into_element()) {
            error!("Failed to send stanza. {}", err);
            return false;
        }
        true
    }

    /// One bounded wait on the transport, followed by a short sleep.
    pub fn pump(&mut self) {
        let events = self.transport.poll(&self.context, self.poll_timeout);
        for event in events {
            self.handle_transport_event(event);
        }
        self.check_keep_alive(Instant::now());

        if !self.idle_sleep.is_zero() {
            thread::sleep(self.idle_sleep);
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring connected event while {}.", self.state);
                    return;
                }
                info!("Connected.");
                self.state = ConnectionState::Connected;
                self.last_ping_at = Instant::now();
                self.pending_ping = None;
                self.emit(ConnectionEvent::Connected);
            }
            TransportEvent::Disconnected { error } => {
                if self.state == ConnectionState::Disconnected {
                    return;
                }
                match &error {
                    Some(err) => warn!("Connection closed with error. {}", err),
                    None => info!("Connection closed."),
                }
                self.state = ConnectionState::Disconnected;
                self.pending_ping = None;
                self.emit(ConnectionEvent::Disconnected { error });
            }
            TransportEvent::Stanza(element) => {
                let stanza: StanzaTree = element.into();

                #[cfg(feature = "trace-stanzas")]
                tracing::info!(direction = "IN", "{}", stanza);

                if self.is_keep_alive_answer(&stanza) {
                    self.pending_ping = None;
                    return;
                }

                if let Some(handler) = self.stanza_handler.as_mut() {
                    (handler)(stanza);
                }
            }
        }
    }

    fn is_keep_alive_answer(&self, stanza: &StanzaTree) -> bool {
        let Some(pending) = &self.pending_ping else {
            return false;
        };
        stanza.name() == "iq"
            && stanza.id() == Some(pending.id.as_str())
            && matches!(stanza.kind(), Some("result") | Some("error"))
    }

    fn check_keep_alive(&mut self, now: Instant) {
        if self.state != ConnectionState::Connected || self.keep_alive.interval.is_zero() {
            return;
        }

        if let Some(pending) = &self.pending_ping {
            if now.duration_since(pending.sent_at) >= self.keep_alive.timeout {
                warn!("Ping timed out. Disconnecting…");
                self.transport.disconnect(&self.context);
                self.state = ConnectionState::Disconnected;
                self.pending_ping = None;
                self.emit(ConnectionEvent::Disconnected {
                    error: Some(ConnectionError::TimedOut),
                });
            }
            return;
        }

        if now.duration_since(self.last_ping_at) < self.keep_alive.interval {
            return;
        }

        let id = self.id_provider.new_id();
        let ping = StanzaTree::new_iq(IqKind::Get, id.clone())
            .set_to(&self.jid.domain)
            .add_child(StanzaTree::new_with_ns("ping", ns::PING));

        self.last_ping_at = now;
        if self.send_stanza(ping) {
            self.pending_ping = Some(PendingPing { id, sent_at: now });
        }
    }

    fn emit(&mut self, event: ConnectionEvent) {
        if let Some(handler) = self.connection_handler.as_mut() {
            (handler)(&event);
        }
    }
}
