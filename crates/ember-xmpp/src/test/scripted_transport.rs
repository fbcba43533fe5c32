// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{format_err, Result};
use minidom::Element;
use parking_lot::Mutex;

use crate::connector::{
    ConnectParams, ConnectionError, Transport, TransportEvent, TransportProvider, WireContext,
};
use crate::{StanzaTree, UserJid};

/// What happens when a connection attempt is made.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConnectBehavior {
    /// The session comes online on the next poll.
    #[default]
    Accept,
    /// The attempt starts but the server closes the stream on the next poll.
    Reject(ConnectionError),
    /// `connect` itself fails.
    Fail(ConnectionError),
}

pub type SentStanzaHandler = dyn FnMut(&Element) -> Vec<Element> + Send;

/// In-memory transport. Clones share their state, so a test keeps one handle while the
/// connection under test owns another.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptedTransportInner>,
}

#[derive(Default)]
struct ScriptedTransportInner {
    behavior: Mutex<ConnectBehavior>,
    connected: AtomicBool,
    events: Mutex<VecDeque<TransportEvent>>,
    sent_stanzas: Mutex<Vec<Element>>,
    stanza_handler: Mutex<Option<Box<SentStanzaHandler>>>,
    connect_count: AtomicUsize,
    disconnect_count: AtomicUsize,
    last_jid: Mutex<Option<UserJid>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> TransportProvider {
        let transport = self.clone();
        Box::new(move || Box::new(transport.clone()) as Box<dyn Transport>)
    }

    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        *self.inner.behavior.lock() = behavior;
    }

    /// `handler` is called for every sent stanza. The stanzas it returns are delivered as
    /// inbound stanzas on the next poll. It must not call back into the transport.
    pub fn set_stanza_handler<F>(&self, handler: F)
    where
        F: FnMut(&Element) -> Vec<Element> + Send + 'static,
    {
        *self.inner.stanza_handler.lock() = Some(Box::new(handler))
    }

    pub fn receive(&self, stanza: impl Into<Element>) {
        self.inner
            .events
            .lock()
            .push_back(TransportEvent::Stanza(stanza.into()));
    }

    pub fn receive_stanza(&self, stanza: StanzaTree) {
        self.receive(stanza.into_element())
    }

    /// Simulates the server closing the stream.
    pub fn close(&self, error: Option<ConnectionError>) {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner
            .events
            .lock()
            .push_back(TransportEvent::Disconnected { error });
    }

    pub fn sent_stanzas(&self) -> Vec<Element> {
        self.inner.sent_stanzas.lock().clone()
    }

    pub fn sent_stanza_trees(&self) -> Vec<StanzaTree> {
        self.sent_stanzas().into_iter().map(Into::into).collect()
    }

    pub fn sent_stanza_strings(&self) -> Vec<String> {
        self.inner
            .sent_stanzas
            .lock()
            .iter()
            .map(String::from)
            .collect()
    }

    pub fn reset(&self) {
        self.inner.sent_stanzas.lock().clear()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connect_count.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.inner.disconnect_count.load(Ordering::SeqCst)
    }

    pub fn last_connect_jid(&self) -> Option<UserJid> {
        self.inner.last_jid.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &mut self,
        _ctx: &WireContext,
        params: &ConnectParams,
    ) -> Result<(), ConnectionError> {
        self.inner.connect_count.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_jid.lock() = Some(params.jid.clone());

        let behavior = self.inner.behavior.lock().clone();
        let mut events = self.inner.events.lock();
        events.clear();

        match behavior {
            ConnectBehavior::Accept => {
                self.inner.connected.store(true, Ordering::SeqCst);
                events.push_back(TransportEvent::Connected);
                Ok(())
            }
            ConnectBehavior::Reject(error) => {
                events.push_back(TransportEvent::Disconnected { error: Some(error) });
                Ok(())
            }
            ConnectBehavior::Fail(error) => Err(error),
        }
    }

    fn disconnect(&mut self, _ctx: &WireContext) {
        self.inner.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn send(&mut self, _ctx: &WireContext, stanza: Element) -> Result<()> {
        if !self.is_connected() {
            return Err(format_err!("Not connected"));
        }

        let responses = match self.inner.stanza_handler.lock().as_mut() {
            Some(handler) => (handler)(&stanza),
            None => vec![],
        };

        self.inner.sent_stanzas.lock().push(stanza);

        let mut events = self.inner.events.lock();
        for response in responses {
            events.push_back(TransportEvent::Stanza(response));
        }
        Ok(())
    }

    fn poll(&mut self, _ctx: &WireContext, timeout: Duration) -> Vec<TransportEvent> {
        let events: Vec<_> = self.inner.events.lock().drain(..).collect();
        if events.is_empty() {
            thread::sleep(timeout);
        }
        events
    }
}
