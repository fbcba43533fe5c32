// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, info};

use ember_xmpp::{ns, IqKind, StanzaTree};

use crate::client::ModuleContext;
use crate::mods::{Module, StanzaHandler};

/// An inbound XEP-0199 ping that still needs an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRequest {
    pub from: String,
    pub id: String,
}

/// Answers pings from the server or from peers.
pub struct Ping {
    ctx: ModuleContext,
    handler: Arc<PingHandler>,
    receiver: Receiver<PingRequest>,
    pending: Vec<PingRequest>,
}

struct PingHandler {
    sender: Sender<PingRequest>,
}

impl Ping {
    pub(crate) fn new(ctx: ModuleContext) -> Self {
        let (sender, receiver) = mpsc::channel();
        Ping {
            ctx,
            handler: Arc::new(PingHandler { sender }),
            receiver,
            pending: vec![],
        }
    }

    /// Pings that were received but could not be answered yet.
    pub fn pending_pings(&self) -> &[PingRequest] {
        &self.pending
    }

    pub(crate) fn tick(&mut self) {
        self.pending.extend(self.receiver.try_iter());

        if self.pending.is_empty() || !self.ctx.is_logged_in() {
            return;
        }

        for request in self.pending.drain(..) {
            let pong =
                StanzaTree::new_iq(IqKind::Result, request.id.as_str()).set_to(&request.from);
            if !self.ctx.send_stanza(pong) {
                debug!("Could not answer ping {} from {}.", request.id, request.from);
            }
        }
    }
}

impl Module for Ping {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler> {
        self.handler.clone()
    }

    fn handle_disconnect(&mut self) {
        self.receiver.try_iter().for_each(drop);
        self.pending.clear();
    }
}

impl StanzaHandler for PingHandler {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn handle_stanza(&self, stanza: &StanzaTree) -> bool {
        if stanza.name() != "iq" || !stanza.has_child("ping", ns::PING) {
            return false;
        }

        match stanza.kind() {
            Some("get") => {
                let (Some(from), Some(id)) = (stanza.attribute("from"), stanza.id()) else {
                    info!("Ignoring ping without sender or id.");
                    return true;
                };
                _ = self.sender.send(PingRequest {
                    from: from.to_string(),
                    id: id.to_string(),
                });
            }
            // The peer does not support pings.
            Some("error") => (),
            _ => debug!("Ignoring ping of unexpected type."),
        }
        true
    }
}
