// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::thread;
use std::time::Duration;

use anyhow::{format_err, Result};
use futures::stream::StreamExt;
use futures::SinkExt;
use minidom::Element;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_xmpp::{AsyncClient, AsyncConfig, AsyncServerConfig, Error, Event, Packet};
use tracing::{debug, error, info};

use crate::connector::{
    ConnectParams, ConnectionError, Transport, TransportEvent, TransportProvider, WireContext,
};

const STREAM_END_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Transport backed by a tokio-xmpp client running on the connection's `WireContext`.
///
/// Connects to `address:port` of the connect parameters, falling back to an SRV lookup of the
/// JID's domain if no address is set. The stream is always upgraded via STARTTLS, so
/// `use_ssl == false` is rejected.
#[derive(Default)]
pub struct XmppRsTransport {
    events: Option<UnboundedReceiver<TransportEvent>>,
    packets: Option<UnboundedSender<Packet>>,
    client_handle: Option<JoinHandle<()>>,
}

impl XmppRsTransport {
    pub fn provider() -> TransportProvider {
        Box::new(|| Box::new(XmppRsTransport::default()) as Box<dyn Transport>)
    }
}

impl Transport for XmppRsTransport {
    fn connect(
        &mut self,
        ctx: &WireContext,
        params: &ConnectParams,
    ) -> Result<(), ConnectionError> {
        let jid = params
            .jid
            .to_full_jid()
            .map_err(|err| ConnectionError::Generic {
                msg: err.to_string(),
            })?;

        let config = AsyncConfig {
            jid: jid.into(),
            password: params.password.expose_secret().clone(),
            server: server_config(params)?,
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (packet_tx, packet_rx) = mpsc::unbounded_channel();

        let handle = ctx.spawn(async move {
            let mut client = AsyncClient::new_with_config(config);
            client.set_reconnect(false);

            if let Err(err) = wait_until_online(&mut client).await {
                _ = event_tx.send(TransportEvent::Disconnected { error: Some(err) });
                return;
            }
            _ = event_tx.send(TransportEvent::Connected);

            run_session(client, event_tx, packet_rx).await;
        });

        self.events = Some(event_rx);
        self.packets = Some(packet_tx);
        self.client_handle = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self, ctx: &WireContext) {
        if let Some(packets) = self.packets.take() {
            _ = packets.send(Packet::StreamEnd);
        }

        let Some(handle) = self.client_handle.take() else {
            self.events = None;
            return;
        };

        let abort_handle = handle.abort_handle();
        ctx.block_on(async move {
            if time::timeout(STREAM_END_GRACE_PERIOD, handle).await.is_err() {
                debug!("Stream did not close in time. Aborting.");
            }
        });
        abort_handle.abort();
        self.events = None;
    }

    fn send(&mut self, _ctx: &WireContext, stanza: Element) -> Result<()> {
        let Some(packets) = &self.packets else {
            return Err(format_err!("Not connected"));
        };
        packets.send(Packet::Stanza(stanza))?;
        Ok(())
    }

    fn poll(&mut self, ctx: &WireContext, timeout: Duration) -> Vec<TransportEvent> {
        let Some(events) = self.events.as_mut() else {
            thread::sleep(timeout);
            return vec![];
        };

        let mut received = vec![];
        let mut closed = false;

        ctx.block_on(async {
            match time::timeout(timeout, events.recv()).await {
                Ok(Some(event)) => received.push(event),
                Ok(None) => closed = true,
                Err(_) => (),
            }
        });

        loop {
            match events.try_recv() {
                Ok(event) => received.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        if closed {
            self.events = None;
            self.packets = None;
            self.client_handle = None;
            received.push(TransportEvent::Disconnected { error: None });
        }

        received
    }
}

fn server_config(params: &ConnectParams) -> Result<AsyncServerConfig, ConnectionError> {
    if !params.use_ssl {
        return Err(ConnectionError::Generic {
            msg: "Unencrypted connections are not supported".to_string(),
        });
    }

    if params.address.is_empty() {
        info!("No server address set. Resolving {} via SRV.", params.jid.domain);
        return Ok(AsyncServerConfig::UseSrv);
    }

    Ok(AsyncServerConfig::Manual {
        host: params.address.clone(),
        port: params.port,
    })
}

async fn wait_until_online(client: &mut AsyncClient) -> Result<(), ConnectionError> {
    while let Some(event) = client.next().await {
        match event {
            Event::Disconnected(Error::Auth(_)) => {
                return Err(ConnectionError::InvalidCredentials);
            }
            Event::Disconnected(e) => {
                return Err(ConnectionError::Generic { msg: e.to_string() });
            }
            Event::Online { .. } => return Ok(()),
            Event::Stanza(stanza) => {
                return Err(ConnectionError::Generic {
                    msg: format!("Received unexpected stanza {:?}", stanza),
                });
            }
        }
    }
    Err(ConnectionError::Generic {
        msg: "Stream closed before the session was established".to_string(),
    })
}

async fn run_session(
    client: AsyncClient,
    events: UnboundedSender<TransportEvent>,
    mut packets: UnboundedReceiver<Packet>,
) {
    let (mut writer, mut reader) = client.split();

    let write_handle = tokio::spawn(async move {
        while let Some(packet) = packets.recv().await {
            let is_stream_end = matches!(packet, Packet::StreamEnd);
            if let Err(err) = writer.send(packet).await {
                error!("cannot send Stanza to internal channel: {}", err);
                break;
            }
            if is_stream_end {
                break;
            }
        }
    });

    while let Some(event) = reader.next().await {
        match event {
            Event::Disconnected(err) => {
                _ = events.send(TransportEvent::Disconnected {
                    error: Some(ConnectionError::Generic {
                        msg: err.to_string(),
                    }),
                });
                break;
            }
            Event::Online { .. } => (),
            Event::Stanza(stanza) => {
                if events.send(TransportEvent::Stanza(stanza)).is_err() {
                    break;
                }
            }
        }
    }

    write_handle.abort();
}
