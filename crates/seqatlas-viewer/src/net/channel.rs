use crate::net::Incoming;
use crate::util::config::{EndpointKind, ViewerConfig};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use seqatlas_core::{ClientMsg, ServerMsg};
use std::time::Duration;
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ViewerConfig) -> Self {
        Self {
            backoff: Duration::from_millis(cfg.reconnect_backoff_ms),
            max_attempts: cfg.max_reconnect_attempts,
        }
    }
}

/// Outbound side of the streaming channel. Dropping it tears the connection down.
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<ClientMsg>,
}

impl ChannelHandle {
    pub fn send(&self, msg: ClientMsg) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| anyhow!("streaming channel has stopped"))
    }
}

pub fn spawn_channel(
    endpoint: EndpointKind,
    policy: ReconnectPolicy,
    tx: Sender<Incoming>,
) -> ChannelHandle {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let label = endpoint.label();
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = tx.send(Incoming::error(label.clone(), format!("tokio runtime: {e}")));
                let _ = tx.send(Incoming::gave_up(label));
                return;
            }
        };
        rt.block_on(supervise(endpoint, policy, out_rx, tx));
    });
    ChannelHandle { outbound: out_tx }
}

/// What to re-send after a reconnect so the server sees the same state.
#[derive(Debug, Default)]
struct Replay {
    init_requested: bool,
    background_loaded: bool,
    last_query: Option<ClientMsg>,
}

impl Replay {
    fn record(&mut self, msg: &ClientMsg) {
        match msg {
            ClientMsg::Init(_) => self.init_requested = true,
            ClientMsg::Query(_) => self.last_query = Some(msg.clone()),
        }
    }

    fn observe(&mut self, msg: &ServerMsg) {
        if matches!(msg, ServerMsg::Init { .. }) {
            self.background_loaded = true;
        }
    }

    fn pending(&self) -> Vec<ClientMsg> {
        let mut out = Vec::new();
        if self.init_requested && !self.background_loaded {
            out.push(ClientMsg::init());
        }
        if let Some(q) = &self.last_query {
            out.push(q.clone());
        }
        out
    }
}

enum SessionEnd {
    Teardown,
    Closed,
}

async fn supervise(
    endpoint: EndpointKind,
    policy: ReconnectPolicy,
    mut outbound: mpsc::UnboundedReceiver<ClientMsg>,
    tx: Sender<Incoming>,
) {
    let label = endpoint.label();
    let mut replay = Replay::default();
    let mut failures: u32 = 0;

    loop {
        match connect(&endpoint).await {
            Ok(conn) => {
                failures = 0;
                tracing::info!(endpoint = %label, "streaming channel connected");
                let _ = tx.send(Incoming::connected(label.clone()));
                let end = pump(conn, &mut outbound, &mut replay, &tx, &label).await;
                let _ = tx.send(Incoming::disconnected(label.clone()));
                match end {
                    Ok(SessionEnd::Teardown) => {
                        tracing::info!(endpoint = %label, "streaming channel closed by client");
                        return;
                    }
                    Ok(SessionEnd::Closed) => {
                        tracing::info!(endpoint = %label, "streaming channel closed by server");
                    }
                    Err(e) => {
                        let err = format!("{e:#}");
                        tracing::warn!(endpoint = %label, error = %err, "streaming channel failed");
                        let _ = tx.send(Incoming::error(label.clone(), err));
                    }
                }
            }
            Err(e) => {
                let err = format!("{e:#}");
                tracing::warn!(endpoint = %label, error = %err, "connect failed");
                let _ = tx.send(Incoming::error(label.clone(), err));
            }
        }

        failures += 1;
        if failures > policy.max_attempts {
            tracing::warn!(endpoint = %label, failures, "giving up on streaming channel");
            let _ = tx.send(Incoming::gave_up(label));
            return;
        }
        let _ = tx.send(Incoming::reconnecting(label.clone(), failures));
        if !back_off(policy.backoff, &mut outbound, &mut replay).await {
            return;
        }
    }
}

/// Waits out the backoff while still accepting outbound messages, which are
/// replayed on the next connection. Returns false on teardown.
async fn back_off(
    backoff: Duration,
    outbound: &mut mpsc::UnboundedReceiver<ClientMsg>,
    replay: &mut Replay,
) -> bool {
    let sleep = tokio::time::sleep(backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            msg = outbound.recv() => match msg {
                Some(msg) => replay.record(&msg),
                None => return false,
            },
        }
    }
}

async fn pump(
    mut conn: Conn,
    outbound: &mut mpsc::UnboundedReceiver<ClientMsg>,
    replay: &mut Replay,
    tx: &Sender<Incoming>,
    label: &str,
) -> Result<SessionEnd> {
    for msg in replay.pending() {
        conn.send_text(msg.encode()?).await?;
    }

    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(msg) => {
                    replay.record(&msg);
                    conn.send_text(msg.encode()?).await?;
                }
                None => {
                    conn.close().await;
                    return Ok(SessionEnd::Teardown);
                }
            },
            frame = conn.next_text() => match frame {
                Some(Ok(text)) => match ServerMsg::decode(&text) {
                    Ok(msg) => {
                        replay.observe(&msg);
                        let _ = tx.send(Incoming::message(label.to_string(), msg));
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %label, error = %e, "undecodable message");
                        let _ = tx.send(Incoming::error(label.to_string(), format!("decode error: {e}")));
                    }
                },
                Some(Err(e)) => return Err(e),
                None => return Ok(SessionEnd::Closed),
            },
        }
    }
}

enum Conn {
    Uds(Framed<UnixStream, LengthDelimitedCodec>),
    Ws(Box<WebSocketStream<MaybeTlsStream<TcpStream>>>),
}

async fn connect(endpoint: &EndpointKind) -> Result<Conn> {
    match endpoint {
        EndpointKind::UdsPath(path) => {
            let stream = UnixStream::connect(path)
                .await
                .with_context(|| format!("connect UDS {path}"))?;
            Ok(Conn::Uds(Framed::new(stream, LengthDelimitedCodec::new())))
        }
        EndpointKind::WebSocket(url) => {
            let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .with_context(|| format!("connect websocket {url}"))?;
            Ok(Conn::Ws(Box::new(ws)))
        }
    }
}

impl Conn {
    async fn send_text(&mut self, text: String) -> Result<()> {
        match self {
            Conn::Uds(framed) => framed.send(Bytes::from(text)).await?,
            Conn::Ws(ws) => ws.send(Message::Text(text)).await?,
        }
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        match self {
            Conn::Uds(framed) => {
                let frame = framed.next().await?;
                Some(
                    frame
                        .map_err(anyhow::Error::from)
                        .and_then(|bytes| {
                            String::from_utf8(bytes.to_vec()).context("frame is not utf-8")
                        }),
                )
            }
            Conn::Ws(ws) => loop {
                let msg = match ws.next().await? {
                    Ok(msg) => msg,
                    Err(e) => return Some(Err(e.into())),
                };
                match msg {
                    Message::Text(text) => return Some(Ok(text)),
                    Message::Binary(bytes) => {
                        return Some(String::from_utf8(bytes).context("binary frame is not utf-8"))
                    }
                    Message::Close(_) => return None,
                    // ping/pong are answered by tungstenite
                    _ => continue,
                }
            },
        }
    }

    async fn close(&mut self) {
        match self {
            Conn::Uds(framed) => {
                let _ = SinkExt::<Bytes>::close(framed).await;
            }
            Conn::Ws(ws) => {
                // inherent close, not SinkExt::close
                let _ = ws.as_mut().close(None).await;
            }
        }
    }
}
