//! Showdown websocket adapter
//!
//! Owns the duplex connection: one inbound task feeding frames to the bot,
//! one outbound loop draining the queue at the configured rate.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::application::bot::Bot;
use crate::application::errors::TransportError;
use crate::application::sync::CancellationToken;
use crate::infrastructure::config::Config;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long shutdown waits for the inbound task to unwind
const INBOUND_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Observe or stop a running [`Connection`] from another task
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
    token: CancellationToken,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `state`, or has closed.
    pub async fn wait_for(&mut self, state: ConnectionState) -> ConnectionState {
        match self
            .state
            .wait_for(|s| *s == state || *s == ConnectionState::Closed)
            .await
        {
            Ok(current) => *current,
            Err(_) => ConnectionState::Closed,
        }
    }

    /// Request a graceful shutdown and wait for it to finish.
    pub async fn shutdown(&self) {
        self.token.stop().await;
    }
}

pub struct Connection {
    bot: Arc<Bot>,
    outbound_rx: mpsc::Receiver<String>,
    url: String,
    origin: String,
    send_delay: Duration,
    state: watch::Sender<ConnectionState>,
    token: CancellationToken,
}

impl Connection {
    pub fn new(bot: Arc<Bot>, outbound_rx: mpsc::Receiver<String>, config: &Config) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            bot,
            outbound_rx,
            url: config.websocket_url(),
            origin: config.server.origin.clone(),
            send_delay: config.send_delay(),
            state,
            token: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            state: self.state.subscribe(),
            token: self.token.clone(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("Connection state: {:?}", state);
        self.state.send_replace(state);
    }

    /// Connect and run until `interrupt` resolves, a handle requests
    /// shutdown, the server closes the session, or the transport fails.
    /// Always shuts down gracefully before returning.
    pub async fn run<F>(mut self, interrupt: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        self.set_state(ConnectionState::Connecting);
        let ws = match self.connect().await {
            Ok(ws) => ws,
            Err(e) => {
                self.set_state(ConnectionState::Closed);
                self.token.confirm_stopped();
                return Err(e);
            }
        };
        self.set_state(ConnectionState::Connected);
        info!("Connected to {}", self.url);

        let (mut sink, stream) = ws.split();
        let inbound_token = CancellationToken::new();
        let mut inbound = tokio::spawn(inbound_loop(
            Arc::clone(&self.bot),
            stream,
            inbound_token.clone(),
        ));
        let mut inbound_done = false;

        let throttle = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(throttle);
        tokio::pin!(interrupt);

        let result = loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("Interrupted, closing connection");
                    break Ok(());
                }
                _ = self.token.stopping() => break Ok(()),
                joined = &mut inbound => {
                    inbound_done = true;
                    break joined.unwrap_or_else(|e| Err(TransportError::Io(e.to_string())));
                }
                _ = &mut throttle, if !throttle.is_elapsed() => {}
                msg = self.outbound_rx.recv(), if throttle.is_elapsed() => {
                    let Some(text) = msg else {
                        break Ok(());
                    };
                    debug!(">> {}", text);
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        break Err(TransportError::Io(e.to_string()));
                    }
                    throttle.as_mut().reset(Instant::now() + self.send_delay);
                }
            }
        };

        self.set_state(ConnectionState::Closing);
        let close = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        };
        if let Err(e) = sink.send(WsMessage::Close(Some(close))).await {
            debug!("Close frame not sent: {}", e);
        }

        if !inbound_done {
            inbound_token.signal_stop();
            match tokio::time::timeout(INBOUND_GRACE, &mut inbound).await {
                Ok(Ok(Err(e))) => debug!("Inbound loop ended with: {}", e),
                Ok(_) => {}
                Err(_) => {
                    warn!("Inbound loop did not stop in time");
                    inbound.abort();
                }
            }
        }

        self.bot.shutdown_plugins().await;
        self.set_state(ConnectionState::Closed);
        self.token.confirm_stopped();
        info!("Connection closed");

        if let Err(e) = &result {
            error!("Transport failure: {}", e);
        }
        result
    }

    async fn connect(&self) -> Result<WsStream, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            url: self.url.clone(),
            reason,
        };

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_error(e.to_string()))?;
        if !self.origin.is_empty() {
            let origin =
                HeaderValue::from_str(&self.origin).map_err(|e| connect_error(e.to_string()))?;
            request.headers_mut().insert("Origin", origin);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        Ok(ws)
    }
}

/// Read frames and hand them to the bot in arrival order.
async fn inbound_loop<S>(
    bot: Arc<Bot>,
    mut stream: S,
    token: CancellationToken,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let result = loop {
        let frame = tokio::select! {
            _ = token.stopping() => break Ok(()),
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                debug!("<< {}", text);
                bot.handle_frame(&text).await;
            }
            Some(Ok(WsMessage::Close(frame))) => break closed_by_server(frame),
            // Pings are answered by the websocket layer
            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
            Some(Ok(WsMessage::Binary(_))) => break Err(TransportError::UnexpectedFrame("binary")),
            Some(Ok(WsMessage::Frame(_))) => break Err(TransportError::UnexpectedFrame("raw")),
            Some(Err(e)) => break Err(TransportError::Io(e.to_string())),
            None => break Err(TransportError::Io("connection reset by server".to_string())),
        }
    };
    token.confirm_stopped();
    result
}

fn closed_by_server(frame: Option<CloseFrame<'_>>) -> Result<(), TransportError> {
    match frame {
        None => Ok(()),
        Some(frame) if frame.code == CloseCode::Normal => {
            info!("Server closed the session");
            Ok(())
        }
        Some(frame) => Err(TransportError::Io(format!(
            "server closed the session with {}: {}",
            u16::from(frame.code),
            frame.reason
        ))),
    }
}
