use crate::{ApiClient, ApiError, ControllerEvent};
use futures_util::StreamExt;
use hsa_core::{decode_message, ChannelState};
use std::time::Duration;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct ActiveChannel {
    search_id: String,
    session: u64,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ActiveChannel {
    fn request_close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Owns the update stream for the active search. At most one channel exists
/// at a time; activating another search tears the current one down first.
pub struct StreamSynchronizer {
    api: ApiClient,
    events: mpsc::Sender<ControllerEvent>,
    active: Option<ActiveChannel>,
}

impl StreamSynchronizer {
    pub fn new(api: ApiClient, events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            api,
            events,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| !active.task.is_finished())
            .unwrap_or(false)
    }

    /// Closes the current channel (waiting for it to finish) and opens one
    /// for `search_id`. Every event of the new channel is tagged with `session`.
    pub async fn activate(
        &mut self,
        search_id: impl Into<String>,
        session: u64,
    ) -> Result<(), ApiError> {
        let search_id = search_id.into();
        self.shutdown().await;
        let url = self.api.update_stream_url(&search_id)?;
        info!(event = "stream_activate", search_id = %search_id, session, url = %url);
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_channel(
            url,
            search_id.clone(),
            session,
            self.events.clone(),
            close_rx,
        ));
        self.active = Some(ActiveChannel {
            search_id,
            session,
            close_tx: Some(close_tx),
            task,
        });
        Ok(())
    }

    /// Signals the channel task to close without waiting for it.
    pub fn request_close(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.request_close();
        }
    }

    /// Signals closure and waits for the channel task to release the socket.
    pub async fn shutdown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.request_close();
        if tokio::time::timeout(TEARDOWN_TIMEOUT, &mut active.task)
            .await
            .is_err()
        {
            warn!(
                event = "stream_teardown_timeout",
                search_id = %active.search_id,
                session = active.session
            );
            active.task.abort();
        }
    }
}

impl Drop for StreamSynchronizer {
    fn drop(&mut self) {
        self.request_close();
    }
}

struct CloseSignal(Option<oneshot::Receiver<()>>);

impl CloseSignal {
    /// Resolves once closure was requested or the synchronizer went away.
    async fn requested(&mut self) {
        if let Some(rx) = self.0.as_mut() {
            let _ = rx.await;
            self.0 = None;
        }
    }
}

async fn run_channel(
    url: Url,
    search_id: String,
    session: u64,
    events: mpsc::Sender<ControllerEvent>,
    close_rx: oneshot::Receiver<()>,
) {
    let mut close = CloseSignal(Some(close_rx));
    let state_event = |state: ChannelState| ControllerEvent::Channel {
        search_id: search_id.clone(),
        session,
        state,
    };

    if !send_event(&events, state_event(ChannelState::Connecting), &mut close).await {
        finish(&events, state_event(ChannelState::Closed));
        return;
    }

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = close.requested() => {
            debug!(event = "stream_closed_before_open", search_id = %search_id);
            finish(&events, state_event(ChannelState::Closed));
            return;
        }
    };
    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(err) => {
            warn!(event = "stream_connect_error", search_id = %search_id, error = %err);
            finish(&events, state_event(ChannelState::Error));
            return;
        }
    };
    info!(event = "stream_open", search_id = %search_id);
    if !send_event(&events, state_event(ChannelState::Open), &mut close).await {
        close_gracefully(&mut ws).await;
        finish(&events, state_event(ChannelState::Closed));
        return;
    }

    let final_state = loop {
        let frame = tokio::select! {
            frame = ws.next() => frame,
            _ = close.requested() => {
                close_gracefully(&mut ws).await;
                break ChannelState::Closed;
            }
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => {
                    warn!(event = "stream_decode_error", search_id = %search_id, error = %err);
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                info!(event = "stream_remote_close", search_id = %search_id, frame = ?frame);
                break ChannelState::Closed;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(event = "stream_read_error", search_id = %search_id, error = %err);
                break ChannelState::Error;
            }
            None => break ChannelState::Closed,
        };
        match decode_message(&text) {
            Ok(message) => {
                debug!(event = "stream_message", search_id = %search_id, kind = %message.kind());
                let event = ControllerEvent::Message {
                    search_id: search_id.clone(),
                    session,
                    message,
                };
                if !send_event(&events, event, &mut close).await {
                    close_gracefully(&mut ws).await;
                    break ChannelState::Closed;
                }
            }
            Err(err) => {
                warn!(event = "stream_decode_error", search_id = %search_id, error = %err);
            }
        }
    };
    info!(event = "stream_closed", search_id = %search_id, state = final_state.as_str());
    finish(&events, state_event(final_state));
}

/// Returns `false` when closure was requested or nobody is listening anymore.
async fn send_event(
    events: &mpsc::Sender<ControllerEvent>,
    event: ControllerEvent,
    close: &mut CloseSignal,
) -> bool {
    tokio::select! {
        sent = events.send(event) => sent.is_ok(),
        _ = close.requested() => false,
    }
}

fn finish(events: &mpsc::Sender<ControllerEvent>, event: ControllerEvent) {
    if events.try_send(event).is_err() {
        debug!(event = "stream_final_state_dropped");
    }
}

async fn close_gracefully(ws: &mut WsStream) {
    if let Err(err) = ws.close(None).await {
        debug!(event = "stream_close_error", error = %err);
        return;
    }
    let drain = async {
        while let Some(Ok(_)) = ws.next().await {}
    };
    let _ = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await;
}
