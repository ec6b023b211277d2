/**
 * TRANSPORT - Connexion WebSocket unique vers le plan de contrôle
 *
 * RÔLE : Reçoit les frames (tableaux JSON d'enveloppes) et les applique aux
 * stores via le codec ; envoie les lots de commandes sortantes.
 *
 * FONCTIONNEMENT :
 * - une seule tâche écrit dans les stores, frame par frame, jusqu'au bout
 * - reconnexion automatique après un délai fixe, le serveur renvoie `init`
 * - les commandes émises hors connexion restent en file jusqu'à la suivante
 * - un lot dont l'envoi échoue est renvoyé en premier à la reconnexion
 */

use crate::health::ConnectionTracker;
use crate::protocol::{self, Envelope, RunPlan};
use crate::state::{FleetState, Shared};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport task has stopped")]
    Closed,
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Handle clonable vers la file des commandes sortantes. Les envois sont
/// fire-and-forget : leur effet s'observe plus tard via `notify`.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Vec<Envelope>>,
}

impl CommandSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<Envelope>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn run_plan(&self, plan: RunPlan) -> Result<(), TransportError> {
        info!("[transport] queue run_plan '{}'", plan.name);
        self.send(vec![Envelope::run_plan(plan)])
    }

    pub fn abort_run(&self, id: &str) -> Result<(), TransportError> {
        info!("[transport] queue abort_run {id}");
        self.send(vec![Envelope::abort_run(id)])
    }

    pub fn remove_report(&self, id: &str) -> Result<(), TransportError> {
        info!("[transport] queue remove_report {id}");
        self.send(vec![Envelope::remove_report(id)])
    }

    fn send(&self, batch: Vec<Envelope>) -> Result<(), TransportError> {
        self.tx.send(batch).map_err(|_| TransportError::Closed)
    }
}

/// Applique une frame texte. Une frame invalide est abandonnée et comptée,
/// l'état reste celui d'avant la frame.
///
/// Les listeners des stores sont appelés sous le verrou : ils ne doivent pas
/// reverrouiller `state`.
pub fn handle_frame(state: &Shared<FleetState>, tracker: &ConnectionTracker, text: &str) {
    let result = {
        let mut st = state.lock();
        protocol::apply_frame(&mut st, text)
    };
    match result {
        Ok(report) => {
            debug!(
                "[transport] frame applied: {} envelopes, {} skipped",
                report.applied, report.skipped
            );
            tracker.record_frame(&report);
        }
        Err(e) => {
            warn!("[transport] dropping frame: {e}");
            tracker.record_dropped_frame();
        }
    }
}

/// Démarre la tâche transport. Retourne le handle de commandes et la tâche.
pub fn spawn_transport(
    endpoint: Url,
    state: Shared<FleetState>,
    tracker: ConnectionTracker,
    reconnect_delay: Duration,
) -> (CommandSender, JoinHandle<()>) {
    let (commands, mut outbound) = CommandSender::channel();
    tracker.set_endpoint(endpoint.as_str());

    let handle = task::spawn(async move {
        let mut queue_open = true;
        let mut pending: Option<Vec<Envelope>> = None;
        loop {
            match connect_async(endpoint.as_str()).await {
                Ok((ws, _)) => {
                    info!("[transport] connected to {endpoint}");
                    tracker.mark_connected();
                    match run_connection(ws, &state, &tracker, &mut outbound, &mut queue_open, &mut pending).await {
                        Ok(()) => info!("[transport] connection closed by peer"),
                        Err(e) => warn!("[transport] connection lost: {e}"),
                    }
                    tracker.mark_disconnected();
                }
                Err(e) => {
                    warn!("[transport] connect to {endpoint} failed: {e}");
                    tracker.mark_disconnected();
                }
            }
            tracker.increment_reconnects();
            tokio::time::sleep(reconnect_delay).await;
        }
    });

    (commands, handle)
}

/// Pilote une connexion jusqu'à sa fermeture
async fn run_connection<S>(
    ws: WebSocketStream<S>,
    state: &Shared<FleetState>,
    tracker: &ConnectionTracker,
    outbound: &mut mpsc::UnboundedReceiver<Vec<Envelope>>,
    queue_open: &mut bool,
    pending: &mut Option<Vec<Envelope>>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut source) = ws.split();

    if let Some(batch) = pending.take() {
        debug!("[transport] resending {} pending envelopes", batch.len());
        send_batch(&mut sink, batch, pending).await?;
    }

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(state, tracker, text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_frame(state, tracker, text),
                    Err(_) => {
                        warn!("[transport] dropping non UTF-8 binary frame ({} bytes)", bytes.len());
                        tracker.record_dropped_frame();
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {} // ping / pong gérés par tungstenite
                Some(Err(e)) => return Err(e.into()),
            },
            batch = outbound.recv(), if *queue_open => match batch {
                Some(batch) => send_batch(&mut sink, batch, pending).await?,
                None => {
                    debug!("[transport] command queue closed");
                    *queue_open = false;
                }
            },
        }
    }
}

/// Envoie un lot. En cas d'échec le lot est conservé dans `pending`.
async fn send_batch<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    batch: Vec<Envelope>,
    pending: &mut Option<Vec<Envelope>>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = match protocol::encode_batch(&batch) {
        Ok(text) => text,
        Err(e) => {
            warn!("[transport] failed to encode batch: {e}");
            return Ok(());
        }
    };
    if let Err(e) = sink.send(Message::Text(text.into())).await {
        *pending = Some(batch);
        return Err(e.into());
    }
    Ok(())
}
