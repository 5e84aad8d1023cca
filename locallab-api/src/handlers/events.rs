use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use locallab_core::ExperimentId;
use locallab_workflow::{ProgressEvent, Subscription};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::AppState;

/// Upgrade to a WebSocket that streams the experiment's progress events as
/// JSON text frames until a final event or until the client goes away.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    let experiment_id = ExperimentId::from(id);
    // Subscribe before the handshake completes so nothing published in
    // between is lost. Dropping the subscription prunes the topic, also when
    // the upgrade never happens.
    let events = state.executor.watch(experiment_id);

    ws.on_upgrade(move |socket| serve_socket(socket, experiment_id, events))
}

async fn serve_socket(
    socket: WebSocket,
    experiment_id: ExperimentId,
    events: Subscription,
) {
    tracing::debug!(%experiment_id, "Progress stream opened");
    let (mut sink, incoming) = socket.split();

    forward_events(&mut sink, incoming, events).await;

    let _ = sink.send(Message::Close(None)).await;
    tracing::debug!(%experiment_id, "Progress stream closed");
}

/// Pump events into `sink`. Returns after a final event, when the topic is
/// gone, or when `incoming` reports the peer closing.
pub(crate) async fn forward_events<S, I, E>(
    sink: &mut S,
    mut incoming: I,
    mut events: Subscription,
) where
    S: Sink<Message> + Unpin,
    I: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let last = event.is_final();
                    let Some(frame) = encode(&event) else { continue };
                    if sink.send(frame).await.is_err() || last {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Progress subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

fn encode(event: &ProgressEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(kind = event.kind(), "Failed to encode progress event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use locallab_workflow::{EventPayload, ExecutionProgress, ProgressPublisher};
    use std::convert::Infallible;
    use std::sync::Arc;

    fn text(message: Message) -> serde_json::Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forwards_until_final_event() {
        let publisher = Arc::new(ProgressPublisher::default());
        let id = ExperimentId::new();
        let events = publisher.watch(id);

        publisher.publish(ProgressEvent::new(
            id,
            EventPayload::Progress(ExecutionProgress::new(1, 2)),
        ));
        publisher.publish(ProgressEvent::new(
            id,
            EventPayload::ExperimentPaused {
                completed_runs: 1,
                remaining_runs: 1,
                total_runs: 2,
            },
        ));
        publisher.publish(ProgressEvent::new(
            id,
            EventPayload::Error {
                message: "after the end".into(),
            },
        ));

        let (mut tx, mut rx) = mpsc::unbounded();
        let incoming = futures::stream::pending::<Result<Message, Infallible>>();
        forward_events(&mut tx, incoming, events).await;
        drop(tx);

        let first = text(rx.next().await.unwrap());
        assert_eq!(first["type"], "PROGRESS");
        assert_eq!(first["payload"]["completed"], 1);

        let second = text(rx.next().await.unwrap());
        assert_eq!(second["type"], "EXPERIMENT_PAUSED");

        assert!(rx.next().await.is_none());
        assert_eq!(publisher.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_stops_when_peer_closes() {
        let publisher = Arc::new(ProgressPublisher::default());
        let events = publisher.watch(ExperimentId::new());

        let (mut tx, mut rx) = mpsc::unbounded();
        let incoming = futures::stream::iter(vec![Ok::<_, Infallible>(Message::Close(None))]);
        forward_events(&mut tx, incoming, events).await;
        drop(tx);

        assert!(rx.next().await.is_none());
        assert_eq!(publisher.topic_count(), 0);
    }
}
