use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::{game_service::couple_of, profile_service::authenticated, sse_events},
    state::SharedState,
};

/// Open subscription to the events of one relationship.
pub struct CoupleSubscription {
    /// Relationship the stream follows.
    pub couple_id: Uuid,
    receiver: broadcast::Receiver<ServerEvent>,
}

/// Subscribe the requester to the events of their relationship.
pub async fn subscribe_couple(
    state: &SharedState,
    requester: Option<&str>,
) -> Result<CoupleSubscription, ServiceError> {
    let requester = authenticated(requester)?;
    let couple_id = couple_of(state, requester).await?;
    let receiver = state.couple_hubs().subscribe(couple_id);
    Ok(CoupleSubscription {
        couple_id,
        receiver,
    })
}

/// Turn a subscription into an SSE response.
///
/// The first event is a handshake describing the stream. A background task forwards the hub's
/// events until the client goes away, then drops the hub if it was the last listener.
pub fn to_sse_stream(
    state: SharedState,
    subscription: CoupleSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let CoupleSubscription {
        couple_id,
        mut receiver,
    } = subscription;
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let handshake = Handshake {
            couple_id,
            degraded: state.is_degraded().await,
        };
        match ServerEvent::json(Some(sse_events::EVENT_HANDSHAKE.to_string()), &handshake) {
            Ok(event) => {
                if tx.send(Ok(to_event(event))).await.is_err() {
                    release(&state, couple_id, receiver);
                    return;
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize SSE handshake"),
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                couple_id = %couple_id,
                                skipped,
                                "SSE subscriber lagging; events skipped"
                            );
                        }
                    }
                }
            }
        }

        release(&state, couple_id, receiver);
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

fn release(state: &SharedState, couple_id: Uuid, receiver: broadcast::Receiver<ServerEvent>) {
    drop(receiver);
    state.couple_hubs().release(couple_id);
    info!(couple_id = %couple_id, "couple SSE stream disconnected");
}
