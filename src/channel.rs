//! Message channel between the page engine and its collaborator.
//!
//! Sending never blocks and never fails from the caller's view: the returned
//! [`PendingReply`] resolves to the collaborator's answer, or to the empty
//! result if the channel is closed, the reply is dropped or the wrong kind
//! of reply comes back.

use crate::backend::MoodBackend;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// A request in flight, with the slot its reply goes into
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    reply: oneshot::Sender<Response>,
}

impl Envelope {
    /// Deliver the reply. A receiver that has gone away is not an error.
    pub fn respond(self, response: Response) {
        if self.reply.send(response).is_err() {
            trace!("Reply for {} had no receiver", self.request.kind());
        }
    }
}

/// Page-side end of the channel
#[derive(Debug, Clone)]
pub struct MessageChannel {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MessageChannel {
    /// A channel and the receiving end a collaborator serves
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A channel answered by `backend` on a background task
    pub fn spawn(backend: Arc<dyn MoodBackend>) -> (Self, JoinHandle<()>) {
        let (channel, rx) = Self::new();
        let handle = tokio::spawn(serve(rx, backend));
        (channel, handle)
    }

    /// Send a request and get a future for its reply
    pub fn send(&self, request: Request) -> PendingReply {
        let (reply_tx, reply_rx) = oneshot::channel();
        let empty = request.empty_response();
        let kind = request.kind();

        if self
            .tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            // The dropped envelope closes `reply_rx`, so the reply resolves empty
            debug!("Channel closed, {} will resolve empty", kind);
        }

        PendingReply {
            rx: reply_rx,
            empty: Some(empty),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reply to one request. Always resolves to a [`Response`].
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Response>,
    empty: Option<Response>,
}

fn same_kind(a: &Response, b: &Response) -> bool {
    matches!(
        (a, b),
        (Response::Classification(_), Response::Classification(_))
            | (Response::Summary(_), Response::Summary(_))
    )
}

impl Future for PendingReply {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let received = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(received) => received.ok(),
        };

        let empty = match self.empty.take() {
            Some(empty) => empty,
            None => return Poll::Pending,
        };
        Poll::Ready(match received {
            Some(response) if same_kind(&response, &empty) => response,
            Some(_) => {
                debug!("Mismatched reply kind, treating as no result");
                empty
            }
            None => empty,
        })
    }
}

/// Answer requests until every sender is gone. Each request runs on its own
/// task, so replies complete in whatever order the backend finishes them.
pub async fn serve(mut rx: mpsc::UnboundedReceiver<Envelope>, backend: Arc<dyn MoodBackend>) {
    info!("Mood backend serving");
    while let Some(envelope) = rx.recv().await {
        let backend = Arc::clone(&backend);
        tokio::spawn(async move {
            trace!("Handling {}", envelope.request.kind());
            let response = backend.handle(&envelope.request).await;
            envelope.respond(response);
        });
    }
    info!("Mood backend stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::settings::MoodMethod;
    use crate::types::{ClassificationResponse, SummaryResponse};

    #[tokio::test]
    async fn test_round_trip_through_backend() {
        let (channel, _handle) = MessageChannel::spawn(Arc::new(LocalBackend::rules_only()));
        let reply = channel
            .send(Request::classify("tears and heartbreak", MoodMethod::Rules))
            .await;
        assert_eq!(
            reply.into_classification().emotion.as_deref(),
            Some("sadness")
        );
    }

    #[tokio::test]
    async fn test_closed_channel_resolves_empty() {
        let (channel, rx) = MessageChannel::new();
        drop(rx);
        assert!(channel.is_closed());

        let reply = channel.send(Request::summarise("text")).await;
        assert_eq!(reply, Response::Summary(SummaryResponse::empty()));
    }

    #[tokio::test]
    async fn test_dropped_envelope_resolves_empty() {
        let (channel, mut rx) = MessageChannel::new();
        let pending = channel.send(Request::classify("sad", MoodMethod::Rules));
        drop(rx.recv().await.unwrap());

        assert_eq!(
            pending.await,
            Response::Classification(ClassificationResponse::empty())
        );
    }

    #[tokio::test]
    async fn test_mismatched_kind_resolves_empty() {
        let (channel, mut rx) = MessageChannel::new();
        let pending = channel.send(Request::classify("sad", MoodMethod::Rules));
        rx.recv()
            .await
            .unwrap()
            .respond(Response::Summary(SummaryResponse::text("wrong")));

        assert_eq!(
            pending.await,
            Response::Classification(ClassificationResponse::empty())
        );
    }

    #[tokio::test]
    async fn test_replies_complete_out_of_order() {
        let (channel, mut rx) = MessageChannel::new();
        let first = channel.send(Request::classify("a", MoodMethod::Rules));
        let second = channel.send(Request::classify("b", MoodMethod::Rules));

        let env_a = rx.recv().await.unwrap();
        let env_b = rx.recv().await.unwrap();
        env_b.respond(Response::Classification(ClassificationResponse::label("fear", 0.9)));
        assert_eq!(
            second.await.into_classification().emotion.as_deref(),
            Some("fear")
        );

        env_a.respond(Response::Classification(ClassificationResponse::empty()));
        assert_eq!(first.await.into_classification().emotion, None);
    }
}
