use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ClientInner;
use crate::error::ClientError;
use crate::request::Request;

/// A value produced by a subscription decoder. Type-erased so that one
/// registry can hold subscriptions with different result types.
pub(crate) type DecodedValue = Box<dyn Any + Send>;

pub(crate) type DecoderFn =
    Arc<dyn Fn(&[u8]) -> Result<DecodedValue, ClientError> + Send + Sync>;

/// The registry-owned side of one subscription.
///
/// Entries are owned strongly by the connection registry only; dropping the
/// entry closes the channel senders, which is what lets a handle observe
/// teardown after the single error slot has been consumed.
pub(crate) struct SubscriptionEntry {
    pub request: Request,
    /// Server-assigned subscription id, zero until the subscribe ack.
    pub sub_id: Arc<AtomicU64>,
    pub unsubscribe_method: String,
    pub decoder: DecoderFn,
    pub stream: mpsc::Sender<DecodedValue>,
    pub stream_capacity: usize,
    pub errors: mpsc::Sender<ClientError>,
}

/// Caller-facing side of one subscription: a bounded result stream and a
/// single-slot error channel.
///
/// Holds no strong reference into the connection, so an abandoned handle
/// never keeps a dead subscription alive.
pub struct Subscription<T> {
    pub(crate) request_id: u64,
    pub(crate) sub_id: Arc<AtomicU64>,
    pub(crate) stream: mpsc::Receiver<DecodedValue>,
    pub(crate) errors: mpsc::Receiver<ClientError>,
    pub(crate) client: Weak<ClientInner>,
    pub(crate) _result: PhantomData<T>,
}

impl<T: Send + 'static> Subscription<T> {
    /// The server-assigned subscription id, or `None` before the subscribe
    /// ack has been dispatched.
    pub fn subscription_id(&self) -> Option<u64> {
        match self.sub_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Waits for the next notification.
    ///
    /// Returns the subscription's terminal error once it has been torn down
    /// (already-buffered notifications are drained first), and
    /// [`ClientError::SubscriptionClosed`] on every call after that.
    pub async fn recv(&mut self) -> Result<T, ClientError> {
        tokio::select! {
            biased;
            Some(value) = self.stream.recv() => Ok(Self::downcast(value)),
            Some(error) = self.errors.recv() => Err(error),
            else => Err(ClientError::SubscriptionClosed),
        }
    }

    /// As [`recv`](Self::recv), returning early with
    /// [`ClientError::Cancelled`] when `cancel` fires.
    ///
    /// Cancelling a receive does not unsubscribe; the subscription keeps
    /// accumulating notifications and can be consumed later.
    pub async fn recv_with_cancellation(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            Some(value) = self.stream.recv() => Ok(Self::downcast(value)),
            Some(error) = self.errors.recv() => Err(error),
            else => Err(ClientError::SubscriptionClosed),
        }
    }

    /// Ends the subscription: removes it from the connection registry and
    /// sends the network-level unsubscribe call.
    pub async fn unsubscribe(self) {
        if let Some(client) = self.client.upgrade() {
            client
                .close_subscription(self.request_id, ClientError::Unsubscribed)
                .await;
        }
    }

    fn downcast(value: DecodedValue) -> T {
        *value
            .downcast::<T>()
            .expect("decoder output type matches the subscription result type")
    }
}
