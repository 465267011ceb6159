/// Subscriber connections
///
/// The engine never touches sockets directly. A subscriber is anything that
/// implements `Connection`: it has a stable id and accepts frames without
/// blocking (or within a bounded wait). A failed write is reported back as a
/// `DeliveryError` and the hub treats the connection as dead.
///
/// `QueueConnection` is the standard implementation: a bounded
/// `tokio::sync::mpsc` queue drained by the socket task. A full queue fails
/// the write immediately, so one stalled client cannot stall a fan-out.
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use super::encoder::Frame;
use crate::errors::DeliveryError;

/// Connection ID (unique per process)
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection id
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A live subscriber that frames can be pushed to
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Hand a frame to the transport. Must not block unboundedly.
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError>;

    /// Ask the transport to shut down. Called once the hub gives up on it.
    fn close(&self) {}
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.id())
    }
}

// ============================================================================
// QUEUE CONNECTION
// ============================================================================

/// Connection backed by a bounded in-memory queue
pub struct QueueConnection {
    id: ConnectionId,
    sender: mpsc::Sender<Frame>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl QueueConnection {
    /// Create a connection with a fresh id and its receiving half
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        Self::with_id(next_connection_id(), capacity)
    }

    pub fn with_id(id: ConnectionId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id,
            sender,
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        });
        (connection, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Resolves once `close()` has been called
    pub async fn closed(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.close_signal.notified().await;
    }
}

impl Connection for QueueConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed);
        }

        match self.sender.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // notify_one stores a permit, so a task that starts waiting later still wakes
            self.close_signal.notify_one();
        }
    }
}
