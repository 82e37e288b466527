/*!
 * Signal wiring for FleetLink.
 *
 * Devices and discovery backends push notifications through a [`Signal`].
 * Consumers attach to a signal with [`subscribe`], which returns an explicit
 * [`Subscription`] handle; the listener lives exactly as long as that handle.
 */
use std::fmt::{self, Debug};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Maximum number of notifications that can be buffered per receiver
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A broadcast emitter for notifications of type `T`.
#[derive(Debug, Clone)]
pub struct Signal<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Create a new signal
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new signal with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit a notification, returning the number of receivers it reached.
    ///
    /// Emitting with no receivers attached is not an error.
    pub fn emit(&self, value: T) -> usize {
        match self.sender.send(value) {
            Ok(n) => {
                trace!("Emitted signal to {} receivers", n);
                n
            }
            Err(_) => 0,
        }
    }

    /// Create a receiver that observes every notification emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of live receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle to a listener task attached to a signal.
///
/// Dropping the handle tears the listener down.
pub struct Subscription {
    name: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// The name given to the subscription when it was created
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the listener has stopped, either cancelled or because its signal closed
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Tear the listener down
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(subscription = %self.name, "Cancelling subscription");
        }
        self.handle.abort();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// Attach `handler` to `receiver` on a spawned listener task.
///
/// Notifications are handled one at a time in emission order. A lagging
/// listener logs the number of dropped notifications and keeps going; the
/// listener ends when every sender is gone.
///
/// Must be called from within a Tokio runtime.
pub fn subscribe<T, F>(
    name: impl Into<String>,
    mut receiver: broadcast::Receiver<T>,
    mut handler: F,
) -> Subscription
where
    T: Clone + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let name = name.into();
    let task_name = name.clone();
    let handle = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(value) => handler(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        subscription = %task_name,
                        skipped,
                        "Subscription lagged behind its signal"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(subscription = %task_name, "Signal closed");
                    break;
                }
            }
        }
    });

    Subscription { name, handle }
}
