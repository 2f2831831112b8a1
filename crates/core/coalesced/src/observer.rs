use std::sync::Arc;

use inflight_result::Error;

use crate::handle::Detach;
use crate::Response;

/// Event delivered to an observer
///
/// A successful call delivers `Next` (when it produced a payload) followed
/// by `Completed`. A failed call delivers a single `Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Next(Response),
    Error(Error),
    Completed,
}

/// Receives the events of a request
pub trait Observer: Send + 'static {
    fn on_event(&mut self, event: Event);
}

impl<F: FnMut(Event) + Send + 'static> Observer for F {
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}

/// Attachment of one observer to an in-flight request
///
/// Disposing the subscription, explicitly or by dropping it, detaches the
/// observer. Once the last observer of a call detaches before the call
/// finished, the call is cancelled.
#[must_use = "dropping a subscription detaches its observer"]
pub struct Subscription {
    attachment: Option<(Arc<dyn Detach>, u64)>,
}

impl Subscription {
    pub(crate) fn new(handle: Arc<dyn Detach>, id: u64) -> Self {
        Self {
            attachment: Some((handle, id)),
        }
    }

    /// Subscription with nothing attached, used once the outcome was already delivered
    pub(crate) fn empty() -> Self {
        Self { attachment: None }
    }

    /// Whether this subscription is still attached to a pending call
    pub fn is_attached(&self) -> bool {
        self.attachment
            .as_ref()
            .map(|(handle, id)| handle.is_attached(*id))
            .unwrap_or(false)
    }

    pub fn dispose(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some((handle, id)) = self.attachment.take() {
            handle.detach(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
