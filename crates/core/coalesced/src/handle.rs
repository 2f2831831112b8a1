use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use inflight_result::{create_error, Error};

use crate::registry::Registry;
use crate::{Cancellable, Event, Observer, Response, ResponseMeta};

/// Change in network activity for an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkActivity {
    /// An underlying call was issued
    Began,
    /// The underlying call finished or was cancelled
    Ended,
}

pub(crate) type ActivityListener<K> = Arc<dyn Fn(NetworkActivity, &K) + Send + Sync>;

/// Issues the underlying call, invoked by the first observer to attach
pub(crate) type Starter = Box<dyn FnOnce(Completion) -> Box<dyn Cancellable> + Send>;

/// Terminal result of a call
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    Success(Option<Response>),
    Failure(Error),
}

pub(crate) trait Settle: Send + Sync {
    fn settle(&self, outcome: Outcome);
}

pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
    fn is_attached(&self, id: u64) -> bool;
}

/// Callback handed to a [`crate::RequestIssuer`] for reporting the result of a call
///
/// Firing it after the call was cancelled, or after the coordinator went
/// away, does nothing. Dropping it without firing fails the call with
/// `Abandoned`.
pub struct Completion {
    handle: Option<Weak<dyn Settle>>,
}

impl Completion {
    pub(crate) fn new(handle: Weak<dyn Settle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Report the raw result of a call
    ///
    /// An error always wins. A payload requires a status code. No payload
    /// and no error completes the call without a response.
    pub fn complete(
        mut self,
        data: Option<Bytes>,
        status_code: Option<u16>,
        response: Option<ResponseMeta>,
        error: Option<Error>,
    ) {
        let outcome = match (error, data, status_code) {
            (Some(error), _, _) => Outcome::Failure(error),
            (None, Some(data), Some(status_code)) => Outcome::Success(Some(Response {
                status_code,
                data,
                response,
            })),
            (None, Some(_), None) => Outcome::Failure(create_error!(MissingStatusCode)),
            (None, None, _) => Outcome::Success(None),
        };

        self.settle(outcome);
    }

    pub fn succeed(mut self, response: Response) {
        self.settle(Outcome::Success(Some(response)));
    }

    pub fn fail(mut self, error: Error) {
        self.settle(Outcome::Failure(error));
    }

    fn settle(&mut self, outcome: Outcome) {
        if let Some(handle) = self.handle.take().and_then(|handle| handle.upgrade()) {
            handle.settle(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.settle(Outcome::Failure(create_error!(Abandoned)));
        }
    }
}

enum State {
    Pending {
        starter: Option<Starter>,
        cancel: Option<Box<dyn Cancellable>>,
        observers: HashMap<u64, Box<dyn Observer>>,
        next_id: u64,
    },
    Resolved(Outcome),
    Cancelled,
}

/// Result of attaching an observer to a handle
pub(crate) enum Attach {
    /// Attached to a pending call
    Live(u64),
    /// The stored outcome was delivered immediately
    Replayed,
    /// The call was cancelled, the observer is handed back untouched
    Rejected(Box<dyn Observer>),
}

enum Step {
    Attached(u64, Option<Starter>),
    Replay(Outcome, Box<dyn Observer>),
    Reject(Box<dyn Observer>),
}

/// Shared state of one underlying call
///
/// Moves from Pending to exactly one of Resolved or Cancelled. The first
/// observer to attach starts the call, the last one to detach before it
/// finishes cancels it. Leaving Pending removes the registry entry.
pub(crate) struct SharedHandle<K: Hash + Eq> {
    key: K,
    registry: Weak<Registry<K, SharedHandle<K>>>,
    activity: Option<ActivityListener<K>>,
    state: Mutex<State>,
}

impl<K: Hash + Eq + Clone + Debug + Send + Sync + 'static> SharedHandle<K> {
    pub fn new(
        key: K,
        registry: Weak<Registry<K, SharedHandle<K>>>,
        starter: Starter,
        activity: Option<ActivityListener<K>>,
    ) -> Self {
        Self {
            key,
            registry,
            activity,
            state: Mutex::new(State::Pending {
                starter: Some(starter),
                cancel: None,
                observers: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Observers run outside of the lock, a poisoned lock still holds consistent state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(self: &Arc<Self>, observer: Box<dyn Observer>) -> Attach {
        let step = {
            let mut state = self.state();
            match &mut *state {
                State::Pending {
                    starter,
                    observers,
                    next_id,
                    ..
                } => {
                    let id = *next_id;
                    *next_id += 1;
                    observers.insert(id, observer);
                    Step::Attached(id, starter.take())
                }
                State::Resolved(outcome) => Step::Replay(outcome.clone(), observer),
                State::Cancelled => Step::Reject(observer),
            }
        };

        match step {
            Step::Attached(id, Some(starter)) => {
                self.start(starter);
                Attach::Live(id)
            }
            Step::Attached(id, None) => {
                debug!("Joined in-flight request for {:?}", self.key);
                Attach::Live(id)
            }
            Step::Replay(outcome, mut observer) => {
                trace!("Replaying stored outcome for {:?}", self.key);
                deliver(observer.as_mut(), &outcome);
                Attach::Replayed
            }
            Step::Reject(observer) => Attach::Rejected(observer),
        }
    }

    fn start(self: &Arc<Self>, starter: Starter) {
        debug!("Starting request for {:?}", self.key);
        self.notify(NetworkActivity::Began);

        let settle: Weak<Self> = Arc::downgrade(self);
        let cancel = starter(Completion::new(settle));

        let late_cancel = {
            let mut state = self.state();
            match &mut *state {
                State::Pending { cancel: slot, .. } => {
                    *slot = Some(cancel);
                    None
                }
                // Every observer left while the call was being issued
                State::Cancelled => Some(cancel),
                // Completed synchronously
                State::Resolved(_) => None,
            }
        };

        if let Some(cancel) = late_cancel {
            debug!("Cancelling request for {:?}, no observers remain", self.key);
            cancel.cancel();
            self.notify(NetworkActivity::Ended);
        }
    }

    fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_handle(&self.key, self);
        }
    }

    fn notify(&self, activity: NetworkActivity) {
        if let Some(listener) = &self.activity {
            listener(activity, &self.key);
        }
    }
}

impl<K: Hash + Eq + Clone + Debug + Send + Sync + 'static> Settle for SharedHandle<K> {
    fn settle(&self, outcome: Outcome) {
        let observers = {
            let mut state = self.state();
            let State::Pending { observers, .. } = &mut *state else {
                trace!("Discarding late outcome for {:?}", self.key);
                return;
            };

            let observers = std::mem::take(observers);
            *state = State::Resolved(outcome.clone());
            observers
        };

        debug!(
            "Request for {:?} finished, notifying {} observer(s)",
            self.key,
            observers.len()
        );

        self.deregister();
        self.notify(NetworkActivity::Ended);

        for (_, mut observer) in observers {
            deliver(observer.as_mut(), &outcome);
        }
    }
}

impl<K: Hash + Eq + Clone + Debug + Send + Sync + 'static> Detach for SharedHandle<K> {
    fn detach(&self, id: u64) {
        let cancel = {
            let mut state = self.state();
            let State::Pending {
                observers, cancel, ..
            } = &mut *state
            else {
                return;
            };

            if observers.remove(&id).is_none() || !observers.is_empty() {
                return;
            }

            let cancel = cancel.take();
            *state = State::Cancelled;
            cancel
        };

        self.deregister();

        // Without a cancel handle the call is still being issued and
        // `start` cancels it once the issuer returns
        if let Some(cancel) = cancel {
            debug!("Cancelling request for {:?}, no observers remain", self.key);
            cancel.cancel();
            self.notify(NetworkActivity::Ended);
        }
    }

    fn is_attached(&self, id: u64) -> bool {
        matches!(&*self.state(), State::Pending { observers, .. } if observers.contains_key(&id))
    }
}

fn deliver(observer: &mut dyn Observer, outcome: &Outcome) {
    match outcome {
        Outcome::Success(Some(response)) => {
            observer.on_event(Event::Next(response.clone()));
            observer.on_event(Event::Completed);
        }
        Outcome::Success(None) => observer.on_event(Event::Completed),
        Outcome::Failure(error) => observer.on_event(Event::Error(error.clone())),
    }
}
