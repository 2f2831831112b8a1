use crate::Completion;

/// Handle used to abort an underlying network call
pub trait Cancellable: Send {
    fn cancel(&self);
}

impl Cancellable for tokio::task::JoinHandle<()> {
    fn cancel(&self) {
        self.abort();
    }
}

/// Cancellable that does nothing, for calls that finished synchronously
impl Cancellable for () {
    fn cancel(&self) {}
}

struct CancelFn<F>(F);

impl<F: Fn() + Send> Cancellable for CancelFn<F> {
    fn cancel(&self) {
        (self.0)()
    }
}

/// Wrap a closure as a [`Cancellable`]
pub fn cancel_fn<F: Fn() + Send + 'static>(f: F) -> Box<dyn Cancellable> {
    Box::new(CancelFn(f))
}

/// Performs exactly one network call per invocation
///
/// The issuer must eventually fire `completion` exactly once, unless the
/// returned handle is cancelled first, in which case it may never fire.
/// The completion may be fired from any thread, including synchronously
/// from within `issue`.
pub trait RequestIssuer<T>: Send + Sync + 'static {
    fn issue(&self, token: &T, completion: Completion) -> Box<dyn Cancellable>;
}
