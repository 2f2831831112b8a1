use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;
use inflight_result::{create_error, Result};

use crate::handle::{ActivityListener, Attach, SharedHandle, Starter};
use crate::registry::Registry;
use crate::{
    CoalescionServiceConfig, Completion, DefaultEndpointResolver, EndpointResolver, Event,
    NetworkActivity, Observer, RequestIssuer, Response, Subscription, Target,
};

type HandleRegistry<K> = Registry<K, SharedHandle<K>>;

struct Inner<T, R: EndpointResolver<T>, I> {
    config: CoalescionServiceConfig,
    resolver: R,
    issuer: Arc<I>,
    registry: Arc<HandleRegistry<R::Key>>,
    activity: Option<ActivityListener<R::Key>>,
    _token: PhantomData<fn(T)>,
}

/// Coalesces requests so each endpoint has at most one call in flight
///
/// Every observer of an endpoint whose call is in flight shares that call
/// and receives its outcome. Cloning the service shares the registry.
pub struct CoalescionService<T, R: EndpointResolver<T>, I> {
    inner: Arc<Inner<T, R, I>>,
}

impl<T, R: EndpointResolver<T>, I> Clone for CoalescionService<T, R, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, R, I> CoalescionService<T, R, I>
where
    T: Send + Sync + 'static,
    R: EndpointResolver<T>,
    I: RequestIssuer<T>,
{
    pub fn new(resolver: R, issuer: I) -> Self {
        Self::builder(resolver, issuer).build()
    }

    pub fn from_config(config: CoalescionServiceConfig, resolver: R, issuer: I) -> Self {
        Self::builder(resolver, issuer).config(config).build()
    }

    pub fn builder(resolver: R, issuer: I) -> CoalescionServiceBuilder<T, R, I> {
        CoalescionServiceBuilder {
            config: CoalescionServiceConfig::default(),
            resolver,
            issuer,
            activity: None,
            _token: PhantomData,
        }
    }

    /// Describe a request for `token`
    ///
    /// The endpoint is resolved immediately and resolution errors are
    /// returned here. Nothing else happens until the returned request
    /// is subscribed to or awaited.
    pub fn request(&self, token: T) -> Result<Deferred<T, R, I>> {
        let key = self.inner.resolver.resolve(&token).map_err(|error| {
            debug!("Failed to resolve endpoint: {error}");
            error
        })?;

        Ok(Deferred {
            inner: Arc::downgrade(&self.inner),
            key,
            token: Arc::new(token),
        })
    }

    /// Number of endpoints with a call in flight
    pub fn in_flight_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_in_flight(&self, key: &R::Key) -> bool {
        self.inner.registry.lookup(key).is_some()
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Arc<HandleRegistry<R::Key>> {
        &self.inner.registry
    }
}

impl<T, I> CoalescionService<T, DefaultEndpointResolver, I>
where
    T: Target,
    I: RequestIssuer<T>,
{
    /// Service resolving [`Target`]s with the [`DefaultEndpointResolver`]
    pub fn with_issuer(issuer: I) -> Self {
        Self::new(DefaultEndpointResolver, issuer)
    }
}

pub struct CoalescionServiceBuilder<T, R: EndpointResolver<T>, I> {
    config: CoalescionServiceConfig,
    resolver: R,
    issuer: I,
    activity: Option<ActivityListener<R::Key>>,
    _token: PhantomData<fn(T)>,
}

impl<T, R, I> CoalescionServiceBuilder<T, R, I>
where
    T: Send + Sync + 'static,
    R: EndpointResolver<T>,
    I: RequestIssuer<T>,
{
    pub fn config(mut self, config: CoalescionServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Be told whenever an underlying call begins or ends
    pub fn network_activity<F>(mut self, listener: F) -> Self
    where
        F: Fn(NetworkActivity, &R::Key) + Send + Sync + 'static,
    {
        self.activity = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> CoalescionService<T, R, I> {
        CoalescionService {
            inner: Arc::new(Inner {
                config: self.config,
                resolver: self.resolver,
                issuer: Arc::new(self.issuer),
                registry: Arc::new(Registry::new()),
                activity: self.activity,
                _token: PhantomData,
            }),
        }
    }
}

/// A request that has not been subscribed to yet
///
/// Each subscription attaches to the call in flight for the endpoint, or
/// starts a new one if there is none. The request only holds a weak
/// reference to its service.
pub struct Deferred<T, R: EndpointResolver<T>, I> {
    inner: Weak<Inner<T, R, I>>,
    key: R::Key,
    token: Arc<T>,
}

impl<T, R: EndpointResolver<T>, I> Clone for Deferred<T, R, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            key: self.key.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T, R, I> Deferred<T, R, I>
where
    T: Send + Sync + 'static,
    R: EndpointResolver<T>,
    I: RequestIssuer<T>,
{
    pub fn key(&self) -> &R::Key {
        &self.key
    }

    pub fn subscribe<O: Observer>(&self, observer: O) -> Subscription {
        self.attach(Box::new(observer))
    }

    fn attach(&self, mut observer: Box<dyn Observer>) -> Subscription {
        let Some(inner) = self.inner.upgrade() else {
            observer.on_event(Event::Error(create_error!(ProviderUnavailable)));
            return Subscription::empty();
        };

        loop {
            let handle = match inner.registry.lookup(&self.key) {
                Some(handle) => handle,
                None => {
                    if let Some(max) = inner.config.max_in_flight {
                        if inner.registry.len() >= max {
                            warn!("Refusing {:?}, {max} requests already in flight", self.key);
                            observer.on_event(Event::Error(create_error!(MaxInFlight { max })));
                            return Subscription::empty();
                        }
                    }

                    let proposed = Arc::new(SharedHandle::new(
                        self.key.clone(),
                        Arc::downgrade(&inner.registry),
                        self.starter(&inner),
                        inner.activity.clone(),
                    ));

                    // Losing the race drops `proposed` before anything attached to it
                    inner.registry.insert_if_absent(self.key.clone(), &proposed)
                }
            };

            match handle.attach(observer) {
                Attach::Live(id) => return Subscription::new(handle, id),
                Attach::Replayed => return Subscription::empty(),
                Attach::Rejected(rejected) => {
                    // Cancelled between lookup and attach, start over with a fresh call
                    inner.registry.remove_handle(&self.key, &handle);
                    observer = rejected;
                }
            }
        }
    }

    fn starter(&self, inner: &Inner<T, R, I>) -> Starter {
        let issuer = inner.issuer.clone();
        let token = self.token.clone();
        Box::new(move |completion: Completion| issuer.issue(&token, completion))
    }
}

impl<T, R, I> IntoFuture for Deferred<T, R, I>
where
    T: Send + Sync + 'static,
    R: EndpointResolver<T>,
    I: RequestIssuer<T>,
{
    type Output = Result<Option<Response>>;
    type IntoFuture = ResponseFuture<T, R, I>;

    fn into_future(self) -> Self::IntoFuture {
        ResponseFuture {
            deferred: Some(self),
            receiver: None,
            subscription: None,
        }
    }
}

/// Future resolving to the outcome of a [`Deferred`] request
///
/// Subscribes on first poll. Dropping the future before it resolves
/// disposes of its subscription.
pub struct ResponseFuture<T, R: EndpointResolver<T>, I> {
    deferred: Option<Deferred<T, R, I>>,
    receiver: Option<oneshot::Receiver<Result<Option<Response>>>>,
    subscription: Option<Subscription>,
}

impl<T, R: EndpointResolver<T>, I> Unpin for ResponseFuture<T, R, I> {}

impl<T, R, I> Future for ResponseFuture<T, R, I>
where
    T: Send + Sync + 'static,
    R: EndpointResolver<T>,
    I: RequestIssuer<T>,
{
    type Output = Result<Option<Response>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        if let Some(deferred) = this.deferred.take() {
            let (sender, receiver) = oneshot::channel();
            let mut sender = Some(sender);
            let mut next = None;

            this.receiver = Some(receiver);
            this.subscription = Some(deferred.subscribe(move |event: Event| match event {
                Event::Next(response) => next = Some(response),
                Event::Completed => {
                    if let Some(sender) = sender.take() {
                        sender.send(Ok(next.take())).ok();
                    }
                }
                Event::Error(error) => {
                    if let Some(sender) = sender.take() {
                        sender.send(Err(error)).ok();
                    }
                }
            }));
        }

        let Some(receiver) = this.receiver.as_mut() else {
            return Poll::Ready(Err(create_error!(InternalError)));
        };

        match receiver.poll_unpin(cx) {
            Poll::Ready(result) => {
                this.receiver = None;
                this.subscription = None;
                Poll::Ready(result.unwrap_or_else(|_| Err(create_error!(InternalError))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
