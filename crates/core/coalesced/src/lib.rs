#[macro_use]
extern crate log;

mod config;
mod endpoint;
mod handle;
mod http;
mod issuer;
mod observer;
mod registry;
mod response;
mod service;


pub use config::CoalescionServiceConfig;
pub use endpoint::{DefaultEndpointResolver, Endpoint, EndpointResolver, Method, Target};
pub use handle::{Completion, NetworkActivity};
pub use http::HttpIssuer;
pub use issuer::{cancel_fn, Cancellable, RequestIssuer};
pub use observer::{Event, Observer, Subscription};
pub use registry::Registry;
pub use response::{Response, ResponseMeta};
pub use service::{CoalescionService, CoalescionServiceBuilder, Deferred, ResponseFuture};

pub use inflight_result::{Error, ErrorType, Result};
