use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use inflight_result::{create_error, Result};

/// HTTP method of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Description of a request a caller wants made
pub trait Target: Send + Sync + 'static {
    /// Base URL, e.g. `https://api.example.com`
    fn base_url(&self) -> String;

    /// Path appended to the base URL
    fn path(&self) -> String;

    fn method(&self) -> Method {
        Method::Get
    }

    /// Query parameters that identify the request
    fn parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Headers that identify the request
    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Maps a request token onto the key requests are deduplicated by
///
/// Must be deterministic: two tokens describing the same request
/// must resolve to equal keys.
pub trait EndpointResolver<T>: Send + Sync + 'static {
    type Key: Hash + Eq + Clone + Debug + Send + Sync + 'static;

    fn resolve(&self, token: &T) -> Result<Self::Key>;
}

/// Canonical identity of a request
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub method: Method,
    pub url: String,
    pub parameters: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    /// Join a base URL and path, then validate the result
    pub fn new(method: Method, base_url: &str, path: &str) -> Result<Endpoint> {
        let url = if path.is_empty() {
            base_url.to_string()
        } else {
            format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };

        let parsed = reqwest::Url::parse(&url).map_err(|error| {
            create_error!(InvalidEndpoint {
                reason: format!("{url}: {error}")
            })
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(create_error!(InvalidEndpoint {
                reason: format!("{url}: unsupported scheme {}", parsed.scheme())
            }));
        }

        Ok(Endpoint {
            method,
            url: parsed.to_string(),
            parameters: BTreeMap::new(),
            headers: BTreeMap::new(),
        })
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Header names are case-insensitive so they are stored lowercased
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        self
    }
}

/// Resolves any [`Target`] into an [`Endpoint`]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEndpointResolver;

impl<T: Target> EndpointResolver<T> for DefaultEndpointResolver {
    type Key = Endpoint;

    fn resolve(&self, token: &T) -> Result<Endpoint> {
        Ok(Endpoint::new(token.method(), &token.base_url(), &token.path())?
            .with_parameters(token.parameters())
            .with_headers(token.headers()))
    }
}
