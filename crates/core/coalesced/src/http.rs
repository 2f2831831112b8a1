use std::time::Duration;

use inflight_result::{create_error, create_transport_error, Result};
use reqwest::Client;
use tokio::runtime::Handle;

use crate::{
    Cancellable, Completion, DefaultEndpointResolver, EndpointResolver, RequestIssuer,
    ResponseMeta, Target,
};

/// Issues requests for [`Target`]s over HTTP
///
/// Each call runs as a task on the given runtime and is cancelled by
/// aborting that task. Any HTTP status counts as a response, only
/// failing to talk to the server is an error.
pub struct HttpIssuer {
    client: Client,
    runtime: Handle,
}

impl HttpIssuer {
    /// Build a client from settings, running calls on the current runtime
    pub fn new(settings: &inflight_config::Http) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|error| create_transport_error!(error))?;

        let runtime = Handle::try_current().map_err(|error| {
            error!("HttpIssuer requires a Tokio runtime: {error}");
            create_error!(InternalError)
        })?;

        Ok(Self::from_client(client, runtime))
    }

    pub fn from_client(client: Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl<T: Target> RequestIssuer<T> for HttpIssuer {
    fn issue(&self, token: &T, completion: Completion) -> Box<dyn Cancellable> {
        let endpoint = match DefaultEndpointResolver.resolve(token) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                completion.fail(error);
                return Box::new(());
            }
        };

        let mut request = self
            .client
            .request(endpoint.method.into(), &endpoint.url)
            .query(&endpoint.parameters);

        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }

        trace!("{} {}", endpoint.method.as_str(), endpoint.url);

        Box::new(self.runtime.spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    debug!("Request to {} failed: {error}", endpoint.url);
                    completion.fail(create_transport_error!(error));
                    return;
                }
            };

            let status_code = response.status().as_u16();
            let meta = ResponseMeta {
                url: response.url().to_string(),
                headers: response
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|value| (name.as_str().to_string(), value.to_string()))
                    })
                    .collect(),
            };

            match response.bytes().await {
                Ok(data) => completion.complete(Some(data), Some(status_code), Some(meta), None),
                Err(error) => completion.fail(create_transport_error!(error)),
            }
        }))
    }
}
