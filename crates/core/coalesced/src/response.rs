use std::collections::BTreeMap;

use bytes::Bytes;

/// Metadata describing the response a payload arrived with
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Final URL after any redirects
    pub url: String,
    /// Response headers, lowercased names
    pub headers: BTreeMap<String, String>,
}

/// Successful result of a network call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub data: Bytes,
    pub response: Option<ResponseMeta>,
}

impl Response {
    pub fn new(status_code: u16, data: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            data: data.into(),
            response: None,
        }
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.response = Some(meta);
        self
    }
}
