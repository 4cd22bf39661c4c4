//! Pluggable HTTP fetch capability used to load remote documents.

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

/// One outgoing request for a schema document.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Document location.
    pub url: Url,
    /// HTTP method, usually `GET`.
    pub method: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
}

/// The parts of a response the resolver looks at.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// `content-type` header, if present.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl FetchResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches remote documents. Implementations must be shareable across tasks.
pub trait Fetch: Send + Sync + fmt::Debug {
    /// Perform the request. Transport failures map to [`Error::NotFound`].
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<FetchResponse>>;
}

/// Default [`Fetch`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    /// Fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher reusing an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetch for ReqwestFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<FetchResponse>> {
        async move {
            let location = request.url.to_string();
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|err| Error::not_found(&location, err))?;

            let mut builder = self.client.request(method, request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            debug!(url = %location, "Sending schema request.");
            let response = builder.send().await.map_err(|err| {
                warn!(error = %err, url = %location, "Schema request failed.");
                Error::not_found(&location, err)
            })?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response
                .text()
                .await
                .map_err(|err| Error::not_found(&location, err))?;

            debug!(url = %location, status, "Received schema response.");
            Ok(FetchResponse {
                status,
                content_type,
                body,
            })
        }
        .boxed()
    }
}
