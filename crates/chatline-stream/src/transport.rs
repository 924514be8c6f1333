//! Transport port and the HTTP server-sent-events implementation

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::FutureExt;
use url::Url;

use crate::error::StreamError;
use crate::sse::data_events;
use crate::Result;

/// Raw event payloads of one response, in delivery order
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Opens one response stream per request.
///
/// Dropping the returned stream must release the underlying connection.
pub trait StreamTransport: Send + Sync + 'static {
    fn connect(&self, request_text: &str) -> BoxFuture<'static, Result<FragmentStream>>;
}

/// `GET {endpoint}?message=<text>` answered with `text/event-stream`
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl SseTransport {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn request_url(&self, request_text: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("message", request_text);
        url
    }
}

impl StreamTransport for SseTransport {
    fn connect(&self, request_text: &str) -> BoxFuture<'static, Result<FragmentStream>> {
        let client = self.client.clone();
        let url = self.request_url(request_text);

        async move {
            tracing::debug!(url = %url, "Connecting response stream");

            let response = client
                .get(url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(|e| StreamError::Connect(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(StreamError::Status(status.as_u16()));
            }

            Ok(data_events(response.bytes_stream()))
        }
        .boxed()
    }
}
