//! HTTP gateway implementation.
//!
//! The actual HTTP client is abstracted via a trait so applications can plug
//! in whatever client they already use (reqwest, hyper, a platform bridge).
//! Bodies are JSON.

use crate::error::{SyncError, SyncResult};
use crate::gateway::{PushAck, RemoteGateway};
use async_trait::async_trait;
use hoard_core::{EntityType, Record};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP method used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP client abstraction.
///
/// An `Err` means the request never produced a response (DNS, connection
/// reset, TLS). Non-2xx statuses are returned as `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Gateway speaking JSON to a REST-style remote.
///
/// - `GET {base}/api/{type}?user={user}` returns an array of records
/// - `PUT {base}/api/{type}/{id}` stores one record
pub struct HttpGateway<C: HttpClient> {
    base_url: String,
    client: C,
    token: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpGateway<C> {
    /// Creates a new HTTP gateway.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sets the bearer token sent with every request.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    fn collection_url(&self, entity_type: &EntityType) -> String {
        format!(
            "{}/api/{}",
            self.base_url,
            urlencoding::encode(entity_type.as_str())
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.token.read().as_ref() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    async fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        let url = request.url.clone();
        let response = self
            .client
            .send(request)
            .await
            .map_err(SyncError::network_retryable)?;
        debug!(url = %url, status = response.status, "http response");
        check_status(&response)?;
        Ok(response)
    }
}

/// Maps a response status to the sync error taxonomy.
fn check_status(response: &HttpResponse) -> SyncResult<()> {
    let status = response.status;
    let detail = || String::from_utf8_lossy(&response.body).into_owned();
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(SyncError::AuthFailed(format!("status {status}"))),
        408 => Err(SyncError::Timeout),
        429 => Err(SyncError::network_retryable(format!(
            "rate limited (status {status})"
        ))),
        500..=599 => Err(SyncError::ServerError(format!("status {status}: {}", detail()))),
        _ => Err(SyncError::Rejected(format!("status {status}: {}", detail()))),
    }
}

fn decode_snapshot(body: &[u8]) -> SyncResult<Vec<Record>> {
    let values: Vec<Value> =
        serde_json::from_slice(body).map_err(|e| SyncError::Codec(e.to_string()))?;
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match Record::try_from(value) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "skipping malformed remote record"),
        }
    }
    Ok(records)
}

#[async_trait]
impl<C: HttpClient> RemoteGateway for HttpGateway<C> {
    async fn fetch_all(&self, entity_type: &EntityType, user_id: &str) -> SyncResult<Vec<Record>> {
        let url = format!(
            "{}?user={}",
            self.collection_url(entity_type),
            urlencoding::encode(user_id)
        );
        let request = HttpRequest {
            method: Method::Get,
            url,
            headers: self.headers(),
            body: None,
        };
        let response = self.execute(request).await?;
        decode_snapshot(&response.body)
    }

    async fn push_one(&self, entity_type: &EntityType, record: &Record) -> SyncResult<PushAck> {
        let ack = PushAck::for_record(record)?;
        let body = serde_json::to_vec(record).map_err(|e| SyncError::Codec(e.to_string()))?;
        let mut headers = self.headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        let request = HttpRequest {
            method: Method::Put,
            url: format!(
                "{}/{}",
                self.collection_url(entity_type),
                urlencoding::encode(&ack.id)
            ),
            headers,
            body: Some(body),
        };
        self.execute(request).await?;
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::Entity;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays canned responses and records requests.
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn respond(self, response: Result<HttpResponse, String>) -> Self {
            self.responses.lock().push_back(response);
            self
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response".into()))
        }
    }

    fn parties() -> EntityType {
        EntityType::new("parties").unwrap()
    }

    #[tokio::test]
    async fn fetch_builds_url_and_decodes() {
        let body = json!([{"id": "p1", "lastModified": 3}, 42]).to_string();
        let client = ScriptedClient::default().respond(Ok(HttpResponse::new(200, body)));
        let gateway = HttpGateway::new("https://hoard.test/", client);
        gateway.set_token(Some("secret".into()));

        let records = gateway.fetch_all(&parties(), "a b").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key().as_deref(), Some("p1"));

        let requests = gateway.client.requests.lock();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "https://hoard.test/api/parties?user=a%20b");
        assert!(requests[0]
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
    }

    #[tokio::test]
    async fn push_sends_record() {
        let client = ScriptedClient::default().respond(Ok(HttpResponse::new(204, Vec::new())));
        let gateway = HttpGateway::new("https://hoard.test", client);
        let record = Record::try_from(json!({"id": "p/1", "lastModified": 8, "name": "Vox"})).unwrap();

        let ack = gateway.push_one(&parties(), &record).await.unwrap();
        assert_eq!(ack.last_modified, 8);

        let requests = gateway.client.requests.lock();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].url, "https://hoard.test/api/parties/p%2F1");
        let sent: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent["name"], "Vox");
    }

    #[tokio::test]
    async fn status_mapping() {
        let cases = [
            (401, "auth"),
            (403, "auth"),
            (408, "retry"),
            (429, "retry"),
            (503, "retry"),
            (404, "reject"),
        ];
        for (status, expected) in cases {
            let client = ScriptedClient::default().respond(Ok(HttpResponse::new(status, "nope")));
            let gateway = HttpGateway::new("https://hoard.test", client);
            let err = gateway.fetch_all(&parties(), "u").await.unwrap_err();
            match expected {
                "auth" => assert!(matches!(err, SyncError::AuthFailed(_)), "{status}"),
                "retry" => assert!(err.is_retryable(), "{status}"),
                _ => assert!(matches!(err, SyncError::Rejected(_)), "{status}"),
            }
        }
    }

    #[tokio::test]
    async fn transport_error_is_retryable() {
        let client = ScriptedClient::default().respond(Err("connection reset".into()));
        let gateway = HttpGateway::new("https://hoard.test", client);
        let err = gateway.fetch_all(&parties(), "u").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn bad_json_is_codec_error() {
        let client = ScriptedClient::default().respond(Ok(HttpResponse::new(200, "{oops")));
        let gateway = HttpGateway::new("https://hoard.test", client);
        let err = gateway.fetch_all(&parties(), "u").await.unwrap_err();
        assert!(matches!(err, SyncError::Codec(_)));
    }
}
