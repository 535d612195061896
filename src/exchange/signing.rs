use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use governor::{DefaultDirectRateLimiter, Quota};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::debug;

use crate::types::{Credentials, ExchangeResult, ExchangeError};

type HmacSha256 = Hmac<Sha256>;

/// Header names used by a passphrase-signed REST venue
#[derive(Debug, Clone)]
pub struct SignedHeaderNames {
    pub access_key: &'static str,
    pub signature: &'static str,
    pub timestamp: &'static str,
    pub passphrase: &'static str,
}

/// Signs `timestamp + METHOD + request_path + body` with HMAC-SHA256
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// UTC ISO-8601 with millisecond precision and a literal `Z`
    pub fn format_timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Create base64 signature for a request
    pub fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(timestamp.as_bytes());
        mac.update(method.to_uppercase().as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());

        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// Authenticated HTTP transport for venues without SDK support.
///
/// Every request waits on a per-credential token bucket before it is sent.
/// The request body is serialized once, and those exact bytes are both signed
/// and sent.
#[derive(Clone)]
pub struct SignedRestTransport {
    client: Client,
    base_url: String,
    signer: RequestSigner,
    header_names: SignedHeaderNames,
    extra_headers: HeaderMap,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for SignedRestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRestTransport")
            .field("base_url", &self.base_url)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl SignedRestTransport {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        header_names: SignedHeaderNames,
        requests_per_second: u32,
    ) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer: RequestSigner::new(credentials),
            header_names,
            extra_headers: HeaderMap::new(),
            limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Header sent with every request (e.g. a simulated-trading flag)
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.extra_headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the four signed headers plus content type
    pub fn signed_headers(
        &self,
        timestamp: &str,
        method: &Method,
        request_path: &str,
        body: &str,
    ) -> ExchangeResult<HeaderMap> {
        let credentials = self.signer.credentials();
        let signature = self.signer.sign(timestamp, method.as_str(), request_path, body);

        let mut headers = self.extra_headers.clone();
        headers.insert(self.header_names.access_key, HeaderValue::from_str(&credentials.api_key)?);
        headers.insert(self.header_names.signature, HeaderValue::from_str(&signature)?);
        headers.insert(self.header_names.timestamp, HeaderValue::from_str(timestamp)?);
        headers.insert(
            self.header_names.passphrase,
            HeaderValue::from_str(credentials.passphrase.as_deref().unwrap_or_default())?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Unsigned request against a public endpoint
    pub async fn get_public<T: DeserializeOwned>(&self, request_path: &str) -> ExchangeResult<T> {
        let mut headers = self.extra_headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(Method::GET, request_path, headers, None).await
    }

    /// Signed request against a private endpoint
    pub async fn request_private<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: &str,
        body: Option<&serde_json::Value>,
    ) -> ExchangeResult<T> {
        let body_json = match body {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };
        let timestamp = RequestSigner::format_timestamp(Utc::now());
        let headers = self.signed_headers(&timestamp, &method, request_path, &body_json)?;

        let body = if body_json.is_empty() { None } else { Some(body_json) };
        self.send(method, request_path, headers, body).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: &str,
        headers: HeaderMap,
        body: Option<String>,
    ) -> ExchangeResult<T> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, request_path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::Status { status: status.as_u16(), body: text });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
