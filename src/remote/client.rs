//! Shared HTTP plumbing for every remote-service adapter.

use crate::error::{PipelineError, PipelineResult};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self { http, base_url, api_key }
    }

    pub async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> PipelineResult<Resp> {
        self.call(Method::POST, path, Some(body)).await
    }

    pub async fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> PipelineResult<Resp> {
        self.call::<(), Resp>(Method::GET, path, None).await
    }

    async fn call<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
    ) -> PipelineResult<Resp> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let mut req = self.http.request(method, &url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| PipelineError::Network(format!("remote service request to {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms_from_headers(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, retry_after_ms));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| PipelineError::Content(format!("decoding remote service response: {e}")))
    }
}

/// Parses a `Retry-After` header value expressed as delay-seconds (the
/// common case for this service's 429s). The HTTP-date form is not
/// produced by this API and is left unparsed.
pub fn retry_after_ms_from_headers(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}

/// Maps the remote service's HTTP status vocabulary onto the pipeline's
/// error taxonomy, same table the existing engines use for search engine
/// block detection but keyed on status rather than body sniffing since the
/// remote service returns structured JSON error bodies.
pub fn classify_status(status: StatusCode, body: &str, retry_after_ms: Option<u64>) -> PipelineError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PipelineError::Auth(body.to_string()),
        StatusCode::PAYMENT_REQUIRED => PipelineError::Payment(body.to_string()),
        StatusCode::TOO_MANY_REQUESTS => PipelineError::RateLimit {
            message: body.to_string(),
            retry_after_ms,
        },
        s if s.as_u16() >= 400 && s.as_u16() < 500 => {
            PipelineError::Validation { path: "remote".to_string(), rule: body.to_string() }
        }
        s if s.as_u16() >= 500 => PipelineError::Server(body.to_string()),
        _ => PipelineError::Protocol(format!("unexpected status {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn auth_statuses_map_to_auth_error() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            assert_eq!(classify_status(status, "nope", None).kind(), ErrorKind::Auth);
        }
    }

    #[test]
    fn payment_required_maps_to_payment_error() {
        assert_eq!(classify_status(StatusCode::PAYMENT_REQUIRED, "pay up", None).kind(), ErrorKind::Payment);
    }

    #[test]
    fn too_many_requests_maps_to_rate_limit() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down", Some(5_000));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert!(err.retryable());
        assert_eq!(err.retry_after_ms(), Some(5_000));
    }

    #[test]
    fn other_4xx_maps_to_validation() {
        assert_eq!(classify_status(StatusCode::BAD_REQUEST, "bad", None).kind(), ErrorKind::Validation);
    }

    #[test]
    fn server_errors_map_to_server_kind() {
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops", None).kind(), ErrorKind::Server);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY, "oops", None).kind(), ErrorKind::Server);
    }

    #[test]
    fn retry_after_header_parses_seconds_into_milliseconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(retry_after_ms_from_headers(&headers), Some(3_000));
    }

    #[test]
    fn unexpected_statuses_map_to_protocol() {
        assert_eq!(classify_status(StatusCode::MOVED_PERMANENTLY, "redirected", None).kind(), ErrorKind::Protocol);
    }
}
