use crate::error::{Result, ScanError};
use crate::result::{ProbeOutcome, ProbeResult};
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// One lightweight existence check. Implemented over HTTP in production and
/// by instrumented fakes in engine tests. A probe is never retried in place;
/// recovery happens by trying a different candidate later.
pub trait ProbeTransport: Send + Sync {
    fn probe(&self, param: i64, key: i64) -> impl Future<Output = ProbeResult> + Send;
}

/// Metadata-only `HEAD` probe against the registry's file endpoint.
///
/// Status 200 means the pair exists, with size and content type read from
/// headers when present. Any other status, and any transport failure, is a
/// miss; timeouts and connection errors are only distinguished for
/// diagnostics. The body is never inspected.
pub struct HttpProbe {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(base_url: &str, timeout: Duration, session_cookie: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("invalid base URL '{}': {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            let value = cookie
                .parse()
                .map_err(|_| ScanError::ConfigError("session cookie is not a valid header value".to_string()))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .user_agent("albo/0.2")
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn probe_url(&self, param: i64, key: i64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("SOURCE", "DB")
            .append_pair("PARAM", &param.to_string())
            .append_pair("KEY", &key.to_string());
        url
    }
}

impl ProbeTransport for HttpProbe {
    async fn probe(&self, param: i64, key: i64) -> ProbeResult {
        let url = self.probe_url(param, key);
        debug!("HEAD {}", url);

        match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                let content_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                ProbeResult::found(param, key, response.content_length(), content_type)
            }
            Ok(_) => ProbeResult::missed(param, key, ProbeOutcome::NotFound),
            Err(e) if e.is_timeout() => ProbeResult::missed(param, key, ProbeOutcome::Timeout),
            Err(_) => ProbeResult::missed(param, key, ProbeOutcome::Error),
        }
    }
}
