//! Blocking HTTP GET for page requests.
//!
//! Uses the curl crate (libcurl). Every request gets a fresh Easy handle; there
//! is no connection pooling across pages. Runs in the current thread, so call
//! from a blocking worker, never directly from async code.

use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::error::FetchError;

/// Per-request settings applied to every page GET.
#[derive(Debug, Clone)]
pub struct HttpClient {
    connect_timeout: Duration,
    timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    pub fn new(cfg: &HttpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
            user_agent: cfg.user_agent.clone(),
        }
    }

    /// GET `url` and return the response body. Follows redirects; non-2xx is an error.
    pub fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        easy.useragent(&self.user_agent)?;

        let mut list = curl::easy::List::new();
        list.append("Accept: application/json")?;
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http {
                code,
                url: url.to_string(),
            });
        }
        Ok(body)
    }

    /// GET `url` and decode the body as JSON.
    pub fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let body = self.get(url)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_never_zero() {
        let cfg = HttpConfig {
            connect_timeout_secs: 0,
            timeout_secs: 0,
            user_agent: "t".into(),
        };
        let client = HttpClient::new(&cfg);
        assert_eq!(client.connect_timeout, Duration::from_secs(1));
        assert_eq!(client.timeout, Duration::from_secs(1));
    }

    #[test]
    fn unreachable_host_is_curl_error() {
        let client = HttpClient::new(&HttpConfig {
            connect_timeout_secs: 1,
            timeout_secs: 2,
            user_agent: "t".into(),
        });
        // Port 9 on loopback is discard; nothing listens there in test environments.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(matches!(client.get(&url), Err(FetchError::Curl(_))));
    }
}
