use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;

use crate::error::{LoadError, LoadResult};
use crate::options::FetchOptions;

/// Asynchronous byte access for remote references. Timeouts are applied by the caller.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, url: &Url) -> LoadResult<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> LoadResult<Self> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(&options.accept).map_err(|err| LoadError::Network(format!("invalid accept header: {err}")))?;
        headers.insert(ACCEPT, accept);

        if options.accept_invalid_certs {
            log::warn!("[HttpFetcher] TLS certificate validation is disabled for image downloads");
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchClient for HttpFetcher {
    async fn fetch(&self, url: &Url) -> LoadResult<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            log::debug!("[HttpFetcher] {} returned {}", url, status);
            return Err(LoadError::Network(format!("HTTP {status} for {url}")));
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
