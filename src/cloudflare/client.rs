use crate::cloudflare::requests::trace::TraceRequest;
use crate::cloudflare::requests::Request;
use crate::cloudflare::tests::MetadataSource;
use crate::errors::{to_speed_test_error, SpeedTestError};
use crate::results::EndpointMetadata;
use log::debug;
use reqwest::Client as ReqwestClient;
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

/// Client for the endpoint's plain JSON/text resources.
///
/// Every connection it opens is bound to the same local address.
#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    base_url: Url,
}

impl Client {
    pub fn new(
        host: &str,
        local_address: Option<IpAddr>,
        timeout: Duration,
    ) -> Result<Self, SpeedTestError> {
        let base_url = Url::parse(&format!("https://{}/", host)).map_err(|e| {
            SpeedTestError::config(format!("invalid endpoint host '{}'", host))
                .with_source(e)
        })?;

        let client = ReqwestClient::builder()
            .local_address(local_address)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| to_speed_test_error(Box::new(e), "http client"))?;

        Ok(Client { client, base_url })
    }

    pub async fn send<R: Request>(
        &self,
        request: R,
    ) -> Result<R::Response, SpeedTestError> {
        let endpoint = request.endpoint();
        let endpoint = endpoint.trim_matches('/');
        let url = self.base_url.join(endpoint).map_err(|e| {
            SpeedTestError::config(format!("invalid endpoint '{}'", endpoint))
                .with_source(e)
        })?;

        debug!("{} {}", R::METHOD, url);

        let response = self
            .client
            .request(R::METHOD, url.clone())
            .headers(request.headers())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| to_speed_test_error(Box::new(e), url.as_str()))?;

        let text = response
            .text()
            .await
            .map_err(|e| to_speed_test_error(Box::new(e), url.as_str()))?;

        // Cloudflare often returns JSON with a text/plain content type
        if let Ok(parsed) = serde_json::from_str::<R::Response>(&text) {
            return Ok(parsed);
        }

        serde_plain::from_str(&text).map_err(|e| {
            SpeedTestError::protocol(format!("malformed response from {}", url))
                .with_source(e)
        })
    }
}

/// Endpoint metadata from `/cdn-cgi/trace`.
#[derive(Debug, Clone)]
pub struct TraceLookup {
    timeout: Duration,
}

impl TraceLookup {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl MetadataSource for TraceLookup {
    async fn endpoint_metadata(
        &self,
        host: &str,
        local_address: Option<IpAddr>,
    ) -> Result<EndpointMetadata, SpeedTestError> {
        let lookup = async {
            let client = Client::new(host, local_address, self.timeout)?;
            client.send(TraceRequest {}).await?.into_metadata()
        };

        lookup.await.map_err(|e| {
            SpeedTestError::endpoint(format!(
                "trace lookup against {} failed: {}",
                host, e.message
            ))
            .with_source(e)
        })
    }
}
