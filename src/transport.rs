// HTTP transport to the carrier gateway
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::warn;

use crate::error::{ClientError, TrackingError};

// Account data for the tracking gateway
#[derive(Debug, Clone)]
pub struct Credentials {
    // HTTP basic auth against the gateway
    pub cig_user: String,
    pub cig_password: String,
    pub cig_endpoint: String,
    // Application login embedded in the request document
    pub tnt_user: String,
    pub tnt_password: String,
}

impl Credentials {
    pub fn new(
        cig_user: impl Into<String>,
        cig_password: impl Into<String>,
        cig_endpoint: impl Into<String>,
        tnt_user: impl Into<String>,
        tnt_password: impl Into<String>,
    ) -> Self {
        Self {
            cig_user: cig_user.into(),
            cig_password: cig_password.into(),
            cig_endpoint: cig_endpoint.into(),
            tnt_user: tnt_user.into(),
            tnt_password: tnt_password.into(),
        }
    }

    // Load credentials from environment variables
    //
    // # Environment Variables
    // - `CIG_USER`: Required - Gateway user
    // - `CIG_PASSWORD`: Required - Gateway password
    // - `CIG_ENDPOINT`: Required - Gateway URL
    // - `TNT_USER`: Required - Application name sent in each request
    // - `TNT_PASSWORD`: Required - Application password sent in each request
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self {
            cig_user: required_var("CIG_USER")?,
            cig_password: required_var("CIG_PASSWORD")?,
            cig_endpoint: required_var("CIG_ENDPOINT")?,
            tnt_user: required_var("TNT_USER")?,
            tnt_password: required_var("TNT_PASSWORD")?,
        })
    }

    // Gateway URL carrying the request document as the `xml` query parameter
    pub fn request_url(&self, request_xml: &str) -> Result<Url, TrackingError> {
        Url::parse_with_params(&self.cig_endpoint, &[("xml", request_xml)]).map_err(|e| {
            TrackingError::InvalidRequest(format!("endpoint {}: {}", self.cig_endpoint, e))
        })
    }
}

fn required_var(name: &str) -> Result<String, ClientError> {
    let value =
        env::var(name).map_err(|_| ClientError::ConfigError(format!("{} not set", name)))?;
    if value.trim().is_empty() {
        return Err(ClientError::ConfigError(format!("{} cannot be empty", name)));
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
    }
}

// Sends one request to the gateway and hands back the response body.
//
// Any network failure or non-success status is a `TrackingError::Transport`.
// Nothing is retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, url: &Url, credentials: &Credentials) -> Result<String, TrackingError>;
}

pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn invoke(&self, url: &Url, credentials: &Credentials) -> Result<String, TrackingError> {
        let response = self
            .http_client
            .get(url.clone())
            .basic_auth(&credentials.cig_user, Some(&credentials.cig_password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Tracking gateway returned an error status");
            return Err(TrackingError::Transport {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(endpoint: &str) -> Credentials {
        Credentials::new("cig", "secret", endpoint, "zt12345", "geheim")
    }

    #[test]
    fn test_request_url_encodes_document() {
        let url = credentials("https://cig.example.com/services/sandbox/rest/sendungsverfolgung")
            .request_url(r#"<data appname="zt12345" piece-code="1;2"/>"#)
            .unwrap();

        assert_eq!(url.host_str(), Some("cig.example.com"));
        assert_eq!(url.path(), "/services/sandbox/rest/sendungsverfolgung");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![(
                "xml".to_string(),
                r#"<data appname="zt12345" piece-code="1;2"/>"#.to_string()
            )]
        );
        assert!(!url.as_str().contains('<'));
    }

    #[test]
    fn test_request_url_rejects_bad_endpoint() {
        let result = credentials("not a url").request_url("<data/>");
        assert!(matches!(result, Err(TrackingError::InvalidRequest(_))));
    }

    #[test]
    fn test_default_transport_config() {
        assert_eq!(TransportConfig::default().timeout_ms, 30000);
        assert!(ReqwestTransport::new(&TransportConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let transport = ReqwestTransport::new(&TransportConfig { timeout_ms: 2000 }).unwrap();
        // Port 9 on loopback has nothing listening
        let creds = credentials("http://127.0.0.1:9/tracking");
        let url = creds.request_url("<data/>").unwrap();

        let result = transport.invoke(&url, &creds).await;
        match result {
            Err(TrackingError::Transport { status, .. }) => assert_eq!(status, None),
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }
}
