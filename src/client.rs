// Tracking client
use std::sync::Arc;

use tracing::debug;

use crate::batch::{is_batch, piece_count};
use crate::error::{ClientError, TrackingError};
use crate::normalize::{DetailWithEvents, Lookup, ResponseNormalizer, TrackingDetail};
use crate::request::{Operation, RequestBuilder, XmlRequestBuilder, DEFAULT_LANGUAGE};
use crate::transport::{Credentials, ReqwestTransport, Transport, TransportConfig};
use crate::tree::{self, GenericNode};

// Entry point for piece lookups.
//
// Each call is independent: the credentials are only read, so one client can
// serve concurrent callers. A `language` of `None` means English.
pub struct TrackingClient {
    credentials: Arc<Credentials>,
    transport: Arc<dyn Transport>,
    request_builder: Arc<dyn RequestBuilder>,
}

impl TrackingClient {
    // Client talking to the gateway over HTTP
    pub fn new(credentials: Credentials, config: &TransportConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(credentials, Arc::new(transport)))
    }

    pub fn with_transport(credentials: Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials: Arc::new(credentials),
            transport,
            request_builder: Arc::new(XmlRequestBuilder::new()),
        }
    }

    pub fn with_request_builder(mut self, request_builder: Arc<dyn RequestBuilder>) -> Self {
        self.request_builder = request_builder;
        self
    }

    // Current status of one piece or a batch
    pub async fn get_details(
        &self,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<Lookup<TrackingDetail>, TrackingError> {
        let operation = Operation::GetPiece;
        let tree = self.call(operation, piece_code, language).await?;
        ResponseNormalizer::new(operation).extract_detail(&tree, is_batch(piece_code))
    }

    // Current status together with the event history
    pub async fn get_details_and_events(
        &self,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<Lookup<DetailWithEvents>, TrackingError> {
        let operation = Operation::GetPieceDetail;
        let tree = self.call(operation, piece_code, language).await?;
        ResponseNormalizer::new(operation).extract_detail_with_events(&tree, is_batch(piece_code))
    }

    // Proof of delivery
    pub async fn get_signature(
        &self,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<Lookup<TrackingDetail>, TrackingError> {
        let operation = Operation::GetSignature;
        let tree = self.call(operation, piece_code, language).await?;
        ResponseNormalizer::new(operation).extract_detail(&tree, is_batch(piece_code))
    }

    // Status and events as shown to public users
    pub async fn get_public_details(
        &self,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<Lookup<DetailWithEvents>, TrackingError> {
        let operation = Operation::StatusPublic;
        let tree = self.call(operation, piece_code, language).await?;
        ResponseNormalizer::new(operation)
            .extract_public_detail_with_events(&tree, is_batch(piece_code))
    }

    // Runs `operation` against the gateway and returns the parsed response tree.
    pub async fn fetch_tree(
        &self,
        operation: Operation,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<GenericNode, TrackingError> {
        self.call(operation, piece_code, language).await
    }

    async fn call(
        &self,
        operation: Operation,
        piece_code: &str,
        language: Option<&str>,
    ) -> Result<GenericNode, TrackingError> {
        let language = language.unwrap_or(DEFAULT_LANGUAGE);
        let credentials = &self.credentials;

        let request = if operation.is_public() {
            self.request_builder.build_public_request(
                operation,
                &credentials.tnt_user,
                &credentials.tnt_password,
                language,
                piece_code,
            )?
        } else {
            self.request_builder.build_authenticated_request(
                operation,
                &credentials.tnt_user,
                &credentials.tnt_password,
                language,
                piece_code,
            )?
        };

        debug!(
            operation = %operation,
            language,
            batch = is_batch(piece_code),
            pieces = piece_count(piece_code),
            "Calling tracking gateway"
        );
        let url = credentials.request_url(&request)?;
        let body = self.transport.invoke(&url, credentials).await?;

        tree::parse(&body)
    }
}

// Transport double returning canned bodies
#[cfg(test)]
pub mod mock_transport {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::Mutex;

    pub struct MockTransport {
        response: Result<String, u16>,
        calls: Mutex<Vec<Url>>,
    }

    impl MockTransport {
        pub fn with_body(body: &str) -> Self {
            Self {
                response: Ok(body.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_status(status: u16) -> Self {
            Self {
                response: Err(status),
                calls: Mutex::new(Vec::new()),
            }
        }

        // Request documents received so far
        pub fn requests(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|url| {
                    url.query_pairs()
                        .find(|(key, _)| key == "xml")
                        .map(|(_, value)| value.into_owned())
                })
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn invoke(
            &self,
            url: &Url,
            _credentials: &Credentials,
        ) -> Result<String, TrackingError> {
            self.calls.lock().unwrap().push(url.clone());
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(TrackingError::Transport {
                    status: Some(*status),
                    message: "Internal Server Error".to_string(),
                }),
            }
        }
    }
}
