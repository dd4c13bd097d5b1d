// Client for a parcel carrier's XML tracking gateway

// Modules, leaves first
pub mod batch;
pub mod client;
pub mod error;
pub mod events;
pub mod normalize;
pub mod request;
pub mod transport;
pub mod tree;

// Re-export key types for convenience
pub use batch::{is_batch, MAX_PIECE_CNT, PIECE_DELIMITER};
pub use client::TrackingClient;
pub use error::{ClientError, TrackingError};
pub use events::extract_events;
pub use normalize::{DetailWithEvents, Lookup, ResponseNormalizer, TrackingDetail, TrackingEvent};
pub use request::{
    Operation, RequestBuilder, XmlRequestBuilder, DEFAULT_LANGUAGE, LANG_DE, LANG_EN,
};
pub use transport::{Credentials, ReqwestTransport, Transport, TransportConfig};
pub use tree::{Children, GenericNode};
