// Request XML for the carrier gateway
use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;

use crate::error::TrackingError;

pub const LANG_EN: &str = "en";
pub const LANG_DE: &str = "de";

// Language used when the caller does not pick one
pub const DEFAULT_LANGUAGE: &str = LANG_EN;

// Remote actions offered by the tracking API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetPiece,
    GetPieceDetail,
    GetSignature,
    StatusPublic,
}

impl Operation {
    pub fn code(&self) -> &'static str {
        match self {
            Operation::GetPiece => "d-get-piece",
            Operation::GetPieceDetail => "d-get-piece-detail",
            Operation::GetSignature => "d-get-signature",
            Operation::StatusPublic => "get-status-for-public-user",
        }
    }

    // Public requests nest the piece code one level deeper
    pub fn is_public(&self) -> bool {
        matches!(self, Operation::StatusPublic)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// Produces the request document for one operation.
//
// Implementations are pure templating: the same inputs always give the same
// document. The piece code is passed through untouched, batches included.
pub trait RequestBuilder: Send + Sync {
    fn build_authenticated_request(
        &self,
        operation: Operation,
        user: &str,
        password: &str,
        language: &str,
        piece_code: &str,
    ) -> Result<String, TrackingError>;

    fn build_public_request(
        &self,
        operation: Operation,
        user: &str,
        password: &str,
        language: &str,
        piece_code: &str,
    ) -> Result<String, TrackingError>;
}

// Writes the gateway's `<data .../>` request format
#[derive(Debug, Default, Clone)]
pub struct XmlRequestBuilder;

impl XmlRequestBuilder {
    pub fn new() -> Self {
        Self
    }

    fn request_element<'a>(
        operation: Operation,
        user: &'a str,
        password: &'a str,
        language: &'a str,
    ) -> BytesStart<'a> {
        let mut data = BytesStart::new("data");
        data.push_attribute(("appname", user));
        data.push_attribute(("password", password));
        data.push_attribute(("request", operation.code()));
        data.push_attribute(("language-code", language));
        data
    }

    fn finish(writer: Writer<Vec<u8>>) -> Result<String, TrackingError> {
        String::from_utf8(writer.into_inner())
            .map_err(|e| TrackingError::InvalidRequest(e.to_string()))
    }
}

fn write_failed(err: std::io::Error) -> TrackingError {
    TrackingError::InvalidRequest(err.to_string())
}

fn declaration() -> Event<'static> {
    Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no")))
}

impl RequestBuilder for XmlRequestBuilder {
    fn build_authenticated_request(
        &self,
        operation: Operation,
        user: &str,
        password: &str,
        language: &str,
        piece_code: &str,
    ) -> Result<String, TrackingError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(declaration()).map_err(write_failed)?;

        let mut data = Self::request_element(operation, user, password, language);
        data.push_attribute(("piece-code", piece_code));
        writer.write_event(Event::Empty(data)).map_err(write_failed)?;

        Self::finish(writer)
    }

    fn build_public_request(
        &self,
        operation: Operation,
        user: &str,
        password: &str,
        language: &str,
        piece_code: &str,
    ) -> Result<String, TrackingError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(declaration()).map_err(write_failed)?;

        let data = Self::request_element(operation, user, password, language);
        writer.write_event(Event::Start(data)).map_err(write_failed)?;

        let mut piece = BytesStart::new("data");
        piece.push_attribute(("piece-code", piece_code));
        writer.write_event(Event::Empty(piece)).map_err(write_failed)?;
        writer
            .write_event(Event::End(BytesEnd::new("data")))
            .map_err(write_failed)?;

        Self::finish(writer)
    }
}
