// Response normalization
//
// Turns the generic tree of a tracking response into flat records. Every
// place that expects a list of pieces goes through `Children::nodes`, so a
// batch answered with a single piece still comes back as a sequence.
use serde::Serialize;
use tracing::warn;

use crate::error::TrackingError;
use crate::events::extract_events;
use crate::request::Operation;
use crate::tree::{Attributes, GenericNode};

// A piece's current status fields, passed through as sent by the carrier
pub type TrackingDetail = Attributes;

// One history entry, same shape as a detail
pub type TrackingEvent = Attributes;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailWithEvents {
    pub details: TrackingDetail,
    // Oldest first
    pub events: Vec<TrackingEvent>,
}

// Result of a lookup: one record for a single piece, a sequence for a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Single(T),
    Batch(Vec<T>),
}

impl<T> Lookup<T> {
    pub fn is_batch(&self) -> bool {
        matches!(self, Lookup::Batch(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Lookup::Single(_) => 1,
            Lookup::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Lookup::Single(item) => vec![item],
            Lookup::Batch(items) => items,
        }
    }
}

const DATA: &str = "data";

// Extracts records from the response of one operation
pub struct ResponseNormalizer {
    operation: Operation,
}

impl ResponseNormalizer {
    pub fn new(operation: Operation) -> Self {
        Self { operation }
    }

    // Piece attributes found at `data → attributes`
    pub fn extract_detail(
        &self,
        tree: &GenericNode,
        is_batch: bool,
    ) -> Result<Lookup<TrackingDetail>, TrackingError> {
        if is_batch {
            return self.extract_batch(tree, |_, attributes| attributes.clone());
        }

        let piece = self.single_piece(tree)?;
        let details = self.required_attributes(tree, piece, "data/@attributes")?;
        Ok(Lookup::Single(details.clone()))
    }

    // Piece attributes plus the event list found at `data → data` below each piece
    pub fn extract_detail_with_events(
        &self,
        tree: &GenericNode,
        is_batch: bool,
    ) -> Result<Lookup<DetailWithEvents>, TrackingError> {
        if is_batch {
            return self.extract_batch(tree, with_events);
        }

        let piece = self.single_piece(tree)?;
        let details = self.required_attributes(tree, piece, "data/@attributes")?;
        Ok(Lookup::Single(with_events(piece, details)))
    }

    // Same as `extract_detail_with_events`, except that a single
    // public lookup carries its attributes one level deeper, at
    // `data → data → attributes`. Events stay at `data → data` below the
    // outer piece node. Batches are shaped like the authenticated ones.
    pub fn extract_public_detail_with_events(
        &self,
        tree: &GenericNode,
        is_batch: bool,
    ) -> Result<Lookup<DetailWithEvents>, TrackingError> {
        if is_batch {
            return self.extract_batch(tree, with_events);
        }

        let piece = self.single_piece(tree)?;
        let status = piece
            .descend(&[DATA])
            .ok_or_else(|| TrackingError::unexpected_shape(self.operation, "data/data", tree))?;
        let details = self.required_attributes(tree, status, "data/data/@attributes")?;
        Ok(Lookup::Single(with_events(piece, details)))
    }

    // Maps every piece under `data`, skipping the ones without attributes
    fn extract_batch<T>(
        &self,
        tree: &GenericNode,
        build: impl Fn(&GenericNode, &TrackingDetail) -> T,
    ) -> Result<Lookup<T>, TrackingError> {
        let pieces = tree
            .child(DATA)
            .ok_or_else(|| TrackingError::unexpected_shape(self.operation, "data", tree))?;

        let mut items = Vec::with_capacity(pieces.len());
        for (index, piece) in pieces.nodes().iter().enumerate() {
            match piece.attributes() {
                Some(attributes) => items.push(build(piece, attributes)),
                None => warn!(
                    operation = %self.operation,
                    index,
                    "Skipping batch item without attributes"
                ),
            }
        }
        Ok(Lookup::Batch(items))
    }

    fn single_piece<'a>(&self, tree: &'a GenericNode) -> Result<&'a GenericNode, TrackingError> {
        tree.descend(&[DATA])
            .ok_or_else(|| TrackingError::unexpected_shape(self.operation, "data", tree))
    }

    fn required_attributes<'a>(
        &self,
        tree: &GenericNode,
        node: &'a GenericNode,
        path: &'static str,
    ) -> Result<&'a TrackingDetail, TrackingError> {
        node.attributes()
            .ok_or_else(|| TrackingError::unexpected_shape(self.operation, path, tree))
    }
}

fn with_events(piece: &GenericNode, details: &TrackingDetail) -> DetailWithEvents {
    let raw_events = piece
        .descend(&[DATA])
        .and_then(|event_list| event_list.child(DATA));
    DetailWithEvents {
        details: details.clone(),
        events: extract_events(raw_events),
    }
}
