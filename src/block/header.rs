//! Decodes the single `HeaderBlock` at the start of a file

use chrono::DateTime;
use log::debug;
use prost::Message;

use crate::entity::location::{COORDINATE_PRECISION, NANODEGREE_RESOLUTION};
use crate::entity::Location;
use crate::error::{CodecError, Result};
use crate::model;

/// File bounding box in fixed-point coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub bottom_left: Location,
    pub top_right: Location,
}

/// The decoded header record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    /// The file requires DenseNodes support.
    pub dense_nodes: bool,
    /// The file may contain multiple versions of the same object.
    pub historical: bool,
    pub optional_features: Vec<String>,
    pub writing_program: Option<String>,
    pub source: Option<String>,
    pub bbox: Option<BoundingBox>,
    /// ISO-8601 UTC instant of the last replication applied to the file.
    pub replication_timestamp: Option<String>,
    pub replication_sequence_number: Option<i64>,
    pub replication_base_url: Option<String>,
}

pub(crate) fn decode_header_block(data: &[u8]) -> Result<Header> {
    let block = model::HeaderBlock::decode(data)?;
    let mut header = Header::default();

    for feature in &block.required_features {
        match feature.as_str() {
            "OsmSchema-V0.6" => {}
            "DenseNodes" => header.dense_nodes = true,
            "HistoricalInformation" => header.historical = true,
            other => {
                return Err(CodecError::Unsupported(format!(
                    "required feature not supported: {other}"
                )))
            }
        }
    }

    header.optional_features = block.optional_features;
    header.writing_program = block.writingprogram;
    header.source = block.source;

    if let Some(bbox) = block.bbox {
        header.bbox = Some(BoundingBox {
            bottom_left: Location::new(to_fixed(bbox.left)?, to_fixed(bbox.bottom)?),
            top_right: Location::new(to_fixed(bbox.right)?, to_fixed(bbox.top)?),
        });
    }

    if let Some(seconds) = block.osmosis_replication_timestamp {
        let instant = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            CodecError::Corrupt(format!("replication timestamp out of range: {seconds}"))
        })?;
        header.replication_timestamp = Some(instant.format("%Y-%m-%dT%H:%M:%SZ").to_string());
    }
    header.replication_sequence_number = block.osmosis_replication_sequence_number;
    header.replication_base_url = block.osmosis_replication_base_url;

    debug!(
        "decoded header: dense_nodes={}, historical={}, {} optional feature(s)",
        header.dense_nodes,
        header.historical,
        header.optional_features.len()
    );

    Ok(header)
}

/// Converts a nanodegree coordinate to the fixed-point scale.
fn to_fixed(nanodegrees: i64) -> Result<i32> {
    let fixed = nanodegrees / (NANODEGREE_RESOLUTION / COORDINATE_PRECISION);
    i32::try_from(fixed)
        .map_err(|_| CodecError::Corrupt(format!("bbox coordinate out of range: {nanodegrees}")))
}
