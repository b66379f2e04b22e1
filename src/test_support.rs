//! In-memory builders for synthetic PBF input used across the test suite.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use prost::Message;

use crate::blob::frame::{BLOB_TYPE_DATA, BLOB_TYPE_HEADER};
use crate::blob::source::ReadSource;
use crate::entity::{Entity, EntityKind};
use crate::model;

/// An owned byte source, as the reader's producer thread requires.
pub(crate) fn source(bytes: Vec<u8>) -> ReadSource<std::io::Cursor<Vec<u8>>> {
    ReadSource::new(std::io::Cursor::new(bytes))
}

pub(crate) fn string_table(strings: &[&str]) -> model::StringTable {
    model::StringTable {
        s: strings.iter().map(|s| s.as_bytes().to_vec()).collect(),
    }
}

/// A block with defaults for granularity, offsets and date granularity.
pub(crate) fn block(strings: &[&str], groups: Vec<model::PrimitiveGroup>) -> model::PrimitiveBlock {
    model::PrimitiveBlock {
        stringtable: string_table(strings),
        primitivegroup: groups,
        granularity: None,
        lat_offset: None,
        lon_offset: None,
        date_granularity: None,
    }
}

pub(crate) fn dense_group(dense: model::DenseNodes) -> model::PrimitiveGroup {
    model::PrimitiveGroup {
        dense: Some(dense),
        ..Default::default()
    }
}

/// Wraps block bytes into a raw (uncompressed) blob.
pub(crate) fn raw_blob(data: &[u8]) -> Vec<u8> {
    let blob = model::Blob {
        raw_size: None,
        data: Some(model::blob::Data::Raw(data.to_vec())),
    };
    blob.encode_to_vec()
}

/// Wraps block bytes into a zlib blob carrying the advertised raw size.
pub(crate) fn zlib_blob(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    let blob = model::Blob {
        raw_size: Some(data.len() as i32),
        data: Some(model::blob::Data::ZlibData(encoder.finish().unwrap())),
    };
    blob.encode_to_vec()
}

/// Emits one length-delimited frame: big-endian header size, `BlobHeader`,
/// then the blob bytes.
pub(crate) fn frame(blob_type: &str, blob: &[u8]) -> Vec<u8> {
    let header = model::BlobHeader {
        r#type: blob_type.to_string(),
        indexdata: None,
        datasize: blob.len() as i32,
    };
    let header_bytes = header.encode_to_vec();
    let mut out = (header_bytes.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(blob);
    out
}

pub(crate) fn header_block(required_features: &[&str]) -> model::HeaderBlock {
    model::HeaderBlock {
        required_features: required_features.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub(crate) fn header_frame(required_features: &[&str]) -> Vec<u8> {
    frame(
        BLOB_TYPE_HEADER,
        &zlib_blob(&header_block(required_features).encode_to_vec()),
    )
}

/// A complete synthetic file: an OSMHeader frame followed by one OSMData
/// frame per block, all zlib compressed.
pub(crate) fn pbf_file(blocks: &[model::PrimitiveBlock]) -> Vec<u8> {
    let mut out = header_frame(&["OsmSchema-V0.6", "DenseNodes"]);
    for block in blocks {
        out.extend(frame(BLOB_TYPE_DATA, &zlib_blob(&block.encode_to_vec())));
    }
    out
}

fn intern(strings: &mut Vec<String>, value: &str) -> u32 {
    if let Some(found) = strings.iter().position(|s| s == value) {
        return found as u32;
    }
    strings.push(value.to_string());
    (strings.len() - 1) as u32
}

fn encode_info(info: &crate::entity::Info, strings: &mut Vec<String>) -> model::Info {
    model::Info {
        version: Some(info.version as i32),
        timestamp: Some(info.timestamp),
        changeset: Some(i64::from(info.changeset)),
        uid: Some(info.uid),
        user_sid: Some(intern(strings, &info.user)),
        visible: Some(info.visible),
    }
}

/// Re-encodes decoded entities into a minimal block: one plain (non-dense)
/// group per entity kind, granularity 100, offsets 0, millisecond dates.
/// Useful for round-trip checks; the string table layout is whatever
/// interning order produces.
pub(crate) fn reencode_entities(entities: &[Entity]) -> model::PrimitiveBlock {
    let mut strings = vec![String::new()];
    let mut nodes = Vec::new();
    let mut ways = Vec::new();
    let mut relations = Vec::new();

    for entity in entities {
        let (keys, vals) = entity.tags().iter().fold(
            (Vec::new(), Vec::new()),
            |(mut keys, mut vals), tag| {
                keys.push(intern(&mut strings, &tag.key));
                vals.push(intern(&mut strings, &tag.value));
                (keys, vals)
            },
        );

        match entity {
            Entity::Node(node) => nodes.push(model::Node {
                id: node.id,
                keys,
                vals,
                info: Some(encode_info(&node.info, &mut strings)),
                // At granularity 100 and offset 0 the raw value equals the
                // fixed-point value.
                lat: i64::from(node.location.lat_fixed()),
                lon: i64::from(node.location.lon_fixed()),
            }),
            Entity::Way(way) => {
                let mut last = 0;
                let refs = way
                    .refs
                    .iter()
                    .map(|&r| {
                        let delta = r - last;
                        last = r;
                        delta
                    })
                    .collect();
                ways.push(model::Way {
                    id: way.id,
                    keys,
                    vals,
                    info: Some(encode_info(&way.info, &mut strings)),
                    refs,
                });
            }
            Entity::Relation(relation) => {
                let mut last = 0;
                let mut memids = Vec::new();
                let mut types = Vec::new();
                let mut roles_sid = Vec::new();
                for member in &relation.members {
                    memids.push(member.ref_id - last);
                    last = member.ref_id;
                    types.push(match member.kind {
                        EntityKind::Node => model::relation::MemberType::Node as i32,
                        EntityKind::Way => model::relation::MemberType::Way as i32,
                        EntityKind::Relation => model::relation::MemberType::Relation as i32,
                    });
                    roles_sid.push(intern(&mut strings, &member.role) as i32);
                }
                relations.push(model::Relation {
                    id: relation.id,
                    keys,
                    vals,
                    info: Some(encode_info(&relation.info, &mut strings)),
                    roles_sid,
                    memids,
                    types,
                });
            }
        }
    }

    let mut groups = Vec::new();
    if !nodes.is_empty() {
        groups.push(model::PrimitiveGroup {
            nodes,
            ..Default::default()
        });
    }
    if !ways.is_empty() {
        groups.push(model::PrimitiveGroup {
            ways,
            ..Default::default()
        });
    }
    if !relations.is_empty() {
        groups.push(model::PrimitiveGroup {
            relations,
            ..Default::default()
        });
    }

    let strings: Vec<&str> = strings.iter().map(String::as_str).collect();
    let mut block = block(&strings, groups);
    // Entity timestamps are already milliseconds.
    block.date_granularity = Some(1);
    block
}
