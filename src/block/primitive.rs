//! Decodes one `PrimitiveBlock` into a sequenced buffer of entities
//!
//! Each block is self-contained: its string table, offsets and granularity
//! apply to nothing outside it.

use prost::Message;

use crate::block::strings::StringTable;
use crate::entity::location::{COORDINATE_PRECISION, NANODEGREE_RESOLUTION};
use crate::entity::{
    Entity, EntityKind, EntityMask, Info, Location, Node, Relation, RelationMember, Tag, Tags, Way,
};
use crate::error::{CodecError, Result};
use crate::model;
use crate::model::relation::MemberType;

/// Fixed-point units per raw nanodegree-granularity unit.
const COORDINATE_SCALE: i64 = NANODEGREE_RESOLUTION / COORDINATE_PRECISION;

/// Entities decoded from one block, delivered in file order.
#[derive(Debug)]
pub struct OutputBuffer {
    seq_no: u64,
    entities: Vec<Entity>,
}

impl OutputBuffer {
    /// Position of the originating blob in the file, counted from 0 over
    /// the data blobs.
    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

impl IntoIterator for OutputBuffer {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a OutputBuffer {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

/// Block-wide decode state: the string table plus the coordinate and date
/// scaling parameters.
struct BlockContext<'a> {
    strings: StringTable<'a>,
    granularity: i64,
    lat_offset: i64,
    lon_offset: i64,
    date_factor: i64,
}

impl BlockContext<'_> {
    fn location(&self, raw_lon: i64, raw_lat: i64) -> Result<Location> {
        let lon = (raw_lon * self.granularity + self.lon_offset) / COORDINATE_SCALE;
        let lat = (raw_lat * self.granularity + self.lat_offset) / COORDINATE_SCALE;
        Ok(Location::new(
            i32::try_from(lon)
                .map_err(|_| CodecError::Corrupt(format!("longitude out of range: {lon}")))?,
            i32::try_from(lat)
                .map_err(|_| CodecError::Corrupt(format!("latitude out of range: {lat}")))?,
        ))
    }

    /// Milliseconds since the epoch.
    fn timestamp(&self, raw: i64) -> i64 {
        raw * self.date_factor
    }
}

pub(crate) fn decode_primitive_block(
    data: &[u8],
    mask: EntityMask,
    seq_no: u64,
) -> Result<OutputBuffer> {
    let block = model::PrimitiveBlock::decode(data)?;
    let ctx = BlockContext {
        strings: StringTable::new(&block.stringtable),
        granularity: i64::from(block.granularity()),
        lat_offset: block.lat_offset(),
        lon_offset: block.lon_offset(),
        date_factor: i64::from(block.date_granularity()),
    };

    let mut entities = Vec::new();
    for group in &block.primitivegroup {
        if let Some(dense) = &group.dense {
            if mask.contains(EntityKind::Node) {
                decode_dense(&ctx, dense, &mut entities)?;
            }
        } else if !group.ways.is_empty() {
            if mask.contains(EntityKind::Way) {
                decode_ways(&ctx, &group.ways, &mut entities)?;
            }
        } else if !group.relations.is_empty() {
            if mask.contains(EntityKind::Relation) {
                decode_relations(&ctx, &group.relations, &mut entities)?;
            }
        } else if !group.nodes.is_empty() {
            if mask.contains(EntityKind::Node) {
                decode_nodes(&ctx, &group.nodes, &mut entities)?;
            }
        } else {
            return Err(CodecError::Corrupt("group of unknown type".into()));
        }
    }

    Ok(OutputBuffer { seq_no, entities })
}

/// Decodes the optional per-object metadata message.
fn decode_info(ctx: &BlockContext, info: Option<&model::Info>) -> Result<Info> {
    let Some(info) = info else {
        return Ok(Info::default());
    };

    let version = info.version();
    if version < 0 {
        return Err(CodecError::Corrupt(format!(
            "negative object version: {version}"
        )));
    }
    let changeset = u32::try_from(info.changeset()).map_err(|_| {
        CodecError::Corrupt(format!("changeset out of range: {}", info.changeset()))
    })?;

    Ok(Info {
        version: version as u32,
        changeset,
        timestamp: ctx.timestamp(info.timestamp()),
        uid: info.uid(),
        user: ctx.strings.get(info.user_sid() as usize)?,
        // Absent means visible; only historical dumps write the field.
        visible: info.visible.unwrap_or(true),
    })
}

fn decode_tags(ctx: &BlockContext, keys: &[u32], vals: &[u32]) -> Result<Tags> {
    if keys.len() != vals.len() {
        return Err(CodecError::Corrupt(
            "mismatched tag key/value arrays".into(),
        ));
    }
    let mut tags = Tags::with_capacity(keys.len());
    for (&key, &value) in keys.iter().zip(vals) {
        tags.push(Tag {
            key: ctx.strings.get(key as usize)?,
            value: ctx.strings.get(value as usize)?,
        });
    }
    Ok(tags)
}

fn decode_nodes(
    ctx: &BlockContext,
    nodes: &[model::Node],
    out: &mut Vec<Entity>,
) -> Result<()> {
    for node in nodes {
        let info = decode_info(ctx, node.info.as_ref())?;
        let location = if info.visible {
            ctx.location(node.lon, node.lat)?
        } else {
            Location::undefined()
        };
        out.push(Entity::Node(Node {
            id: node.id,
            location,
            tags: decode_tags(ctx, &node.keys, &node.vals)?,
            info,
        }));
    }
    Ok(())
}

fn decode_ways(ctx: &BlockContext, ways: &[model::Way], out: &mut Vec<Entity>) -> Result<()> {
    for way in ways {
        let mut last = 0_i64;
        let refs = way
            .refs
            .iter()
            .map(|delta| {
                last += delta;
                last
            })
            .collect();
        out.push(Entity::Way(Way {
            id: way.id,
            tags: decode_tags(ctx, &way.keys, &way.vals)?,
            info: decode_info(ctx, way.info.as_ref())?,
            refs,
        }));
    }
    Ok(())
}

fn decode_relations(
    ctx: &BlockContext,
    relations: &[model::Relation],
    out: &mut Vec<Entity>,
) -> Result<()> {
    for relation in relations {
        if relation.memids.len() != relation.types.len()
            || relation.memids.len() != relation.roles_sid.len()
        {
            return Err(CodecError::Corrupt(
                "mismatched relation member arrays".into(),
            ));
        }

        let mut last = 0_i64;
        let mut members = Vec::with_capacity(relation.memids.len());
        for ((delta, &member_type), &role_sid) in relation
            .memids
            .iter()
            .zip(&relation.types)
            .zip(&relation.roles_sid)
        {
            last += delta;
            let member_type = MemberType::try_from(member_type).map_err(|_| {
                CodecError::Corrupt(format!("unknown relation member type: {member_type}"))
            })?;
            if role_sid < 0 {
                return Err(CodecError::Corrupt(format!(
                    "negative role string index: {role_sid}"
                )));
            }
            members.push(RelationMember {
                kind: EntityKind::from(member_type),
                ref_id: last,
                role: ctx.strings.get(role_sid as usize)?,
            });
        }

        out.push(Entity::Relation(Relation {
            id: relation.id,
            tags: decode_tags(ctx, &relation.keys, &relation.vals)?,
            info: decode_info(ctx, relation.info.as_ref())?,
            members,
        }));
    }
    Ok(())
}

/// The dense node inner loop: seven parallel delta streams sharing one
/// running accumulator set, plus a flat 0-delimited tag stream.
fn decode_dense(
    ctx: &BlockContext,
    dense: &model::DenseNodes,
    out: &mut Vec<Entity>,
) -> Result<()> {
    let count = dense.id.len();
    if dense.lat.len() != count || dense.lon.len() != count {
        return Err(CodecError::Corrupt("mismatched dense node arrays".into()));
    }
    if let Some(info) = dense.denseinfo.as_ref() {
        let parallel = info.version.len() == count
            && info.timestamp.len() == count
            && info.changeset.len() == count
            && info.uid.len() == count
            && info.user_sid.len() == count
            && (info.visible.is_empty() || info.visible.len() == count);
        if !parallel {
            return Err(CodecError::Corrupt("mismatched dense info arrays".into()));
        }
    }

    let mut id = 0_i64;
    let mut lat = 0_i64;
    let mut lon = 0_i64;
    let mut uid = 0_i64;
    let mut user_sid = 0_i64;
    let mut changeset = 0_i64;
    let mut timestamp = 0_i64;
    let mut tag_cursor = 0_usize;

    for i in 0..count {
        id += dense.id[i];
        lat += dense.lat[i];
        lon += dense.lon[i];

        let mut visible = true;
        let info = match dense.denseinfo.as_ref() {
            Some(dense_info) => {
                changeset += dense_info.changeset[i];
                timestamp += dense_info.timestamp[i];
                uid += i64::from(dense_info.uid[i]);
                user_sid += i64::from(dense_info.user_sid[i]);
                if !dense_info.visible.is_empty() {
                    visible = dense_info.visible[i];
                }

                // Version is absolute, everything above is delta coded.
                let version = dense_info.version[i];
                if version <= 0 {
                    return Err(CodecError::Corrupt(format!(
                        "invalid dense node version: {version}"
                    )));
                }
                if changeset < 0 || timestamp < 0 || uid < -1 || user_sid < 0 {
                    return Err(CodecError::Corrupt(format!(
                        "inconsistent dense metadata for node {id}"
                    )));
                }

                Info {
                    version: version as u32,
                    changeset: u32::try_from(changeset).map_err(|_| {
                        CodecError::Corrupt(format!("changeset out of range: {changeset}"))
                    })?,
                    timestamp: ctx.timestamp(timestamp),
                    uid: i32::try_from(uid)
                        .map_err(|_| CodecError::Corrupt(format!("uid out of range: {uid}")))?,
                    user: ctx.strings.get(user_sid as usize)?,
                    visible,
                }
            }
            None => Info::default(),
        };

        let location = if visible {
            ctx.location(lon, lat)?
        } else {
            Location::undefined()
        };
        let tags = decode_dense_tags(ctx, &dense.keys_vals, &mut tag_cursor)?;

        out.push(Entity::Node(Node {
            id,
            location,
            tags,
            info,
        }));
    }

    Ok(())
}

/// Consumes one node's tag segment from the shared key/value stream.
///
/// Each segment is a run of (key, value) string ids ended by a single 0
/// sentinel. Older writers omit the stream entirely; an exhausted cursor
/// means no tags for every remaining node.
fn decode_dense_tags(ctx: &BlockContext, keys_vals: &[i32], cursor: &mut usize) -> Result<Tags> {
    let mut tags = Tags::new();
    while *cursor < keys_vals.len() {
        let key_sid = keys_vals[*cursor];
        *cursor += 1;
        if key_sid == 0 {
            break;
        }
        let value_sid = *keys_vals.get(*cursor).ok_or_else(|| {
            CodecError::Corrupt("dangling key in dense tag stream".into())
        })?;
        *cursor += 1;
        if key_sid < 0 || value_sid < 0 {
            return Err(CodecError::Corrupt(format!(
                "negative string table index: {}",
                key_sid.min(value_sid)
            )));
        }
        tags.push(Tag {
            key: ctx.strings.get(key_sid as usize)?,
            value: ctx.strings.get(value_sid as usize)?,
        });
    }
    Ok(tags)
}
