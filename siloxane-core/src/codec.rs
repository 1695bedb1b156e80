//! Canonical byte encoding of backing trees.
//!
//! Fixed-size values are written inline. A sequence that mixes fixed and
//! variable-size parts (container fields, or elements of a variable-size
//! element type) starts with a fixed region holding each fixed part inline
//! and a 4-byte little-endian offset for each variable part; the variable
//! payloads follow in order. Offsets are relative to the start of the
//! sequence, and the last payload runs to the end of the buffer.

use tracing::trace;

use crate::error::{DecodeError, Result, SszError};
use crate::gindex::GIndex;
use crate::hash::BYTES_PER_CHUNK;
use crate::node::Node;
use crate::schema::{BYTES_PER_OFFSET, BYTES_PER_SELECTOR, Schema};
use crate::value::{pack_bytes, split_length, unpack_bytes};

/// Encodes the value of `schema` held by `node`.
pub fn encode(schema: &Schema, node: &Node) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(schema, node, &mut out)?;
    Ok(out)
}

/// Appends the encoding of the value of `schema` held by `node` to `out`.
pub fn encode_into(schema: &Schema, node: &Node, out: &mut Vec<u8>) -> Result<()> {
    match schema {
        Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => {
            let chunk = node.chunk().ok_or(SszError::MissingNode(GIndex::ROOT))?;
            let size = schema.basic_size().unwrap_or(BYTES_PER_CHUNK);
            out.extend_from_slice(&chunk[..size]);
        }
        Schema::ByteVector(len) => {
            let count = len.div_ceil(BYTES_PER_CHUNK);
            let chunks = node.collect_chunks(schema.data_depth(), count)?;
            out.extend_from_slice(&unpack_bytes(&chunks, *len));
        }
        Schema::ByteList(max_len) => {
            let (data, len) = split_length(node)?;
            if len > *max_len {
                return Err(SszError::CollectionTooLong { len, max: *max_len });
            }
            let len = len as usize;
            let count = len.div_ceil(BYTES_PER_CHUNK);
            let chunks = data.collect_chunks(schema.data_depth(), count)?;
            out.extend_from_slice(&unpack_bytes(&chunks, len));
        }
        Schema::Vector(vector) => {
            encode_elements(vector.element(), vector.data_depth(), node, vector.len(), out)?;
        }
        Schema::List(list) => {
            let (data, len) = split_length(node)?;
            if len > list.max_len() {
                return Err(SszError::CollectionTooLong {
                    len,
                    max: list.max_len(),
                });
            }
            encode_elements(list.element(), list.data_depth(), &data, len as usize, out)?;
        }
        Schema::Union(union) => {
            let (value, selector) = node
                .children()
                .ok_or(SszError::MissingNode(GIndex::ROOT.left()))?;
            let selector = selector
                .read_u64()
                .ok_or(SszError::MissingNode(GIndex::ROOT.right()))?;
            let selector = u8::try_from(selector).map_err(|_| SszError::InvalidSelector {
                selector,
                variants: union.len(),
            })?;
            let variant = union.variant(selector)?;
            out.push(selector);
            encode_into(variant, &value, out)?;
        }
        Schema::Container(container) => {
            let nodes = node.collect_nodes(container.depth(), container.len())?;
            let parts: Vec<(&Schema, &Node)> = container
                .fields()
                .map(|(_, field)| field)
                .zip(&nodes)
                .collect();
            encode_sequence(&parts, out)?;
        }
    }
    Ok(())
}

fn encode_elements(
    element: &Schema,
    depth: u32,
    data: &Node,
    len: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    match element.basic_size() {
        Some(size) => {
            let bytes = len * size;
            let chunks = data.collect_chunks(depth, bytes.div_ceil(BYTES_PER_CHUNK))?;
            out.extend_from_slice(&unpack_bytes(&chunks, bytes));
            Ok(())
        }
        None => {
            let nodes = data.collect_nodes(depth, len)?;
            let parts: Vec<(&Schema, &Node)> = nodes.iter().map(|node| (element, node)).collect();
            encode_sequence(&parts, out)
        }
    }
}

/// Writes a fixed region of inline parts and offsets, then the variable payloads.
fn encode_sequence(parts: &[(&Schema, &Node)], out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    let mut pending = Vec::new();
    for &(schema, node) in parts {
        if schema.is_fixed_size() {
            encode_into(schema, node, out)?;
        } else {
            pending.push((out.len(), schema, node));
            out.extend_from_slice(&[0u8; BYTES_PER_OFFSET]);
        }
    }
    for (slot, schema, node) in pending {
        let offset = out.len() - start;
        let encoded = u32::try_from(offset).map_err(|_| SszError::OffsetOverflow(offset))?;
        out[slot..slot + BYTES_PER_OFFSET].copy_from_slice(&encoded.to_le_bytes());
        encode_into(schema, node, out)?;
    }
    Ok(())
}

/// Decodes `bytes` as a value of `schema` into a backing tree.
///
/// Error positions are byte offsets into `bytes`.
pub fn decode(schema: &Schema, bytes: &[u8]) -> std::result::Result<Node, DecodeError> {
    trace!(schema = %schema, len = bytes.len(), "decoding");
    decode_at(schema, bytes, 0)
}

type Decoded<T> = std::result::Result<T, DecodeError>;

/// Decodes `bytes`, which start at absolute position `base` of the outer buffer.
fn decode_at(schema: &Schema, bytes: &[u8], base: usize) -> Decoded<Node> {
    match schema {
        Schema::Bool | Schema::Uint8 | Schema::Uint64 | Schema::Uint256 => {
            let size = schema.basic_size().unwrap_or(BYTES_PER_CHUNK);
            expect_len(bytes, size, base)?;
            if matches!(schema, Schema::Bool) {
                check_bools(bytes, base)?;
            }
            let mut chunk = [0u8; BYTES_PER_CHUNK];
            chunk[..size].copy_from_slice(bytes);
            Ok(Node::leaf(chunk))
        }
        Schema::ByteVector(len) => {
            expect_len(bytes, *len, base)?;
            tree(schema.data_depth(), &leaves(bytes), base)
        }
        Schema::ByteList(max_len) => {
            check_count(bytes.len() as u64, *max_len, base)?;
            let data = tree(schema.data_depth(), &leaves(bytes), base)?;
            Ok(Node::branch(data, Node::from_u64(bytes.len() as u64)))
        }
        Schema::Vector(vector) => decode_elements(
            vector.element(),
            vector.data_depth(),
            bytes,
            base,
            Count::Exact(vector.len()),
        ),
        Schema::List(list) => {
            let (data, len) = decode_elements_counted(
                list.element(),
                list.data_depth(),
                bytes,
                base,
                Count::AtMost(list.max_len()),
            )?;
            Ok(Node::branch(data, Node::from_u64(len as u64)))
        }
        Schema::Union(union) => {
            let Some((&selector, rest)) = bytes.split_first() else {
                return Err(DecodeError::InvalidLength {
                    position: base,
                    expected: BYTES_PER_SELECTOR,
                    actual: 0,
                });
            };
            let variant = union
                .variants()
                .get(selector as usize)
                .ok_or(DecodeError::InvalidSelector {
                    position: base,
                    selector,
                    variants: union.len(),
                })?;
            let value = decode_at(variant, rest, base + BYTES_PER_SELECTOR)?;
            Ok(Node::branch(value, Node::from_u64(selector as u64)))
        }
        Schema::Container(container) => {
            let fixed = container.fixed_region_size();
            if bytes.len() < fixed {
                return Err(DecodeError::Truncated {
                    position: base,
                    fixed,
                    actual: bytes.len(),
                });
            }
            let mut nodes: Vec<Option<Node>> = vec![None; container.len()];
            let mut offsets = Vec::new();
            let mut cursor = 0;
            for (index, (name, field)) in container.fields().enumerate() {
                match field.fixed_size() {
                    Some(size) => {
                        let node = decode_at(field, &bytes[cursor..cursor + size], base + cursor)
                            .map_err(|err| err.in_field(name))?;
                        nodes[index] = Some(node);
                        cursor += size;
                    }
                    None => {
                        offsets.push((index, read_offset(bytes, cursor), cursor));
                        cursor += BYTES_PER_OFFSET;
                    }
                }
            }
            if offsets.is_empty() {
                expect_len(bytes, fixed, base)?;
            }
            let ends = payload_ends(&offsets, fixed, bytes.len(), base)?;
            for (&(index, start, _), end) in offsets.iter().zip(ends) {
                let Some((name, field)) = container.field_at(index) else {
                    continue;
                };
                let node = decode_at(field, &bytes[start..end], base + start)
                    .map_err(|err| err.in_field(name))?;
                nodes[index] = Some(node);
            }
            let nodes: Vec<Node> = nodes.into_iter().flatten().collect();
            tree(container.depth(), &nodes, base)
        }
    }
}

#[derive(Clone, Copy)]
enum Count {
    Exact(usize),
    AtMost(u64),
}

fn decode_elements(
    element: &Schema,
    depth: u32,
    bytes: &[u8],
    base: usize,
    count: Count,
) -> Decoded<Node> {
    decode_elements_counted(element, depth, bytes, base, count).map(|(node, _)| node)
}

/// Decodes a run of elements into a data subtree, returning it with the element count.
fn decode_elements_counted(
    element: &Schema,
    depth: u32,
    bytes: &[u8],
    base: usize,
    count: Count,
) -> Decoded<(Node, usize)> {
    if let Some(size) = element.fixed_size() {
        if bytes.len() % size != 0 {
            return Err(DecodeError::NotMultiple {
                position: base,
                len: bytes.len(),
                size,
            });
        }
        let len = bytes.len() / size;
        match count {
            Count::Exact(expected) => expect_len(bytes, expected * size, base)?,
            Count::AtMost(max) => check_count(len as u64, max, base)?,
        }
        if element.is_basic() {
            if matches!(element, Schema::Bool) {
                check_bools(bytes, base)?;
            }
            return Ok((tree(depth, &leaves(bytes), base)?, len));
        }
        let nodes = bytes
            .chunks_exact(size)
            .enumerate()
            .map(|(i, piece)| {
                decode_at(element, piece, base + i * size).map_err(|err| err.in_element(i))
            })
            .collect::<Decoded<Vec<_>>>()?;
        return Ok((tree(depth, &nodes, base)?, len));
    }

    if bytes.is_empty() {
        return match count {
            Count::Exact(expected) => Err(DecodeError::Truncated {
                position: base,
                fixed: expected * BYTES_PER_OFFSET,
                actual: 0,
            }),
            Count::AtMost(_) => Ok((Node::zero(depth), 0)),
        };
    }
    if bytes.len() < BYTES_PER_OFFSET {
        return Err(DecodeError::Truncated {
            position: base,
            fixed: BYTES_PER_OFFSET,
            actual: bytes.len(),
        });
    }
    let first = read_offset(bytes, 0);
    let len = first / BYTES_PER_OFFSET;
    let expected = match count {
        Count::Exact(expected) => expected * BYTES_PER_OFFSET,
        Count::AtMost(_) => len.max(1) * BYTES_PER_OFFSET,
    };
    if first != expected {
        return Err(DecodeError::FirstOffsetMismatch {
            position: base,
            offset: first,
            expected,
        });
    }
    if first > bytes.len() {
        return Err(DecodeError::OffsetOutOfBounds {
            position: base,
            offset: first,
            len: bytes.len(),
        });
    }
    if let Count::AtMost(max) = count {
        check_count(len as u64, max, base)?;
    }
    let offsets: Vec<(usize, usize, usize)> = (0..len)
        .map(|i| {
            let at = i * BYTES_PER_OFFSET;
            (i, read_offset(bytes, at), at)
        })
        .collect();
    let ends = payload_ends(&offsets, first, bytes.len(), base)?;
    let nodes = offsets
        .iter()
        .zip(ends)
        .map(|(&(i, start, _), end)| {
            decode_at(element, &bytes[start..end], base + start).map_err(|err| err.in_element(i))
        })
        .collect::<Decoded<Vec<_>>>()?;
    Ok((tree(depth, &nodes, base)?, len))
}

/// Validates `(item, offset, offset_position)` entries against the fixed
/// region and buffer, returning where each payload ends.
fn payload_ends(
    offsets: &[(usize, usize, usize)],
    fixed: usize,
    total: usize,
    base: usize,
) -> Decoded<Vec<usize>> {
    let mut previous = fixed;
    for (i, &(_, offset, at)) in offsets.iter().enumerate() {
        if i == 0 && offset != fixed {
            return Err(DecodeError::FirstOffsetMismatch {
                position: base + at,
                offset,
                expected: fixed,
            });
        }
        if offset > total {
            return Err(DecodeError::OffsetOutOfBounds {
                position: base + at,
                offset,
                len: total,
            });
        }
        if offset < previous {
            return Err(DecodeError::OffsetsNotMonotonic {
                position: base + at,
                offset,
                previous,
            });
        }
        previous = offset;
    }
    Ok(offsets
        .iter()
        .skip(1)
        .map(|&(_, offset, _)| offset)
        .chain((!offsets.is_empty()).then_some(total))
        .collect())
}

fn read_offset(bytes: &[u8], at: usize) -> usize {
    let mut raw = [0u8; BYTES_PER_OFFSET];
    raw.copy_from_slice(&bytes[at..at + BYTES_PER_OFFSET]);
    u32::from_le_bytes(raw) as usize
}

fn expect_len(bytes: &[u8], expected: usize, base: usize) -> Decoded<()> {
    if bytes.len() != expected {
        return Err(DecodeError::InvalidLength {
            position: base,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn check_count(count: u64, max: u64, base: usize) -> Decoded<()> {
    if count > max {
        return Err(DecodeError::TooLong {
            position: base,
            count,
            max,
        });
    }
    Ok(())
}

fn check_bools(bytes: &[u8], base: usize) -> Decoded<()> {
    match bytes.iter().position(|&b| b > 1) {
        Some(i) => Err(DecodeError::InvalidBool {
            position: base + i,
            value: bytes[i],
        }),
        None => Ok(()),
    }
}

fn leaves(bytes: &[u8]) -> Vec<Node> {
    pack_bytes(bytes).into_iter().map(Node::leaf).collect()
}

/// Builds a data subtree from decoded parts. Counts are checked before this
/// point, so overflow is reported against the enclosing value.
fn tree(depth: u32, nodes: &[Node], base: usize) -> Decoded<Node> {
    Node::from_nodes(depth, nodes).map_err(|_| DecodeError::TooLong {
        position: base,
        count: nodes.len() as u64,
        max: 1u64.checked_shl(depth).unwrap_or(u64::MAX),
    })
}
