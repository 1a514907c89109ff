//! Binary topology format (`.epg`) and the text edge-list importer.
//!
//! # Layout
//!
//! ```text
//! 4 bytes   magic "EPGB"
//! 1 byte    version
//! 3 bytes   reserved (zero)
//! varint    node_count
//! node_count × (varint len, len bytes UTF-8 key)
//! varint    edge_count
//! edge_count × (varint u_index, varint v_index)
//! 32 bytes  BLAKE3 digest of everything above
//! ```
//!
//! Varints are unsigned LEB128. Edge ids are the order edges appear in the
//! file, so decoding reproduces the exact id assignment that was encoded.

use petgraph::graph::NodeIndex;
use tracing::{debug, instrument};

use crate::error::IntegrityError;
use crate::graph::{GraphBuilder, GraphStore};

/// Magic bytes at the start of every topology file.
pub const MAGIC: [u8; 4] = *b"EPGB";

/// Current format version.
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = 8;
const DIGEST_LEN: usize = 32;

/// Errors returned while decoding a topology file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid magic bytes: expected EPGB, got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported topology format version {0}: maximum supported is {VERSION}")]
    UnsupportedVersion(u8),

    #[error("unexpected end of topology data")]
    UnexpectedEof,

    #[error("topology checksum mismatch")]
    ChecksumMismatch,

    #[error("topology data is corrupted: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

// ---------------------------------------------------------------------------
// Varints
// ---------------------------------------------------------------------------

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Cursor over the payload section of a topology file.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn varint(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(CodecError::Corrupted("varint longer than 64 bits".into()));
            }
        }
    }

    fn usize(&mut self) -> Result<usize, CodecError> {
        let raw = self.varint()?;
        usize::try_from(raw).map_err(|_| CodecError::Corrupted(format!("count {raw} overflows")))
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let slice = self.data.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    const fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serialize a graph into the binary topology format.
#[must_use]
pub fn encode_topology(graph: &GraphStore) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + graph.node_count() * 12 + graph.edge_count() * 6);
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&[0, 0, 0]);

    put_varint(&mut buf, graph.node_count() as u64);
    for node in graph.nodes() {
        let key = graph.node_key(node).unwrap_or_default();
        put_varint(&mut buf, key.len() as u64);
        buf.extend_from_slice(key.as_bytes());
    }

    put_varint(&mut buf, graph.edge_count() as u64);
    for edge in graph.edges() {
        if let Some((u, v)) = graph.endpoints(edge) {
            put_varint(&mut buf, u.index() as u64);
            put_varint(&mut buf, v.index() as u64);
        }
    }

    let digest = blake3::hash(&buf);
    buf.extend_from_slice(digest.as_bytes());
    buf
}

/// Decode a binary topology file.
///
/// # Errors
///
/// Returns [`CodecError`] for bad magic, unsupported version, truncated data,
/// checksum mismatch, node indices outside the node table, or duplicate node
/// keys.
#[instrument(skip(data), fields(bytes = data.len()))]
pub fn decode_topology(data: &[u8]) -> Result<GraphStore, CodecError> {
    if data.len() < HEADER_LEN + DIGEST_LEN {
        return Err(CodecError::UnexpectedEof);
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&data[..4]);
    if magic != MAGIC {
        return Err(CodecError::InvalidMagic(magic));
    }
    if data[4] == 0 || data[4] > VERSION {
        return Err(CodecError::UnsupportedVersion(data[4]));
    }

    let (body, digest) = data.split_at(data.len() - DIGEST_LEN);
    if blake3::hash(body).as_bytes() != digest {
        return Err(CodecError::ChecksumMismatch);
    }

    let mut reader = Reader::new(&body[HEADER_LEN..]);

    let node_count = reader.usize()?;
    // Each node needs at least one byte, so a larger count is corrupt.
    if node_count > body.len() {
        return Err(CodecError::Corrupted(format!("node count {node_count} exceeds payload")));
    }
    let mut keys = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let len = reader.usize()?;
        let raw = reader.bytes(len)?;
        let key = std::str::from_utf8(raw)
            .map_err(|e| CodecError::Corrupted(format!("node key is not UTF-8: {e}")))?;
        keys.push(key.to_string());
    }

    let edge_count = reader.usize()?;
    if edge_count > body.len() {
        return Err(CodecError::Corrupted(format!("edge count {edge_count} exceeds payload")));
    }
    let mut builder = GraphBuilder::with_capacity(node_count, edge_count);
    for (i, key) in keys.iter().enumerate() {
        if builder.add_node(key) != NodeIndex::new(i) {
            return Err(CodecError::Corrupted(format!("duplicate node key {key:?}")));
        }
    }

    let key_at = |idx: usize| {
        keys.get(idx)
            .ok_or_else(|| CodecError::Corrupted(format!("node index {idx} out of range")))
    };
    for _ in 0..edge_count {
        let u = reader.usize()?;
        let v = reader.usize()?;
        builder.add_edge(key_at(u)?, key_at(v)?);
    }

    if !reader.is_at_end() {
        return Err(CodecError::Corrupted("trailing bytes after edge table".into()));
    }

    let graph = builder.build()?;
    debug!(nodes = graph.node_count(), edges = graph.edge_count(), "topology decoded");
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Text edge list
// ---------------------------------------------------------------------------

/// Build a graph from a text edge list.
///
/// `edges` holds one `u v` pair per line; `#` comments and blank lines are
/// ignored. When `nodes` is given it lists every node key (one per line) and
/// edges may only reference those keys; otherwise nodes are declared in
/// first-appearance order.
///
/// # Errors
///
/// Returns [`IntegrityError::MalformedRecord`] for lines that are not a pair,
/// and [`IntegrityError::UnknownNode`] when a node list is given and an edge
/// references a key outside it.
pub fn parse_edge_list(edges: &str, nodes: Option<&str>) -> Result<GraphStore, IntegrityError> {
    let mut builder = GraphBuilder::new();

    let declared = nodes.is_some();
    if let Some(nodes) = nodes {
        for key in content_lines(nodes) {
            builder.add_node(key);
        }
    }

    for (line_no, line) in edges.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(u), Some(v), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(IntegrityError::MalformedRecord {
                attribute: "edges",
                line: line_no + 1,
                reason: "expected `<u> <v>`".to_string(),
            });
        };
        if !declared {
            builder.add_node(u);
            builder.add_node(v);
        }
        builder.add_edge(u, v);
    }

    builder.build()
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}
