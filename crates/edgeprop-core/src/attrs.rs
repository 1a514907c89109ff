//! Typed per-edge attribute tables.
//!
//! Each attribute the upstream network carries (geometry, cost, way id,
//! endpoint ids) and the `state` attribute produced by propagation lives in
//! its own strongly-typed [`AttributeColumn`], keyed by edge id.
//!
//! Side files share one line format: `<edge_id>\t<value>`. Dense columns must
//! contain every edge exactly once; sparse columns (known seeds) may skip
//! edges.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::IntegrityError;
use crate::graph::EdgeId;

/// Integer state label in `[0, K)`.
pub type StateLabel = u32;

/// The per-edge attributes an instance may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeAttribute {
    Geometry,
    Cost,
    WayId,
    SourceId,
    DestId,
    Seeds,
    State,
}

impl EdgeAttribute {
    /// Attributes read from the upstream collaborator.
    pub const INPUTS: [Self; 5] = [
        Self::Geometry,
        Self::Cost,
        Self::WayId,
        Self::SourceId,
        Self::DestId,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Geometry => "geometry",
            Self::Cost => "cost",
            Self::WayId => "wayid",
            Self::SourceId => "sourceid",
            Self::DestId => "destid",
            Self::Seeds => "seeds",
            Self::State => "state",
        }
    }

    /// File extension of the side file holding this attribute.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::WayId => "wayids",
            other => other.name(),
        }
    }
}

/// A value type that can be stored in an attribute column.
pub trait AttributeValue: Sized + Clone {
    /// Parse the value part of a side-file record.
    ///
    /// # Errors
    ///
    /// Returns a short reason when `raw` is not a valid value.
    fn parse_value(raw: &str) -> Result<Self, String>;

    /// Render the value for a side-file record. Must not contain newlines.
    fn format_value(&self) -> String;
}

impl AttributeValue for String {
    fn parse_value(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn format_value(&self) -> String {
        self.replace(['\n', '\r'], " ")
    }
}

impl AttributeValue for f64 {
    fn parse_value(raw: &str) -> Result<Self, String> {
        raw.trim()
            .parse::<Self>()
            .map_err(|e| format!("invalid float {raw:?}: {e}"))
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl AttributeValue for StateLabel {
    fn parse_value(raw: &str) -> Result<Self, String> {
        raw.trim()
            .parse::<Self>()
            .map_err(|e| format!("invalid state {raw:?}: {e}"))
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

// ---------------------------------------------------------------------------
// AttributeColumn
// ---------------------------------------------------------------------------

/// One dense, typed attribute: a value for every edge id.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeColumn<T> {
    attribute: EdgeAttribute,
    values: Vec<T>,
}

impl<T: AttributeValue> AttributeColumn<T> {
    #[must_use]
    pub const fn new(attribute: EdgeAttribute, values: Vec<T>) -> Self {
        Self { attribute, values }
    }

    #[must_use]
    pub const fn attribute(&self) -> EdgeAttribute {
        self.attribute
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, edge: EdgeId) -> Option<&T> {
        self.values.get(edge)
    }

    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Parse a dense side file covering `edge_count` edges.
    ///
    /// # Errors
    ///
    /// Fails on malformed lines, unknown or repeated edge ids, and when the
    /// record count differs from `edge_count`.
    pub fn parse(
        attribute: EdgeAttribute,
        text: &str,
        edge_count: usize,
    ) -> Result<Self, IntegrityError> {
        let sparse = parse_records::<T>(attribute, text, edge_count)?;
        if sparse.len() != edge_count {
            return Err(IntegrityError::RecordCountMismatch {
                attribute: attribute.name(),
                expected: edge_count,
                actual: sparse.len(),
            });
        }
        // Keys are exactly 0..edge_count, so BTreeMap order is edge-id order.
        Ok(Self::new(attribute, sparse.into_values().collect()))
    }

    /// Render as side-file text.
    #[must_use]
    pub fn to_side_file(&self) -> String {
        let mut out = String::new();
        for (id, value) in self.values.iter().enumerate() {
            let _ = writeln!(out, "{id}\t{}", value.format_value());
        }
        out
    }
}

/// Parse side-file records into an edge-id map.
///
/// Blank lines and lines starting with `#` are skipped. The edge id is
/// separated from the value by a tab or, failing that, the first whitespace
/// run.
///
/// # Errors
///
/// Fails on malformed lines and on unknown or repeated edge ids.
pub fn parse_records<T: AttributeValue>(
    attribute: EdgeAttribute,
    text: &str,
    edge_count: usize,
) -> Result<BTreeMap<EdgeId, T>, IntegrityError> {
    let mut records = BTreeMap::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = |reason: String| IntegrityError::MalformedRecord {
            attribute: attribute.name(),
            line: line_no + 1,
            reason,
        };

        let (raw_id, raw_value) = line
            .split_once('\t')
            .or_else(|| line.trim_start().split_once(char::is_whitespace))
            .ok_or_else(|| malformed("expected `<edge_id>\\t<value>`".to_string()))?;
        let id: EdgeId = raw_id
            .trim()
            .parse()
            .map_err(|e| malformed(format!("invalid edge id {raw_id:?}: {e}")))?;
        if id >= edge_count {
            return Err(IntegrityError::UnknownEdge {
                attribute: attribute.name(),
                id,
            });
        }
        let value = T::parse_value(raw_value).map_err(malformed)?;
        if records.insert(id, value).is_some() {
            return Err(IntegrityError::DuplicateRecord {
                attribute: attribute.name(),
                id,
            });
        }
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// EdgeAttributes
// ---------------------------------------------------------------------------

/// The attribute table of one graph: one optional typed column per attribute.
#[derive(Debug, Clone, Default)]
pub struct EdgeAttributes {
    edge_count: usize,
    geometry: Option<AttributeColumn<String>>,
    cost: Option<AttributeColumn<f64>>,
    way_id: Option<AttributeColumn<String>>,
    source_id: Option<AttributeColumn<String>>,
    dest_id: Option<AttributeColumn<String>>,
    state: Option<AttributeColumn<StateLabel>>,
}

macro_rules! column_accessors {
    ($($field:ident, $attach:ident: $ty:ty;)*) => {
        $(
            #[must_use]
            pub const fn $field(&self) -> Option<&AttributeColumn<$ty>> {
                self.$field.as_ref()
            }

            /// Attach this column, replacing any previous one.
            ///
            /// # Errors
            ///
            /// Fails when the column length differs from the edge count.
            pub fn $attach(&mut self, column: AttributeColumn<$ty>) -> Result<(), IntegrityError> {
                self.check_len(&column)?;
                self.$field = Some(column);
                Ok(())
            }
        )*
    };
}

impl EdgeAttributes {
    #[must_use]
    pub fn new(edge_count: usize) -> Self {
        Self {
            edge_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    column_accessors! {
        geometry, attach_geometry: String;
        cost, attach_cost: f64;
        way_id, attach_way_id: String;
        source_id, attach_source_id: String;
        dest_id, attach_dest_id: String;
        state, attach_state: StateLabel;
    }

    /// Names of the attached columns.
    #[must_use]
    pub fn attached(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.geometry.is_some() {
            names.push(EdgeAttribute::Geometry.name());
        }
        if self.cost.is_some() {
            names.push(EdgeAttribute::Cost.name());
        }
        if self.way_id.is_some() {
            names.push(EdgeAttribute::WayId.name());
        }
        if self.source_id.is_some() {
            names.push(EdgeAttribute::SourceId.name());
        }
        if self.dest_id.is_some() {
            names.push(EdgeAttribute::DestId.name());
        }
        if self.state.is_some() {
            names.push(EdgeAttribute::State.name());
        }
        names
    }

    fn check_len<T: AttributeValue>(&self, column: &AttributeColumn<T>) -> Result<(), IntegrityError> {
        if column.len() == self.edge_count {
            Ok(())
        } else {
            Err(IntegrityError::RecordCountMismatch {
                attribute: column.attribute().name(),
                expected: self.edge_count,
                actual: column.len(),
            })
        }
    }
}
