//! Named instances on disk.
//!
//! An instance is a directory plus a name; every file of the instance is
//! `<dir>/<name>.<ext>`:
//!
//! | ext         | content                                  |
//! |-------------|------------------------------------------|
//! | `epg`       | binary topology ([`crate::codec`])       |
//! | `geometry`  | WKT geometry per edge                    |
//! | `cost`      | edge length / cost                       |
//! | `wayids`    | upstream way identifier                  |
//! | `sourceid`  | upstream source node id                  |
//! | `destid`    | upstream destination node id             |
//! | `seeds`     | sparse known states                      |
//! | `state`     | propagated state (output)                |

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::attrs::{self, AttributeColumn, AttributeValue, EdgeAttribute, EdgeAttributes, StateLabel};
use crate::codec;
use crate::error::{Error, Result};
use crate::graph::{EdgeId, GraphStore};

/// Extension of the binary topology file.
pub const TOPOLOGY_EXT: &str = "epg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    dir: PathBuf,
    name: String,
}

impl Instance {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the instance file with extension `ext`.
    #[must_use]
    pub fn path(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", self.name))
    }

    #[must_use]
    pub fn topology_path(&self) -> PathBuf {
        self.path(TOPOLOGY_EXT)
    }

    #[must_use]
    pub fn attribute_path(&self, attribute: EdgeAttribute) -> PathBuf {
        self.path(attribute.extension())
    }

    /// Read and decode the topology.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] when the file is missing, [`Error::Codec`] when it is
    /// not a valid topology file.
    #[instrument(skip(self), fields(instance = %self.name))]
    pub fn load_topology(&self) -> Result<GraphStore> {
        let path = self.topology_path();
        let bytes = fs::read(&path).map_err(|e| Error::read(&path, e))?;
        let graph = codec::decode_topology(&bytes)?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "topology loaded"
        );
        Ok(graph)
    }

    /// Encode and write the topology.
    ///
    /// # Errors
    ///
    /// [`Error::Write`] when the file cannot be written.
    pub fn save_topology(&self, graph: &GraphStore) -> Result<()> {
        let path = self.topology_path();
        write_file(&path, &codec::encode_topology(graph))
    }

    /// Load every input attribute side file that exists.
    ///
    /// Missing side files are skipped; a present file must cover every edge.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] for unreadable files and [`Error::Integrity`] for
    /// files that do not match the edge set.
    #[instrument(skip(self, graph), fields(instance = %self.name))]
    pub fn load_attributes(&self, graph: &GraphStore) -> Result<EdgeAttributes> {
        let edge_count = graph.edge_count();
        let mut table = EdgeAttributes::new(edge_count);

        for attribute in EdgeAttribute::INPUTS {
            let path = self.attribute_path(attribute);
            let Some(text) = read_optional(&path)? else {
                debug!(attribute = attribute.name(), "side file absent");
                continue;
            };
            match attribute {
                EdgeAttribute::Geometry => {
                    table.attach_geometry(AttributeColumn::parse(attribute, &text, edge_count)?)?;
                }
                EdgeAttribute::Cost => {
                    table.attach_cost(AttributeColumn::parse(attribute, &text, edge_count)?)?;
                }
                EdgeAttribute::WayId => {
                    table.attach_way_id(AttributeColumn::parse(attribute, &text, edge_count)?)?;
                }
                EdgeAttribute::SourceId => {
                    table.attach_source_id(AttributeColumn::parse(attribute, &text, edge_count)?)?;
                }
                EdgeAttribute::DestId => {
                    table.attach_dest_id(AttributeColumn::parse(attribute, &text, edge_count)?)?;
                }
                EdgeAttribute::Seeds | EdgeAttribute::State => {}
            }
        }

        debug!(attached = ?table.attached(), "attributes loaded");
        Ok(table)
    }

    /// Load the sparse known-seed file, or an empty map when absent.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] for unreadable files and [`Error::Integrity`] for
    /// malformed, duplicate or out-of-range records.
    pub fn load_seeds(&self, graph: &GraphStore) -> Result<BTreeMap<EdgeId, usize>> {
        let path = self.attribute_path(EdgeAttribute::Seeds);
        let Some(text) = read_optional(&path)? else {
            return Ok(BTreeMap::new());
        };
        let records =
            attrs::parse_records::<StateLabel>(EdgeAttribute::Seeds, &text, graph.edge_count())?;
        Ok(records
            .into_iter()
            .map(|(edge, state)| (edge, state as usize))
            .collect())
    }

    /// Write a dense column to its side file.
    ///
    /// # Errors
    ///
    /// [`Error::Write`] when the file cannot be written.
    pub fn write_column<T: AttributeValue>(&self, column: &AttributeColumn<T>) -> Result<PathBuf> {
        let path = self.attribute_path(column.attribute());
        write_file(&path, column.to_side_file().as_bytes())?;
        Ok(path)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::read(path, e)),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }
    }
    fs::write(path, bytes).map_err(|e| Error::write(path, e))
}

/// Convert a text edge list (plus optional node list) into a topology file.
///
/// # Errors
///
/// Fails when inputs cannot be read, the edge list is invalid, or the output
/// cannot be written.
#[instrument]
pub fn convert_edge_list(edges: &Path, nodes: Option<&Path>, output: &Path) -> Result<GraphStore> {
    let edge_text = fs::read_to_string(edges).map_err(|e| Error::read(edges, e))?;
    let node_text = match nodes {
        Some(path) => Some(fs::read_to_string(path).map_err(|e| Error::read(path, e))?),
        None => None,
    };
    let graph = codec::parse_edge_list(&edge_text, node_text.as_deref())?;
    write_file(output, &codec::encode_topology(&graph))?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        output = %output.display(),
        "topology written"
    );
    Ok(graph)
}
