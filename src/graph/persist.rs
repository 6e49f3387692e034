//! Binary (de)serialization of the pathing graph
//!
//! Layout, little endian:
//!
//! ```text
//! magic "BNAV" | version u16
//! u32 node count, then per node:
//!     id u32 | occupant u32 (NONE = u32::MAX) | cluster u32 | tolerance f32 | position 3 x i16
//! per node, in the same order:
//!     u32 visible count,    (node u32, distance f32)*
//!     u32 arc count,        (id u32, type u8, target u32, weight f32)*
//!     u32 cluster count,    (type u8, actor u32, arc u32, node u32, target u32, weight f32)*
//!     u32 transition count,
//!         (id u32, type u8, u32 n, weight f32 * n, position 3 x i16 * n, u32 m, node u32 * m)*
//! u32 visible cluster pair count, (cluster u32, cluster u32)*
//! ```
//!
//! Positions are quantized to half a unit. Loading runs in two passes: every
//! node is constructed first, then the id based references are resolved.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use glam::Vec3;
use thiserror::Error;

use super::graph::PathingGraph;
use super::node::{
    ActorId, ArcId, ArcType, ClusterId, NodeId, PathingArc, PathingCluster, PathingNode,
    PathingTransition,
};

const MAGIC: &[u8; 4] = b"BNAV";
const VERSION: u16 = 1;
const NONE: u32 = u32::MAX;
/// Quantization steps per world unit
const QUANTUM: f32 = 2.0;

/// Errors raised while saving or loading a graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a pathing graph file")]
    BadMagic,
    #[error("unsupported graph version {0}")]
    Version(u16),
    #[error("unknown arc type code {0}")]
    ArcType(u8),
    #[error("{0} defined twice")]
    Duplicate(NodeId),
    #[error("{0} referenced but never defined")]
    Dangling(NodeId),
    #[error("{arc} on {node} is invalid")]
    InvalidArc { node: NodeId, arc: ArcId },
    #[error("transition {arc} on {node} has no matching arc")]
    OrphanTransition { node: NodeId, arc: ArcId },
    #[error("position {0} outside the quantization range")]
    OutOfRange(Vec3),
}

fn write_position<W: Write>(writer: &mut W, position: Vec3) -> Result<(), GraphError> {
    let limit = f32::from(i16::MAX) / QUANTUM;
    if position.abs().max_element() > limit {
        return Err(GraphError::OutOfRange(position));
    }
    for v in position.to_array() {
        writer.write_i16::<LE>((v * QUANTUM).round() as i16)?;
    }
    Ok(())
}

fn read_position<R: Read>(reader: &mut R) -> Result<Vec3, GraphError> {
    let x = f32::from(reader.read_i16::<LE>()?) / QUANTUM;
    let y = f32::from(reader.read_i16::<LE>()?) / QUANTUM;
    let z = f32::from(reader.read_i16::<LE>()?) / QUANTUM;
    Ok(Vec3::new(x, y, z))
}

fn write_actor<W: Write>(writer: &mut W, actor: Option<ActorId>) -> Result<(), GraphError> {
    writer.write_u32::<LE>(actor.map_or(NONE, |a| a.0))?;
    Ok(())
}

fn read_actor<R: Read>(reader: &mut R) -> Result<Option<ActorId>, GraphError> {
    Ok(match reader.read_u32::<LE>()? {
        NONE => None,
        id => Some(ActorId(id)),
    })
}

fn read_kind<R: Read>(reader: &mut R) -> Result<ArcType, GraphError> {
    let code = reader.read_u8()?;
    ArcType::from_code(code).ok_or(GraphError::ArcType(code))
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<(), GraphError> {
    writer.write_u32::<LE>(len as u32)?;
    Ok(())
}

impl PathingGraph {
    /// Serialize the graph into `writer`
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or a position cannot be quantized
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), GraphError> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<LE>(VERSION)?;

        write_len(writer, self.node_count())?;
        for node in self.nodes() {
            writer.write_u32::<LE>(node.id.0)?;
            write_actor(writer, node.actor)?;
            writer.write_u32::<LE>(node.cluster.0)?;
            writer.write_f32::<LE>(node.tolerance)?;
            write_position(writer, node.position)?;
        }

        for node in self.nodes() {
            let mut visibles: Vec<_> = node.visibles.iter().collect();
            visibles.sort_unstable_by_key(|(id, _)| **id);
            write_len(writer, visibles.len())?;
            for (id, distance) in visibles {
                writer.write_u32::<LE>(id.0)?;
                writer.write_f32::<LE>(*distance)?;
            }

            write_len(writer, node.arcs.len())?;
            for arc in &node.arcs {
                writer.write_u32::<LE>(arc.id.0)?;
                writer.write_u8(arc.kind.code())?;
                writer.write_u32::<LE>(arc.target.0)?;
                writer.write_f32::<LE>(arc.weight)?;
            }

            write_len(writer, node.clusters.len())?;
            for cluster in &node.clusters {
                writer.write_u8(cluster.kind.code())?;
                write_actor(writer, cluster.actor)?;
                writer.write_u32::<LE>(cluster.arc.0)?;
                writer.write_u32::<LE>(cluster.node.0)?;
                writer.write_u32::<LE>(cluster.target.0)?;
                writer.write_f32::<LE>(cluster.weight)?;
            }

            write_len(writer, node.transitions.len())?;
            for transition in &node.transitions {
                writer.write_u32::<LE>(transition.id.0)?;
                writer.write_u8(transition.kind.map_or(u8::MAX, ArcType::code))?;
                write_len(writer, transition.len())?;
                for weight in &transition.weights {
                    writer.write_f32::<LE>(*weight)?;
                }
                for position in &transition.positions {
                    write_position(writer, *position)?;
                }
                write_len(writer, transition.nodes.len())?;
                for id in &transition.nodes {
                    writer.write_u32::<LE>(id.0)?;
                }
            }
        }

        let pairs = self.visible_clusters();
        write_len(writer, pairs.len())?;
        for (a, b) in pairs {
            writer.write_u32::<LE>(a.0)?;
            writer.write_u32::<LE>(b.0)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Deserialize a graph from `reader`
    ///
    /// # Errors
    ///
    /// Returns an error on truncated or malformed input, or when a reference
    /// names a node the file never defines
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, GraphError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(GraphError::BadMagic);
        }
        let version = reader.read_u16::<LE>()?;
        if version != VERSION {
            return Err(GraphError::Version(version));
        }

        // Pass one: bare nodes
        let mut graph = PathingGraph::new();
        let count = reader.read_u32::<LE>()? as usize;
        let mut order = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let id = NodeId(reader.read_u32::<LE>()?);
            let actor = read_actor(reader)?;
            let cluster = ClusterId(reader.read_u32::<LE>()?);
            let tolerance = reader.read_f32::<LE>()?;
            let position = read_position(reader)?;
            if graph.contains(id) {
                return Err(GraphError::Duplicate(id));
            }
            let mut node = PathingNode::new(id, position, tolerance);
            node.actor = actor;
            node.cluster = cluster;
            graph.insert_node_with(node);
            order.push(id);
        }

        // Pass two: references
        let known = |graph: &PathingGraph, id: NodeId| {
            if graph.contains(id) {
                Ok(id)
            } else {
                Err(GraphError::Dangling(id))
            }
        };
        for source in order {
            let visible_count = reader.read_u32::<LE>()?;
            for _ in 0..visible_count {
                let id = known(&graph, NodeId(reader.read_u32::<LE>()?))?;
                let distance = reader.read_f32::<LE>()?;
                graph.find_node_mut(source).visibles.insert(id, distance);
            }

            let arc_count = reader.read_u32::<LE>()?;
            for _ in 0..arc_count {
                let id = ArcId(reader.read_u32::<LE>()?);
                let kind = read_kind(reader)?;
                let target = known(&graph, NodeId(reader.read_u32::<LE>()?))?;
                let weight = reader.read_f32::<LE>()?;
                if target == source || !(weight >= 0.0) {
                    return Err(GraphError::InvalidArc {
                        node: source,
                        arc: id,
                    });
                }
                graph.insert_arc_with(
                    source,
                    PathingArc {
                        id,
                        kind,
                        target,
                        weight,
                    },
                );
            }

            let cluster_count = reader.read_u32::<LE>()?;
            for _ in 0..cluster_count {
                let kind = read_kind(reader)?;
                let actor = read_actor(reader)?;
                let arc = ArcId(reader.read_u32::<LE>()?);
                let node = known(&graph, NodeId(reader.read_u32::<LE>()?))?;
                let target = known(&graph, NodeId(reader.read_u32::<LE>()?))?;
                let weight = reader.read_f32::<LE>()?;
                let leads_to_node = graph
                    .find_node(source)
                    .arc(arc)
                    .is_some_and(|first| first.target == node);
                if !leads_to_node {
                    return Err(GraphError::InvalidArc { node: source, arc });
                }
                graph.insert_cluster(
                    source,
                    PathingCluster {
                        kind,
                        actor,
                        arc,
                        node,
                        target,
                        weight,
                    },
                );
            }

            let transition_count = reader.read_u32::<LE>()?;
            for _ in 0..transition_count {
                let id = ArcId(reader.read_u32::<LE>()?);
                let code = reader.read_u8()?;
                let kind = match code {
                    u8::MAX => None,
                    code => Some(ArcType::from_code(code).ok_or(GraphError::ArcType(code))?),
                };
                let len = reader.read_u32::<LE>()? as usize;
                let mut transition = PathingTransition {
                    id,
                    kind,
                    ..Default::default()
                };
                for _ in 0..len {
                    transition.weights.push(reader.read_f32::<LE>()?);
                }
                for _ in 0..len {
                    transition.positions.push(read_position(reader)?);
                }
                let passed = reader.read_u32::<LE>()?;
                for _ in 0..passed {
                    let node = known(&graph, NodeId(reader.read_u32::<LE>()?))?;
                    transition.nodes.push(node);
                }
                if graph.find_node(source).arc(id).is_none() {
                    return Err(GraphError::OrphanTransition {
                        node: source,
                        arc: id,
                    });
                }
                graph.insert_transition(source, transition);
            }
        }

        let pair_count = reader.read_u32::<LE>()?;
        for _ in 0..pair_count {
            let a = ClusterId(reader.read_u32::<LE>()?);
            let b = ClusterId(reader.read_u32::<LE>()?);
            graph.insert_visible_cluster(a, b);
        }

        Ok(graph)
    }

    /// Save the graph to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), GraphError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)
    }

    /// Load a graph from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::load(&mut reader)
    }

    /// Load a graph, falling back to an empty one.
    ///
    /// A missing or corrupt file is logged; the caller is expected to notice
    /// the empty graph and trigger a rebuild.
    #[must_use]
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(graph) => {
                log::info!(
                    "Loaded pathing graph {:?}: {} nodes, {} arcs",
                    path,
                    graph.node_count(),
                    graph.arc_count()
                );
                graph
            }
            Err(e) => {
                log::error!("Failed to load pathing graph {:?}: {}", path, e);
                PathingGraph::new()
            }
        }
    }
}
