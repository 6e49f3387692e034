//! Occupancy event queue
//!
//! Trigger, collision and separation callbacks fire from physics context while
//! planners may be reading the graph. Callbacks push [`OccupancyEvent`]s here;
//! the owner swaps the buffers between planning ticks and applies them to the
//! graph in one go.
//!
//! # Example
//!
//! ```ignore
//! // In a trigger callback
//! queue.push(OccupancyEvent::Entered { node, actor });
//!
//! // Between planning ticks
//! queue.swap();
//! queue.apply(&mut graph);
//! ```

use std::collections::VecDeque;

use crate::graph::{ActorId, NodeId, PathingGraph};

/// A change of node occupancy reported by the event collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyEvent {
    /// An actor entered the trigger volume or collided with the node
    Entered {
        /// The node whose occupant changes
        node: NodeId,
        /// The actor now occupying it
        actor: ActorId,
    },
    /// An actor left the node (trigger leave or separation)
    Left {
        /// The node being vacated
        node: NodeId,
        /// The actor that left
        actor: ActorId,
    },
}

/// Double-buffered queue of occupancy events.
///
/// Events pushed during tick N become visible after the next `swap()`.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this tick
    pending: VecDeque<OccupancyEvent>,
    /// Events from the previous tick, ready for processing
    processing: VecDeque<OccupancyEvent>,
}

impl EventQueue {
    /// Default initial capacity for event queues.
    const DEFAULT_CAPACITY: usize = 64;

    /// Create a new event queue with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
            processing: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
        }
    }

    /// Push an event to be processed next tick.
    #[inline]
    pub fn push(&mut self, event: OccupancyEvent) {
        self.pending.push_back(event);
    }

    /// Swap the pending and processing queues.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Check if there are events ready for processing.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Get the number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Get the number of events pending for next tick.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply and drain the processing buffer, returning how many events applied.
    ///
    /// A `Left` event only clears the node when the leaving actor is still the
    /// recorded occupant. Events naming unknown nodes are dropped with a warning.
    pub fn apply(&mut self, graph: &mut PathingGraph) -> usize {
        let mut applied = 0;
        for event in self.processing.drain(..) {
            match event {
                OccupancyEvent::Entered { node, actor } => {
                    if !graph.contains(node) {
                        log::warn!("Occupancy event for unknown {}", node);
                        continue;
                    }
                    graph.set_occupant(node, Some(actor));
                }
                OccupancyEvent::Left { node, actor } => {
                    let Some(current) = graph.node(node) else {
                        log::warn!("Occupancy event for unknown {}", node);
                        continue;
                    };
                    if current.actor == Some(actor) {
                        graph.set_occupant(node, None);
                    }
                }
            }
            applied += 1;
        }
        applied
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
