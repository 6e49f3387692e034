//! Physics collaborator module
//!
//! The builder talks to physics through the [`Simulator`] trait; the crate
//! ships a rapier3d implementation for offline graph builds.

mod simulator;
#[cfg(test)]
pub(crate) mod testing;
mod world;

pub use simulator::{RayHit, Simulator, Transform};
pub use world::{AgentShape, ColliderHandle, RapierSimulator};
