//! Contract between the graph builder and a physics engine

use glam::{Quat, Vec3};

/// Position and orientation of the simulated agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in world space (agent centre)
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
}

impl Transform {
    /// Create a transform with just a position
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Create a transform at `position` facing `yaw` radians around +Y
    #[must_use]
    pub fn from_yaw(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_y(yaw),
        }
    }

    /// Get the forward direction (negative Z in local space)
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

/// Result of a ray cast or sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// The point of intersection
    pub point: Vec3,
    /// Fraction of the segment travelled before the hit, in `[0, 1]`
    pub fraction: f32,
}

/// Physics collaborator driven by the graph builder.
///
/// The builder teleports a single character around, gives it a desired
/// velocity and steps the simulation. Ray casts and sweeps return `None` when
/// nothing blocks the segment.
pub trait Simulator {
    /// Teleport the character and clear its velocity
    fn set_transform(&mut self, transform: Transform);

    /// Current character transform
    fn transform(&self) -> Transform;

    /// Desired horizontal velocity while grounded
    fn walk_direction(&mut self, velocity: Vec3);

    /// Launch the character with `velocity`
    fn jump(&mut self, velocity: Vec3);

    /// Desired horizontal velocity while airborne
    fn fall_direction(&mut self, velocity: Vec3);

    /// Whether the character stands on solid ground
    fn on_ground(&self) -> bool;

    /// Vertical launch speed of a standing jump
    fn jump_speed(&self) -> f32;

    /// Character scale; eye height and sweep radius derive from it
    fn scale(&self) -> f32;

    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f32);

    /// First static hit along the segment `from -> to`
    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit>;

    /// First static hit of the character's convex hull swept along `from -> to`
    fn convex_sweep(&self, from: Vec3, to: Vec3) -> Option<RayHit>;
}
