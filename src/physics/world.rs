//! Graph-building simulator on top of rapier3d
//!
//! Static level geometry lives in a rapier collider set; the agent is a
//! kinematic capsule moved with rapier's character controller.

use glam::{Quat, Vec3};
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::na::UnitQuaternion;
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::{Ball, Capsule};
use rapier3d::prelude::*;

use super::simulator::{RayHit, Simulator, Transform};

/// Handle to a static collider in the level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub rapier3d::geometry::ColliderHandle);

/// Convert glam Quat to rapier3d UnitQuaternion
fn quat_to_rapier(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(rapier3d::na::Quaternion::new(q.w, q.x, q.y, q.z))
}

fn to_vector(v: Vec3) -> Vector<f32> {
    vector![v.x, v.y, v.z]
}

/// Dimensions and movement constants of the simulated agent
#[derive(Debug, Clone, Copy)]
pub struct AgentShape {
    /// Capsule radius
    pub radius: f32,
    /// Half height of the capsule's cylindrical part
    pub half_height: f32,
    /// Highest step the agent climbs without jumping
    pub step_height: f32,
    /// Vertical speed of a standing jump
    pub jump_speed: f32,
    /// Downward acceleration
    pub gravity: f32,
}

impl Default for AgentShape {
    fn default() -> Self {
        Self {
            radius: 15.0,
            half_height: 12.0,
            step_height: 18.0,
            jump_speed: 270.0,
            gravity: 800.0,
        }
    }
}

/// Rapier-backed [`Simulator`]
pub struct RapierSimulator {
    shape: AgentShape,
    /// Physics pipeline
    pipeline: PhysicsPipeline,
    /// Island manager
    island_manager: IslandManager,
    /// Broad phase
    broad_phase: DefaultBroadPhase,
    /// Narrow phase
    narrow_phase: NarrowPhase,
    /// Rigid body set
    rigid_body_set: RigidBodySet,
    /// Collider set
    collider_set: ColliderSet,
    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,
    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,
    /// CCD solver
    ccd_solver: CCDSolver,
    /// Query pipeline for raycasting
    query_pipeline: QueryPipeline,
    /// Integration parameters
    integration_parameters: IntegrationParameters,
    controller: KinematicCharacterController,
    /// Set whenever geometry changed and the query pipeline is stale
    dirty: bool,

    transform: Transform,
    velocity: Vec3,
    walk: Vec3,
    air: Vec3,
    grounded: bool,
}

impl RapierSimulator {
    /// Create an empty level with the default agent
    pub fn new() -> Self {
        Self::with_shape(AgentShape::default())
    }

    /// Create an empty level for a custom agent
    pub fn with_shape(shape: AgentShape) -> Self {
        let controller = KinematicCharacterController {
            offset: CharacterLength::Absolute(0.5),
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(shape.step_height),
                min_width: CharacterLength::Absolute(2.0),
                include_dynamic_bodies: false,
            }),
            snap_to_ground: Some(CharacterLength::Absolute(shape.step_height)),
            ..Default::default()
        };

        Self {
            shape,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            controller,
            dirty: true,
            transform: Transform::default(),
            velocity: Vec3::ZERO,
            walk: Vec3::ZERO,
            air: Vec3::ZERO,
            grounded: false,
        }
    }

    /// Add a static box to the level
    pub fn add_static_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
    ) -> ColliderHandle {
        let isometry = Isometry::from_parts(
            rapier3d::na::Translation3::new(center.x, center.y, center.z),
            quat_to_rapier(rotation),
        );
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .position(isometry)
            .build();
        self.dirty = true;
        ColliderHandle(self.collider_set.insert(collider))
    }

    /// Add a large floor slab whose top surface sits at `height`
    pub fn add_ground_plane(&mut self, height: f32, half_size: f32) -> ColliderHandle {
        self.add_static_box(
            Vec3::new(0.0, height - 8.0, 0.0),
            Vec3::new(half_size, 8.0, half_size),
            Quat::IDENTITY,
        )
    }

    /// Number of static colliders
    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Refresh broad phase and query structures after geometry changes
    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.pipeline.step(
            &vector![0.0, 0.0, 0.0],
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.dirty = false;
    }

    fn capsule(&self) -> Capsule {
        Capsule::new_y(self.shape.half_height, self.shape.radius)
    }

    fn isometry(&self) -> Isometry<f32> {
        let p = self.transform.position;
        Isometry::translation(p.x, p.y, p.z)
    }
}

impl Default for RapierSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator for RapierSimulator {
    fn set_transform(&mut self, transform: Transform) {
        self.refresh();
        self.transform = transform;
        self.velocity = Vec3::ZERO;
        self.walk = Vec3::ZERO;
        self.air = Vec3::ZERO;
        // Probe straight down so a freshly placed agent knows its support
        let feet = self.shape.half_height + self.shape.radius;
        self.grounded = self
            .cast_ray(transform.position, transform.position - Vec3::Y * (feet + 1.0))
            .is_some();
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn walk_direction(&mut self, velocity: Vec3) {
        self.walk = Vec3::new(velocity.x, 0.0, velocity.z);
    }

    fn jump(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.air = Vec3::new(velocity.x, 0.0, velocity.z);
        self.grounded = false;
    }

    fn fall_direction(&mut self, velocity: Vec3) {
        self.air = Vec3::new(velocity.x, 0.0, velocity.z);
    }

    fn on_ground(&self) -> bool {
        self.grounded
    }

    fn jump_speed(&self) -> f32 {
        self.shape.jump_speed
    }

    fn scale(&self) -> f32 {
        self.shape.half_height + self.shape.radius
    }

    fn step(&mut self, dt: f32) {
        self.refresh();

        let desired = if self.grounded {
            self.velocity = self.walk;
            self.walk * dt - Vec3::Y * self.shape.step_height * 0.1
        } else {
            self.velocity.x = self.air.x;
            self.velocity.z = self.air.z;
            self.velocity.y -= self.shape.gravity * dt;
            self.velocity * dt
        };

        let capsule = self.capsule();
        let movement = self.controller.move_shape(
            dt,
            &self.rigid_body_set,
            &self.collider_set,
            &self.query_pipeline,
            &capsule,
            &self.isometry(),
            to_vector(desired),
            QueryFilter::default(),
            |_| {},
        );

        let t = movement.translation;
        self.transform.position += Vec3::new(t.x, t.y, t.z);
        let was_grounded = self.grounded;
        self.grounded = movement.grounded;
        if self.grounded {
            self.velocity.y = 0.0;
        } else if was_grounded {
            // Walked off a ledge: keep walking momentum into the fall
            self.air = self.walk;
            self.velocity = self.walk;
        }
    }

    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let direction = delta / length;
        let ray = Ray::new(point![from.x, from.y, from.z], to_vector(direction));

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                length,
                true,
                QueryFilter::default(),
            )
            .map(|(_, distance)| {
                let point = ray.point_at(distance);
                RayHit {
                    point: Vec3::new(point.x, point.y, point.z),
                    fraction: distance / length,
                }
            })
    }

    fn convex_sweep(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        if delta.length_squared() <= f32::EPSILON {
            return None;
        }
        let ball = Ball::new(self.shape.radius * 0.5);
        let start = Isometry::translation(from.x, from.y, from.z);

        self.query_pipeline
            .cast_shape(
                &self.rigid_body_set,
                &self.collider_set,
                &start,
                &to_vector(delta),
                &ball,
                ShapeCastOptions::with_max_time_of_impact(1.0),
                QueryFilter::default(),
            )
            .map(|(_, hit)| RayHit {
                point: from + delta * hit.time_of_impact,
                fraction: hit.time_of_impact,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> RapierSimulator {
        let mut sim = RapierSimulator::new();
        sim.add_ground_plane(0.0, 512.0);
        sim
    }

    #[test]
    fn test_raycast_hits_floor() {
        let mut sim = floor();
        sim.refresh();
        let hit = sim
            .cast_ray(Vec3::new(0.0, 100.0, 0.0), Vec3::new(0.0, -100.0, 0.0))
            .expect("floor should block the ray");
        assert!(hit.point.y.abs() < 0.5);
        assert!((hit.fraction - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_raycast_misses_empty_space() {
        let mut sim = floor();
        sim.refresh();
        assert!(
            sim.cast_ray(Vec3::new(0.0, 100.0, 0.0), Vec3::new(50.0, 100.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn test_agent_falls_onto_floor() {
        let mut sim = floor();
        sim.set_transform(Transform::from_position(Vec3::new(0.0, 150.0, 0.0)));
        assert!(!sim.on_ground());

        for _ in 0..240 {
            sim.step(1.0 / 60.0);
            if sim.on_ground() {
                break;
            }
        }
        assert!(sim.on_ground());
        assert!(sim.transform().position.y < 150.0);
    }
}
