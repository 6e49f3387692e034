//! Deterministic block-world simulator for unit tests
//!
//! Levels are axis-aligned solid boxes. Walking is kinematic, falls use
//! explicit Euler integration, and ray casts use the slab test.

use glam::Vec3;

use super::simulator::{RayHit, Simulator, Transform};

/// Solid axis-aligned box
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub min: Vec3,
    pub max: Vec3,
}

impl Block {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    /// Segment intersection fraction using the slab test
    fn intersect(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let delta = to - from;
        let mut enter = 0.0f32;
        let mut exit = 1.0f32;
        for axis in 0..3 {
            let (o, d, lo, hi) = (from[axis], delta[axis], self.min[axis], self.max[axis]);
            if d.abs() < 1e-6 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - o) / d, (hi - o) / d);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            enter = enter.max(t0);
            exit = exit.min(t1);
            if enter > exit {
                return None;
            }
        }
        Some(enter)
    }
}

pub struct BlockWorld {
    pub blocks: Vec<Block>,
    pub half_height: f32,
    pub step_height: f32,
    pub gravity: f32,
    pub jump_speed: f32,
    position: Vec3,
    velocity: Vec3,
    walk: Vec3,
    air: Vec3,
    grounded: bool,
}

impl BlockWorld {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            half_height: 24.0,
            step_height: 18.0,
            gravity: 800.0,
            jump_speed: 270.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            walk: Vec3::ZERO,
            air: Vec3::ZERO,
            grounded: false,
        }
    }

    /// A single square floor of `half_size` with its top at y = 0
    pub fn floor(half_size: f32) -> Self {
        Self::new(vec![Block::new(
            Vec3::new(-half_size, -16.0, -half_size),
            Vec3::new(half_size, 0.0, half_size),
        )])
    }

    /// Top of the highest block under `p` that the feet can stand on
    fn support(&self, p: Vec3) -> Option<f32> {
        let feet = p.y - self.half_height;
        self.blocks
            .iter()
            .filter(|b| {
                b.contains_xz(p) && b.max.y <= feet + self.step_height && b.max.y >= feet - 1.0
            })
            .map(|b| b.max.y)
            .reduce(f32::max)
    }

    /// Whether the body at `p` overlaps a block above step height
    fn blocked(&self, p: Vec3) -> bool {
        let feet = p.y - self.half_height;
        let head = p.y + self.half_height;
        self.blocks.iter().any(|b| {
            b.contains_xz(p) && b.max.y > feet + self.step_height && b.min.y < head
        })
    }
}

impl Simulator for BlockWorld {
    fn set_transform(&mut self, transform: Transform) {
        self.position = transform.position;
        self.velocity = Vec3::ZERO;
        self.walk = Vec3::ZERO;
        self.air = Vec3::ZERO;
        self.grounded = self.support(self.position).is_some();
    }

    fn transform(&self) -> Transform {
        Transform::from_position(self.position)
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
        self.jump_speed
    }

    fn scale(&self) -> f32 {
        self.half_height
    }

    fn step(&mut self, dt: f32) {
        if self.grounded {
            let next = self.position + self.walk * dt;
            if self.blocked(next) {
                return;
            }
            match self.support(next) {
                Some(top) => self.position = Vec3::new(next.x, top + self.half_height, next.z),
                None => {
                    self.position = next;
                    self.grounded = false;
                    self.velocity = self.walk;
                    self.air = self.walk;
                }
            }
            return;
        }

        self.velocity.x = self.air.x;
        self.velocity.z = self.air.z;
        self.velocity.y -= self.gravity * dt;
        let mut next = self.position + self.velocity * dt;
        if self.blocked(Vec3::new(next.x, self.position.y, next.z)) {
            next.x = self.position.x;
            next.z = self.position.z;
        }

        let old_feet = self.position.y - self.half_height;
        let new_feet = next.y - self.half_height;
        let landing = self
            .blocks
            .iter()
            .filter(|b| b.contains_xz(next) && b.max.y <= old_feet && b.max.y >= new_feet)
            .map(|b| b.max.y)
            .reduce(f32::max);

        match landing {
            Some(top) if self.velocity.y <= 0.0 => {
                self.position = Vec3::new(next.x, top + self.half_height, next.z);
                self.velocity = Vec3::ZERO;
                self.grounded = true;
            }
            _ => self.position = next,
        }
    }

    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        self.blocks
            .iter()
            .filter_map(|b| b.intersect(from, to))
            .reduce(f32::min)
            .map(|fraction| RayHit {
                point: from.lerp(to, fraction),
                fraction,
            })
    }

    fn convex_sweep(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        self.cast_ray(from, to)
    }
}
