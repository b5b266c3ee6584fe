//! Rigid-body world: ground plane, dynamic bodies, static boxes and raycasts

use std::collections::HashMap;

use glam::Vec3;
use serde::Serialize;
use uuid::Uuid;

use crate::util::time::LONG_FRAME;

/// Fixed physics sub-step (seconds)
pub const PHYSICS_STEP: f32 = 1.0 / 90.0;
/// Gravity along y (m/s^2)
pub const GRAVITY: f32 = -9.81;
/// Highest ledge a falling body snaps onto instead of being pushed sideways
const STEP_UP: f32 = 0.5;

/// Sub-step cap for a frame of length `dt`
pub fn max_sub_steps(dt: f32) -> u32 {
    if dt > LONG_FRAME {
        1
    } else {
        3
    }
}

/// Handle to a dynamic body in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BodyHandle(u32);

/// Handle to a static (or kinematically moved) box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StaticId(u32);

/// Collision shape of a dynamic body. Cylinders are always upright.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Cylinder { radius: f32, height: f32 },
}

impl Shape {
    pub fn radius(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => radius,
            Shape::Cylinder { radius, .. } => radius,
        }
    }

    pub fn half_height(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => radius,
            Shape::Cylinder { height, .. } => height * 0.5,
        }
    }
}

/// Contact material against the ground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Player,
    Enemy,
    Grenade,
}

impl Material {
    pub fn ground_friction(self) -> f32 {
        match self {
            Material::Player => 0.2,
            Material::Enemy => 0.3,
            Material::Grenade => 0.4,
        }
    }
}

/// A dynamic body. `position` is the shape centre.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub shape: Shape,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Zero mass makes the body inert: no gravity, no integration
    pub mass: f32,
    pub linear_damping: f32,
    pub material: Material,
    /// Disabled bodies are skipped entirely (driver seat, ladder)
    pub enabled: bool,
    /// Resting on the ground or a roof after the last sub-step
    pub on_ground: bool,
}

impl RigidBody {
    pub fn sphere(radius: f32, mass: f32, position: Vec3, material: Material) -> Self {
        Self {
            shape: Shape::Sphere { radius },
            position,
            velocity: Vec3::ZERO,
            mass,
            linear_damping: 0.01,
            material,
            enabled: true,
            on_ground: false,
        }
    }

    pub fn cylinder(radius: f32, height: f32, mass: f32, position: Vec3, material: Material) -> Self {
        Self {
            shape: Shape::Cylinder { radius, height },
            position,
            velocity: Vec3::ZERO,
            mass,
            linear_damping: 0.01,
            material,
            enabled: true,
            on_ground: false,
        }
    }

    pub fn with_damping(mut self, linear_damping: f32) -> Self {
        self.linear_damping = linear_damping;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.enabled && self.mass > 0.0
    }

    pub fn bottom(&self) -> f32 {
        self.position.y - self.shape.half_height()
    }

    /// Point on the ground under the body centre
    pub fn feet(&self) -> Vec3 {
        Vec3::new(self.position.x, self.bottom(), self.position.z)
    }
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Box standing on the ground with footprint `w x d` centred at `(cx, cz)`
    pub fn from_footprint(cx: f32, cz: f32, w: f32, d: f32, height: f32) -> Self {
        Self {
            min: Vec3::new(cx - w * 0.5, 0.0, cz - d * 0.5),
            max: Vec3::new(cx + w * 0.5, height, cz + d * 0.5),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    /// Slab test. Returns the entry distance and the face normal that was hit.
    /// A ray starting inside the box passes out of it unhit.
    pub fn ray(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<(f32, Vec3)> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let lo = self.min[axis];
            let hi = self.max[axis];

            if d.abs() < 1e-8 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_enter {
                t_enter = t0;
                normal = Vec3::ZERO;
                normal[axis] = -d.signum();
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        // behind the origin, or the origin sits inside the box
        if t_enter < 0.0 {
            return None;
        }
        (t_enter <= max_dist).then_some((t_enter, normal))
    }
}

/// What a static box belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StaticTag {
    Building(usize),
    Wall,
    Vehicle(Uuid),
}

#[derive(Debug, Clone)]
pub struct StaticBox {
    pub aabb: Aabb,
    pub tag: StaticTag,
}

/// Result of a world raycast. `tag` is `None` for the ground plane.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub tag: Option<StaticTag>,
}

/// Fixed-step rigid-body world
pub struct PhysicsWorld {
    bodies: HashMap<BodyHandle, RigidBody>,
    statics: HashMap<StaticId, StaticBox>,
    next_body: u32,
    next_static: u32,
    accumulator: f32,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            statics: HashMap::new(),
            next_body: 0,
            next_static: 0,
            accumulator: 0.0,
        }
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        self.bodies.insert(handle, body);
        handle
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        self.bodies.remove(&handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(&handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(&handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn add_static(&mut self, aabb: Aabb, tag: StaticTag) -> StaticId {
        let id = StaticId(self.next_static);
        self.next_static += 1;
        self.statics.insert(id, StaticBox { aabb, tag });
        id
    }

    /// Replace a static box's bounds, e.g. after a vehicle turns
    pub fn reshape_static(&mut self, id: StaticId, aabb: Aabb) {
        if let Some(s) = self.statics.get_mut(&id) {
            s.aabb = aabb;
        }
    }

    pub fn static_box(&self, id: StaticId) -> Option<&StaticBox> {
        self.statics.get(&id)
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    /// Advance by `dt` in `fixed` sub-steps, at most `max_sub_steps` of them.
    /// Returns the number of sub-steps taken.
    pub fn step(&mut self, fixed: f32, dt: f32, max_sub_steps: u32) -> u32 {
        if dt <= 0.0 || fixed <= 0.0 {
            return 0;
        }

        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= fixed && steps < max_sub_steps {
            self.internal_step(fixed);
            self.accumulator -= fixed;
            steps += 1;
        }
        self.accumulator %= fixed;
        steps
    }

    fn internal_step(&mut self, h: f32) {
        let statics = &self.statics;

        for body in self.bodies.values_mut() {
            if !body.is_dynamic() {
                continue;
            }

            body.velocity.y += GRAVITY * h;
            body.velocity *= (1.0 - body.linear_damping).clamp(0.0, 1.0).powf(h);
            body.position += body.velocity * h;
            body.on_ground = false;

            let half = body.shape.half_height();
            if body.position.y - half <= 0.0 {
                body.position.y = half;
                if body.velocity.y < 0.0 {
                    body.velocity.y = 0.0;
                }
                body.on_ground = true;
            }

            for s in statics.values() {
                resolve_static(body, &s.aabb);
            }

            if body.on_ground {
                let decel = body.material.ground_friction() * -GRAVITY * h;
                let horizontal = Vec3::new(body.velocity.x, 0.0, body.velocity.z);
                let speed = horizontal.length();
                let scale = if speed <= decel { 0.0 } else { (speed - decel) / speed };
                body.velocity.x *= scale;
                body.velocity.z *= scale;
            }
        }
    }

    /// First static surface (or the ground) along the ray
    pub fn raycast_static(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<RayHit> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let mut best: Option<RayHit> = None;

        if dir.y < -1e-6 && origin.y >= 0.0 {
            let t = -origin.y / dir.y;
            if t <= max_dist {
                best = Some(RayHit {
                    distance: t,
                    point: origin + dir * t,
                    normal: Vec3::Y,
                    tag: None,
                });
            }
        }

        for s in self.statics.values() {
            if let Some((t, normal)) = s.aabb.ray(origin, dir, max_dist) {
                if best.map_or(true, |b| t < b.distance) {
                    best = Some(RayHit {
                        distance: t,
                        point: origin + dir * t,
                        normal,
                        tag: Some(s.tag),
                    });
                }
            }
        }

        best
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Push a body out of a static box, or land it on top
fn resolve_static(body: &mut RigidBody, aabb: &Aabb) {
    let r = body.shape.radius();
    let half = body.shape.half_height();
    let bottom = body.position.y - half;
    let top = body.position.y + half;
    if top <= aabb.min.y || bottom >= aabb.max.y {
        return;
    }

    let (x, z) = (body.position.x, body.position.z);

    if aabb.contains_xz(x, z) && body.velocity.y <= 0.0 && aabb.max.y - bottom <= STEP_UP {
        body.position.y = aabb.max.y + half;
        body.velocity.y = 0.0;
        body.on_ground = true;
        return;
    }

    let cx = x.clamp(aabb.min.x, aabb.max.x);
    let cz = z.clamp(aabb.min.z, aabb.max.z);
    let dx = x - cx;
    let dz = z - cz;
    let dist_sq = dx * dx + dz * dz;
    if dist_sq > r * r {
        return;
    }

    if dist_sq > 1e-8 {
        let dist = dist_sq.sqrt();
        let (nx, nz) = (dx / dist, dz / dist);
        let push = r - dist;
        body.position.x += nx * push;
        body.position.z += nz * push;
        let vn = body.velocity.x * nx + body.velocity.z * nz;
        if vn < 0.0 {
            body.velocity.x -= vn * nx;
            body.velocity.z -= vn * nz;
        }
        return;
    }

    // Centre inside the footprint: leave through the nearest face
    let exits = [
        (x - aabb.min.x, Vec3::NEG_X),
        (aabb.max.x - x, Vec3::X),
        (z - aabb.min.z, Vec3::NEG_Z),
        (aabb.max.z - z, Vec3::Z),
    ];
    let (depth, normal) = exits
        .into_iter()
        .fold((f32::MAX, Vec3::X), |acc, e| if e.0 < acc.0 { e } else { acc });
    body.position += normal * (depth + r);
    if normal.x != 0.0 {
        body.velocity.x = 0.0;
    } else {
        body.velocity.z = 0.0;
    }
}

/// Ray against an upright cylinder standing on `base`. Returns the hit distance.
pub fn ray_vertical_cylinder(
    origin: Vec3,
    dir: Vec3,
    base: Vec3,
    radius: f32,
    height: f32,
    max_dist: f32,
) -> Option<f32> {
    let mut best: Option<f32> = None;
    let mut consider = |t: f32| {
        if t >= 0.0 && t <= max_dist && best.map_or(true, |b| t < b) {
            best = Some(t);
        }
    };

    let ox = origin.x - base.x;
    let oz = origin.z - base.z;
    let a = dir.x * dir.x + dir.z * dir.z;
    if a > 1e-10 {
        let b = 2.0 * (ox * dir.x + oz * dir.z);
        let c = ox * ox + oz * oz - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
                let y = origin.y + dir.y * t;
                if y >= base.y && y <= base.y + height {
                    consider(t);
                }
            }
        }
    }

    if dir.y.abs() > 1e-8 {
        for cap in [base.y, base.y + height] {
            let t = (cap - origin.y) / dir.y;
            let p = origin + dir * t;
            let (px, pz) = (p.x - base.x, p.z - base.z);
            if px * px + pz * pz <= radius * radius {
                consider(t);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_step_cap_depends_on_frame_length() {
        assert_eq!(max_sub_steps(0.016), 3);
        assert_eq!(max_sub_steps(0.022), 3);
        assert_eq!(max_sub_steps(0.03), 1);
    }

    #[test]
    fn long_frame_takes_one_sub_step() {
        let mut world = PhysicsWorld::new();
        let steps = world.step(PHYSICS_STEP, 0.05, max_sub_steps(0.05));
        assert_eq!(steps, 1);
        assert!(world.accumulator < PHYSICS_STEP);
    }

    #[test]
    fn short_frames_accumulate() {
        let mut world = PhysicsWorld::new();
        assert_eq!(world.step(PHYSICS_STEP, 0.005, 3), 0);
        assert_eq!(world.step(PHYSICS_STEP, 0.007, 3), 1);
    }

    #[test]
    fn sphere_falls_and_rests_on_ground() {
        let mut world = PhysicsWorld::new();
        let h = world.add_body(RigidBody::sphere(0.32, 72.0, Vec3::new(0.0, 0.94, 10.0), Material::Player));
        for _ in 0..200 {
            world.step(PHYSICS_STEP, 1.0 / 60.0, 3);
        }
        let body = world.body(h).unwrap();
        assert!((body.position.y - 0.32).abs() < 1e-3);
        assert!(body.on_ground);
    }

    #[test]
    fn inert_body_does_not_move() {
        let mut world = PhysicsWorld::new();
        let h = world.add_body(RigidBody::cylinder(0.32, 1.45, 0.0, Vec3::new(0.0, 3.0, 0.0), Material::Enemy));
        world.step(PHYSICS_STEP, 0.05, 1);
        assert_eq!(world.body(h).unwrap().position.y, 3.0);
    }

    #[test]
    fn body_is_pushed_out_of_static_box() {
        let mut world = PhysicsWorld::new();
        world.add_static(Aabb::from_footprint(0.0, 0.0, 4.0, 4.0, 10.0), StaticTag::Wall);
        let h = world.add_body(RigidBody::sphere(0.32, 72.0, Vec3::new(2.1, 0.32, 0.0), Material::Player));
        world.step(PHYSICS_STEP, PHYSICS_STEP, 1);
        let body = world.body(h).unwrap();
        assert!(body.position.x >= 2.0 + 0.32 - 1e-3);
    }

    #[test]
    fn raycast_hits_nearest_box_face() {
        let mut world = PhysicsWorld::new();
        world.add_static(Aabb::from_footprint(10.0, 0.0, 2.0, 4.0, 4.0), StaticTag::Building(0));
        world.add_static(Aabb::from_footprint(20.0, 0.0, 2.0, 4.0, 4.0), StaticTag::Building(1));
        let hit = world
            .raycast_static(Vec3::new(0.0, 1.0, 0.0), Vec3::X, 100.0)
            .unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec3::NEG_X);
        assert_eq!(hit.tag, Some(StaticTag::Building(0)));
    }

    #[test]
    fn raycast_falls_back_to_ground() {
        let world = PhysicsWorld::new();
        let hit = world
            .raycast_static(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, -1.0, 0.0), 100.0)
            .unwrap();
        assert!(hit.tag.is_none());
        assert!((hit.point.y).abs() < 1e-4);
        assert!((hit.point.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn cylinder_ray_hits_side() {
        let t = ray_vertical_cylinder(
            Vec3::new(-5.0, 1.0, 0.0),
            Vec3::X,
            Vec3::ZERO,
            0.4,
            1.8,
            100.0,
        )
        .unwrap();
        assert!((t - 4.6).abs() < 1e-4);
    }

    #[test]
    fn cylinder_ray_misses_above_head() {
        let t = ray_vertical_cylinder(
            Vec3::new(-5.0, 2.5, 0.0),
            Vec3::X,
            Vec3::ZERO,
            0.4,
            1.8,
            100.0,
        );
        assert!(t.is_none());
    }
}
