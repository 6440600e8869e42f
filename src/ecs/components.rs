use std::fmt;

use glam::{Quat, Vec3};

use crate::math::Aabb;

/// Stable per-spawn identifier. Never reused within a session, so anything
/// keyed by a retired id simply stops matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "critter#{}", self.0)
    }
}

/// Foreign key into the template table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateId(pub String);

/// World transform. Written only by the arbiter after spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, uniform_scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::splat(uniform_scale),
        }
    }

    /// Scale value used for range checks (X component, as scales are uniform).
    pub fn uniform_scale(&self) -> f32 {
        self.scale.x
    }
}

/// Shown/hidden. Hidden entities keep their state and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visible(pub bool);

/// Pick volume, half size at scale 1.
#[derive(Debug, Clone, Copy)]
pub struct PickBounds {
    pub half_extents: Vec3,
}

impl PickBounds {
    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        Aabb::from_center_half_extents(transform.position, self.half_extents * transform.scale)
    }
}

// ---------------------------------------------------------------------------
// Capabilities. An entity carries the subset it supports.
// ---------------------------------------------------------------------------

/// Spawned by a tracking anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trackable {
    pub anchor: String,
}

/// Can be selected, moved and rotated by gestures.
#[derive(Debug, Clone, Copy)]
pub struct Draggable;

/// Can be pinch/scroll scaled.
#[derive(Debug, Clone, Copy)]
pub struct Scalable;

/// Current autonomous activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BehaviorPhase {
    Idle,
    Walking,
    Eating,
    Sleeping,
}

impl BehaviorPhase {
    pub fn label(self) -> &'static str {
        match self {
            BehaviorPhase::Idle => "Idle",
            BehaviorPhase::Walking => "Walking",
            BehaviorPhase::Eating => "Eating",
            BehaviorPhase::Sleeping => "Sleeping",
        }
    }
}

/// Per-entity behavior state machine (the Autonomous capability).
#[derive(Debug, Clone, Copy)]
pub struct BehaviorState {
    pub phase: BehaviorPhase,
    /// Seconds since entering `phase`.
    pub timer: f32,
    /// Walk destination. Only meaningful while Walking.
    pub target: Vec3,
    /// False while a gesture owns the transform.
    pub ai_enabled: bool,
    /// Current walk speed in meters/second.
    pub speed: f32,
    /// Remaining seconds of a commanded look at the camera.
    pub look_timer: f32,
    /// Template orientation that facing yaw is applied on top of.
    pub base_rotation: Quat,
}

impl BehaviorState {
    pub fn new(base_rotation: Quat) -> Self {
        Self {
            phase: BehaviorPhase::Idle,
            timer: 0.0,
            target: Vec3::ZERO,
            ai_enabled: true,
            speed: 0.0,
            look_timer: 0.0,
            base_rotation,
        }
    }
}
