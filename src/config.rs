//! Tunables for the tracking, gesture, behavior and placement controllers.
//!
//! Every section deserializes with defaults, so a partial JSON file only needs
//! the values it overrides:
//!
//! ```json
//! {
//!   "tracking": { "hide_delay": 1.5, "follow_anchor": true },
//!   "gesture": { "min_scale": 0.5, "max_scale": 3.0 }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_HIDE_DELAY: f32 = 2.0;

const DEFAULT_MIN_SCALE: f32 = 0.1;
const DEFAULT_MAX_SCALE: f32 = 5.0;
/// Degrees per pixel per second.
const DEFAULT_ROTATION_SPEED: f32 = 50.0;
const DEFAULT_SCROLL_SCALE_SPEED: f32 = 3.0;
/// Lerp factor per frame toward the drag target (1.0 = direct).
const DEFAULT_MOVEMENT_SMOOTHING: f32 = 0.5;
/// Fraction of the region radius beyond which a drag rotates instead of moves.
const DEFAULT_REGION_THRESHOLD: f32 = 0.6;
const DEFAULT_HIT_DISTANCE: f32 = 100.0;
const DEFAULT_MOUSE_ROTATE_FACTOR: f32 = 10.0;

const DEFAULT_MOVE_SPEED: f32 = 0.5;
const DEFAULT_ACCELERATION: f32 = 2.0;
const DEFAULT_TURN_SPEED: f32 = 3.0;
const DEFAULT_STOPPING_DISTANCE: f32 = 0.2;
const DEFAULT_SLOWDOWN_DISTANCE: f32 = 1.0;
const DEFAULT_IDLE_TIME: f32 = 5.0;
const DEFAULT_WANDER_RADIUS: f32 = 3.0;
const DEFAULT_EAT_DURATION: f32 = 3.0;
const DEFAULT_SLEEP_DURATION: f32 = 5.0;
const DEFAULT_LOOK_DURATION: f32 = 3.0;
const DEFAULT_LOOK_TURN_SPEED: f32 = 2.0;
/// Per-tick chance that a resting critter glances at the camera.
const DEFAULT_LOOK_CHANCE: f32 = 0.02;

const DEFAULT_REARM_DELAY: f32 = 0.25;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub tracking: TrackingConfig,
    pub gesture: GestureConfig,
    pub behavior: BehaviorConfig,
    pub placement: PlacementConfig,
}

impl CoreConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Seconds an anchor must stay lost before its entity is hidden.
    pub hide_delay: f32,
    /// Hide entities whose anchor is lost. When false they stay visible.
    pub hide_when_lost: bool,
    /// Keep anchor-bound entities glued to the anchor pose for every template.
    pub follow_anchor: bool,
    /// Spawn as soon as a marker with a matching template is detected.
    pub auto_spawn_on_detect: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            hide_delay: DEFAULT_HIDE_DELAY,
            hide_when_lost: true,
            follow_anchor: false,
            auto_spawn_on_detect: true,
        }
    }
}

/// Screen-derived radius the move/rotate threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionBasis {
    HalfMinDimension,
    HalfDiagonal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub enabled: bool,
    pub min_scale: f32,
    pub max_scale: f32,
    pub rotation_speed: f32,
    pub scroll_scale_speed: f32,
    pub movement_smoothing: f32,
    pub snap_to_planes: bool,
    pub region_threshold: f32,
    pub region_basis: RegionBasis,
    pub hit_distance: f32,
    pub mouse_rotate_factor: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            scroll_scale_speed: DEFAULT_SCROLL_SCALE_SPEED,
            movement_smoothing: DEFAULT_MOVEMENT_SMOOTHING,
            snap_to_planes: true,
            region_threshold: DEFAULT_REGION_THRESHOLD,
            region_basis: RegionBasis::HalfMinDimension,
            hit_distance: DEFAULT_HIT_DISTANCE,
            mouse_rotate_factor: DEFAULT_MOUSE_ROTATE_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Max walk speed in meters/second.
    pub move_speed: f32,
    /// Exponential approach rate toward `move_speed`.
    pub acceleration: f32,
    pub turn_speed: f32,
    pub stopping_distance: f32,
    /// Speed is scaled down linearly inside this distance of the target.
    pub slowdown_distance: f32,
    pub idle_time: f32,
    pub wander_radius: f32,
    pub eat_duration: f32,
    pub sleep_duration: f32,
    pub look_duration: f32,
    pub look_turn_speed: f32,
    /// Rolled each tick while Idle, Eating or Sleeping and not already looking.
    pub look_chance: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            move_speed: DEFAULT_MOVE_SPEED,
            acceleration: DEFAULT_ACCELERATION,
            turn_speed: DEFAULT_TURN_SPEED,
            stopping_distance: DEFAULT_STOPPING_DISTANCE,
            slowdown_distance: DEFAULT_SLOWDOWN_DISTANCE,
            idle_time: DEFAULT_IDLE_TIME,
            wander_radius: DEFAULT_WANDER_RADIUS,
            eat_duration: DEFAULT_EAT_DURATION,
            sleep_duration: DEFAULT_SLEEP_DURATION,
            look_duration: DEFAULT_LOOK_DURATION,
            look_turn_speed: DEFAULT_LOOK_TURN_SPEED,
            look_chance: DEFAULT_LOOK_CHANCE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Seconds after a placement before the next tap can place again.
    pub rearm_delay: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            rearm_delay: DEFAULT_REARM_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = CoreConfig::from_json(
            r#"{ "tracking": { "hide_delay": 1.5 }, "gesture": { "region_basis": "half_diagonal" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.tracking.hide_delay, 1.5);
        assert!(cfg.tracking.hide_when_lost);
        assert_eq!(cfg.gesture.region_basis, RegionBasis::HalfDiagonal);
        assert_eq!(cfg.gesture.max_scale, DEFAULT_MAX_SCALE);
        assert_eq!(cfg.behavior.idle_time, DEFAULT_IDLE_TIME);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = CoreConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
