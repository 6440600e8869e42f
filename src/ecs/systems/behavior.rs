use glam::{Vec2, Vec3};

use crate::arbiter::{TransformProposals, WriteSource};
use crate::config::BehaviorConfig;
use crate::ecs::components::{BehaviorPhase, BehaviorState, InstanceId, Transform, Visible};
use crate::math::yaw_towards;

/// Share of idle exits that go wandering; the rest split evenly between
/// eating and sleeping.
const WANDER_CHANCE: f32 = 0.5;
const EAT_CHANCE: f32 = 0.25;

/// Random draws used by the behavior loop.
pub trait BehaviorRng {
    /// Uniform in `[0, 1)`.
    fn roll(&mut self) -> f32;
    /// Uniform point inside the unit disc.
    fn unit_disc(&mut self) -> Vec2;
}

impl BehaviorRng for fastrand::Rng {
    fn roll(&mut self) -> f32 {
        self.f32()
    }

    fn unit_disc(&mut self) -> Vec2 {
        loop {
            let p = Vec2::new(self.f32() * 2.0 - 1.0, self.f32() * 2.0 - 1.0);
            if p.length_squared() <= 1.0 {
                return p;
            }
        }
    }
}

impl BehaviorState {
    /// Switch phase. The phase timer always restarts.
    fn enter(&mut self, phase: BehaviorPhase) {
        self.phase = phase;
        self.timer = 0.0;
    }

    pub fn command_walk_to(&mut self, current: &Transform, target: Vec3) {
        self.target = Vec3::new(target.x, current.position.y, target.z);
        self.speed = 0.0;
        self.look_timer = 0.0;
        self.enter(BehaviorPhase::Walking);
        log::debug!("Walking to {:?}", self.target);
    }

    pub fn command_eat(&mut self) {
        self.look_timer = 0.0;
        self.enter(BehaviorPhase::Eating);
    }

    pub fn command_sleep(&mut self) {
        self.look_timer = 0.0;
        self.enter(BehaviorPhase::Sleeping);
    }

    /// Stop and turn toward the camera for a while.
    pub fn command_look_at_camera(&mut self, cfg: &BehaviorConfig) {
        self.enter(BehaviorPhase::Idle);
        self.look_timer = cfg.look_duration;
    }

    /// Disabling freezes phase and transform; enabling restarts from Idle.
    pub fn set_ai_enabled(&mut self, enabled: bool) {
        if enabled == self.ai_enabled {
            return;
        }
        self.ai_enabled = enabled;
        if enabled {
            self.speed = 0.0;
            self.look_timer = 0.0;
            self.enter(BehaviorPhase::Idle);
        }
    }

    /// Advance one frame, moving `transform` in place.
    pub fn tick<R: BehaviorRng + ?Sized>(
        &mut self,
        transform: &mut Transform,
        dt: f32,
        cfg: &BehaviorConfig,
        camera: Option<Vec3>,
        rng: &mut R,
    ) {
        if !self.ai_enabled {
            return;
        }

        self.timer += dt;

        match self.phase {
            BehaviorPhase::Idle => {
                self.decelerate(dt, cfg);
                if self.timer > cfg.idle_time {
                    self.leave_idle(transform, cfg, rng);
                }
            }
            BehaviorPhase::Walking => self.walk(transform, dt, cfg),
            BehaviorPhase::Eating => {
                self.decelerate(dt, cfg);
                if self.timer > cfg.eat_duration {
                    self.enter(BehaviorPhase::Idle);
                }
            }
            BehaviorPhase::Sleeping => {
                self.decelerate(dt, cfg);
                if self.timer > cfg.sleep_duration {
                    self.enter(BehaviorPhase::Idle);
                }
            }
        }

        if self.look_timer <= 0.0
            && self.phase != BehaviorPhase::Walking
            && camera.is_some()
            && rng.roll() < cfg.look_chance
        {
            self.look_timer = cfg.look_duration;
        }

        if self.look_timer > 0.0 {
            self.look_timer = (self.look_timer - dt).max(0.0);
            if self.phase != BehaviorPhase::Walking {
                if let Some(camera) = camera {
                    self.face(transform, camera - transform.position, cfg.look_turn_speed * dt);
                }
            }
        }
    }

    fn leave_idle<R: BehaviorRng + ?Sized>(
        &mut self,
        transform: &Transform,
        cfg: &BehaviorConfig,
        rng: &mut R,
    ) {
        let roll = rng.roll();
        if roll < WANDER_CHANCE {
            let offset = rng.unit_disc() * cfg.wander_radius;
            self.target = transform.position + Vec3::new(offset.x, 0.0, offset.y);
            self.speed = 0.0;
            self.enter(BehaviorPhase::Walking);
        } else if roll < WANDER_CHANCE + EAT_CHANCE {
            self.enter(BehaviorPhase::Eating);
        } else {
            self.enter(BehaviorPhase::Sleeping);
        }
    }

    fn walk(&mut self, transform: &mut Transform, dt: f32, cfg: &BehaviorConfig) {
        let mut to_target = self.target - transform.position;
        to_target.y = 0.0;
        let distance = to_target.length();

        if distance < cfg.stopping_distance {
            self.speed = 0.0;
            self.enter(BehaviorPhase::Idle);
            log::debug!("Reached {:?}", self.target);
            return;
        }

        let blend = (cfg.acceleration * dt).clamp(0.0, 1.0);
        self.speed += (cfg.move_speed - self.speed) * blend;

        let slowdown = if cfg.slowdown_distance > 0.0 {
            (distance / cfg.slowdown_distance).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let step = (self.speed * slowdown * dt).min(distance);

        self.face(transform, to_target, cfg.turn_speed * dt);
        transform.position += to_target / distance * step;
    }

    fn decelerate(&mut self, dt: f32, cfg: &BehaviorConfig) {
        let blend = (cfg.acceleration * dt).clamp(0.0, 1.0);
        self.speed -= self.speed * blend;
    }

    fn face(&self, transform: &mut Transform, direction: Vec3, blend: f32) {
        if let Some(yaw) = yaw_towards(direction) {
            let goal = yaw * self.base_rotation;
            transform.rotation = transform.rotation.slerp(goal, blend.clamp(0.0, 1.0));
        }
    }
}

/// Advance every visible, AI-enabled critter and propose its new transform.
pub fn update<R: BehaviorRng + ?Sized>(
    world: &mut hecs::World,
    dt: f32,
    cfg: &BehaviorConfig,
    camera: Option<Vec3>,
    rng: &mut R,
    proposals: &mut TransformProposals,
) {
    for (_, (id, transform, state, visible)) in
        world.query_mut::<(&InstanceId, &Transform, &mut BehaviorState, &Visible)>()
    {
        if !visible.0 || !state.ai_enabled {
            continue;
        }
        let mut next = *transform;
        state.tick(&mut next, dt, cfg, camera, rng);
        if next != *transform {
            proposals.propose(*id, WriteSource::Behavior, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    /// Replays fixed draws.
    struct ScriptedRng {
        roll: f32,
        disc: Vec2,
    }

    impl BehaviorRng for ScriptedRng {
        fn roll(&mut self) -> f32 {
            self.roll
        }

        fn unit_disc(&mut self) -> Vec2 {
            self.disc
        }
    }

    fn origin() -> Transform {
        Transform::new(Vec3::ZERO, Quat::IDENTITY, 1.0)
    }

    fn run_until_phase_change(
        state: &mut BehaviorState,
        transform: &mut Transform,
        cfg: &BehaviorConfig,
        rng: &mut ScriptedRng,
        max_ticks: usize,
    ) -> bool {
        let start = state.phase;
        for _ in 0..max_ticks {
            state.tick(transform, 0.1, cfg, None, rng);
            if state.phase != start {
                return true;
            }
        }
        false
    }

    #[test]
    fn idle_draw_below_half_wanders_then_returns_to_idle() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.1,
            disc: Vec2::new(0.6, -0.3),
        };
        let mut state = BehaviorState::new(Quat::IDENTITY);
        let mut transform = origin();

        assert!(run_until_phase_change(&mut state, &mut transform, &cfg, &mut rng, 100));
        assert_eq!(state.phase, BehaviorPhase::Walking);
        assert_eq!(state.timer, 0.0);
        let flat = Vec2::new(state.target.x, state.target.z);
        assert!(flat.length() <= cfg.wander_radius);
        assert_eq!(state.target.y, 0.0);

        assert!(run_until_phase_change(&mut state, &mut transform, &cfg, &mut rng, 2000));
        assert_eq!(state.phase, BehaviorPhase::Idle);
        assert_eq!(state.timer, 0.0);
        assert_eq!(state.speed, 0.0);
        let remaining = (state.target - transform.position) * Vec3::new(1.0, 0.0, 1.0);
        assert!(remaining.length() < cfg.stopping_distance);
    }

    #[test]
    fn idle_draws_pick_eat_and_sleep() {
        let cfg = BehaviorConfig::default();
        for (roll, expected) in [(0.6, BehaviorPhase::Eating), (0.9, BehaviorPhase::Sleeping)] {
            let mut rng = ScriptedRng {
                roll,
                disc: Vec2::ZERO,
            };
            let mut state = BehaviorState::new(Quat::IDENTITY);
            let mut transform = origin();
            assert!(run_until_phase_change(&mut state, &mut transform, &cfg, &mut rng, 100));
            assert_eq!(state.phase, expected);
        }
    }

    #[test]
    fn eating_and_sleeping_expire_to_idle() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.9,
            disc: Vec2::ZERO,
        };
        let mut transform = origin();

        let mut state = BehaviorState::new(Quat::IDENTITY);
        state.command_eat();
        state.tick(&mut transform, 2.9, &cfg, None, &mut rng);
        assert_eq!(state.phase, BehaviorPhase::Eating);
        state.tick(&mut transform, 0.2, &cfg, None, &mut rng);
        assert_eq!(state.phase, BehaviorPhase::Idle);

        state.command_sleep();
        state.tick(&mut transform, 4.9, &cfg, None, &mut rng);
        assert_eq!(state.phase, BehaviorPhase::Sleeping);
        state.tick(&mut transform, 0.2, &cfg, None, &mut rng);
        assert_eq!(state.phase, BehaviorPhase::Idle);
    }

    #[test]
    fn walking_accelerates_smoothly_and_never_overshoots() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.9,
            disc: Vec2::ZERO,
        };
        let mut state = BehaviorState::new(Quat::IDENTITY);
        let mut transform = origin();
        state.command_walk_to(&transform, Vec3::new(0.0, 4.0, 2.0));
        assert_eq!(state.target.y, 0.0);

        state.tick(&mut transform, 0.1, &cfg, None, &mut rng);
        assert!(state.speed > 0.0 && state.speed < cfg.move_speed);

        let mut last_z = transform.position.z;
        while state.phase == BehaviorPhase::Walking {
            state.tick(&mut transform, 0.1, &cfg, None, &mut rng);
            assert!(transform.position.z >= last_z);
            assert!(transform.position.z <= 2.0);
            last_z = transform.position.z;
        }
        // Facing +Z toward the target.
        assert!((transform.rotation * Vec3::Z - Vec3::Z).length() < 0.05);
    }

    #[test]
    fn commands_override_current_phase() {
        let cfg = BehaviorConfig::default();
        let mut state = BehaviorState::new(Quat::IDENTITY);
        let transform = origin();
        state.command_walk_to(&transform, Vec3::X * 2.0);
        state.timer = 1.5;
        state.command_sleep();
        assert_eq!(state.phase, BehaviorPhase::Sleeping);
        assert_eq!(state.timer, 0.0);
        state.command_look_at_camera(&cfg);
        assert_eq!(state.phase, BehaviorPhase::Idle);
        assert_eq!(state.look_timer, cfg.look_duration);
    }

    #[test]
    fn look_at_camera_turns_toward_camera() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.9,
            disc: Vec2::ZERO,
        };
        let mut state = BehaviorState::new(Quat::IDENTITY);
        let mut transform = origin();
        state.command_look_at_camera(&cfg);
        for _ in 0..20 {
            state.tick(&mut transform, 0.1, &cfg, Some(Vec3::new(-5.0, 1.5, 0.0)), &mut rng);
        }
        let forward = transform.rotation * Vec3::Z;
        assert!(forward.x < -0.9);
        assert!((state.look_timer - 1.0).abs() < 1e-4);
    }

    #[test]
    fn resting_critter_glances_on_a_low_roll() {
        let cfg = BehaviorConfig::default();
        let camera = Some(Vec3::new(4.0, 1.5, 0.0));
        let mut transform = origin();

        let mut state = BehaviorState::new(Quat::IDENTITY);
        let mut high = ScriptedRng {
            roll: 0.5,
            disc: Vec2::ZERO,
        };
        state.tick(&mut transform, 0.1, &cfg, camera, &mut high);
        assert_eq!(state.look_timer, 0.0);
        assert_eq!(transform, origin());

        let mut low = ScriptedRng {
            roll: 0.01,
            disc: Vec2::ZERO,
        };
        state.command_sleep();
        state.tick(&mut transform, 0.1, &cfg, camera, &mut low);
        assert!((state.look_timer - (cfg.look_duration - 0.1)).abs() < 1e-5);
        assert_eq!(state.phase, BehaviorPhase::Sleeping);
        for _ in 0..20 {
            state.tick(&mut transform, 0.1, &cfg, camera, &mut high);
        }
        assert!((transform.rotation * Vec3::Z).x > 0.9);
    }

    #[test]
    fn no_glance_without_a_camera_or_while_walking() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.01,
            disc: Vec2::ZERO,
        };
        let mut transform = origin();
        let mut state = BehaviorState::new(Quat::IDENTITY);
        state.tick(&mut transform, 0.1, &cfg, None, &mut rng);
        assert_eq!(state.look_timer, 0.0);

        state.command_walk_to(&transform, Vec3::Z * 3.0);
        state.tick(&mut transform, 0.1, &cfg, Some(Vec3::X * 4.0), &mut rng);
        assert_eq!(state.look_timer, 0.0);
    }

    #[test]
    fn disabled_ai_holds_everything() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.1,
            disc: Vec2::X,
        };
        let mut state = BehaviorState::new(Quat::IDENTITY);
        let mut transform = origin();
        state.command_walk_to(&transform, Vec3::X * 2.0);
        state.set_ai_enabled(false);
        for _ in 0..50 {
            state.tick(&mut transform, 0.1, &cfg, None, &mut rng);
        }
        assert_eq!(state.phase, BehaviorPhase::Walking);
        assert_eq!(transform, origin());

        state.set_ai_enabled(true);
        assert_eq!(state.phase, BehaviorPhase::Idle);
        assert_eq!(state.timer, 0.0);
    }

    #[test]
    fn update_skips_hidden_and_proposes_moves() {
        let cfg = BehaviorConfig::default();
        let mut rng = ScriptedRng {
            roll: 0.9,
            disc: Vec2::ZERO,
        };
        let mut world = hecs::World::new();
        let mut walker = BehaviorState::new(Quat::IDENTITY);
        walker.command_walk_to(&origin(), Vec3::X * 3.0);
        world.spawn((InstanceId(1), origin(), walker, Visible(true)));
        world.spawn((InstanceId(2), origin(), walker, Visible(false)));

        let mut proposals = TransformProposals::new();
        update(&mut world, 0.1, &cfg, None, &mut rng, &mut proposals);
        assert_eq!(proposals.len(), 1);
        assert!(proposals.latest(InstanceId(1), WriteSource::Behavior).is_some());
    }
}
