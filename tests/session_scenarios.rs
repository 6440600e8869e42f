use std::rc::Rc;

use critter_anchor::config::{BehaviorConfig, GestureConfig};
use critter_anchor::ecs::systems::behavior::BehaviorRng;
use critter_anchor::ecs::components::BehaviorState;
use critter_anchor::{
    AnchorEvent, ArSession, BehaviorPhase, Camera, CoreConfig, CoreEvent, FrameInput, InstanceId,
    Pose, Template, TemplateDatabase, Touch, TouchPhase, TrackingConfidence, Transform,
};
use glam::{Quat, Vec2, Vec3};

const MARKER: &str = "tiger";

fn camera() -> Camera {
    Camera::new(
        Pose::at(Vec3::new(0.0, 1.0, 0.0)),
        60f32.to_radians(),
        Vec2::new(800.0, 600.0),
    )
}

fn session_with(config: CoreConfig) -> ArSession {
    let templates = TemplateDatabase::new([Template::new("tiger", "models/tiger")]);
    ArSession::new(config, Rc::new(templates)).with_rng_seed(1)
}

fn added(pose: Pose) -> AnchorEvent {
    AnchorEvent::Added {
        id: MARKER.into(),
        pose,
    }
}

fn updated(confidence: TrackingConfidence) -> AnchorEvent {
    AnchorEvent::Updated {
        id: MARKER.into(),
        pose: Pose::at(Vec3::new(0.0, 0.0, -6.0)),
        confidence,
    }
}

/// Spawns the tiger at (0, 0, -6) and returns its id and screen position.
fn spawn_tiger(session: &mut ArSession) -> (InstanceId, Vec2) {
    let pose = Pose::at(Vec3::new(0.0, 0.0, -6.0));
    session.frame(&FrameInput::new(0.016).with_camera(camera()).with_anchor(added(pose)));
    let id = session.tracking().bound_entity(MARKER).unwrap();
    let screen = camera().world_to_screen(pose.position).unwrap();
    session.drain_events();
    (id, screen)
}

fn touch_frame(session: &mut ArSession, touches: Vec<Touch>) {
    session.frame(&FrameInput::new(0.016).with_camera(camera()).with_touches(touches));
}

fn pinch(center: Vec2, half: f32, phase: TouchPhase) -> Vec<Touch> {
    let mut a = Touch::began(0, center - Vec2::new(half, 0.0));
    let mut b = Touch::began(1, center + Vec2::new(half, 0.0));
    a.phase = phase;
    b.phase = phase;
    vec![a, b]
}

fn scale_of(session: &ArSession, id: InstanceId) -> f32 {
    session.registry().transform(id).unwrap().uniform_scale()
}

#[test]
fn double_detection_binds_one_entity() {
    let mut session = session_with(CoreConfig::default());
    let pose = Pose::at(Vec3::new(0.0, 0.0, -2.0));
    session.frame(
        &FrameInput::new(0.016)
            .with_anchor(added(pose))
            .with_anchor(added(pose)),
    );
    session.frame(&FrameInput::new(0.016).with_anchor(added(pose)));

    assert_eq!(session.registry().len(), 1);
    let spawned = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::EntitySpawned { .. }))
        .count();
    assert_eq!(spawned, 1);
}

#[test]
fn tiger_hides_after_delay_but_survives() {
    let mut session = session_with(CoreConfig::default());
    let pose = Pose::at(Vec3::new(0.3, 0.0, -2.0));
    session.frame(&FrameInput::new(0.5).with_anchor(added(pose)));
    let id = session.tracking().bound_entity(MARKER).unwrap();
    let record = session.registry().record(id).unwrap();
    assert_eq!(record.transform.position, pose.position);
    assert_eq!(session.registry().behavior(id).unwrap().phase, BehaviorPhase::Idle);

    // Two seconds after the loss report: four half-second frames.
    session.frame(&FrameInput::new(0.5).with_anchor(updated(TrackingConfidence::Lost)));
    assert_eq!(session.registry().is_visible(id), Some(true));
    for _ in 0..3 {
        session.frame(&FrameInput::new(0.5));
        assert_eq!(session.registry().is_visible(id), Some(true));
    }
    session.frame(&FrameInput::new(0.5));
    assert_eq!(session.registry().is_visible(id), Some(false));
    assert!(session.registry().contains(id));

    session.frame(&FrameInput::new(0.5).with_anchor(updated(TrackingConfidence::Tracking)));
    assert_eq!(session.registry().is_visible(id), Some(true));
}

#[test]
fn selection_owns_ai_flag() {
    let mut session = session_with(CoreConfig::default());
    let (id, screen) = spawn_tiger(&mut session);

    touch_frame(&mut session, vec![Touch::began(0, screen)]);
    assert_eq!(session.selected(), Some(id));
    for _ in 0..30 {
        touch_frame(&mut session, Vec::new());
        assert!(!session.registry().behavior(id).unwrap().ai_enabled);
    }
    session.set_ai_enabled(id, true).unwrap();
    assert!(!session.registry().behavior(id).unwrap().ai_enabled);

    touch_frame(&mut session, vec![Touch::began(0, screen)]);
    assert_eq!(session.selected(), None);
    let state = session.registry().behavior(id).unwrap();
    assert!(state.ai_enabled);
    assert!(state.timer >= 0.0);
}

#[test]
fn second_tap_fires_exactly_one_deselect() {
    let mut session = session_with(CoreConfig::default());
    let (id, screen) = spawn_tiger(&mut session);

    touch_frame(&mut session, vec![Touch::began(0, screen)]);
    touch_frame(&mut session, vec![Touch::began(0, screen)]);
    let deselects: Vec<CoreEvent> = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::SelectionChanged { current: None, .. }))
        .collect();
    assert_eq!(
        deselects,
        vec![CoreEvent::SelectionChanged {
            previous: Some(id),
            current: None
        }]
    );
    assert_eq!(session.selected(), None);
}

#[test]
fn pinch_boundary_scenario() {
    let config = CoreConfig {
        gesture: GestureConfig {
            min_scale: 0.5,
            max_scale: 3.0,
            ..GestureConfig::default()
        },
        ..CoreConfig::default()
    };
    let mut session = session_with(config);
    let (id, screen) = spawn_tiger(&mut session);
    assert_eq!(scale_of(&session, id), 1.0);

    touch_frame(&mut session, pinch(screen, 50.0, TouchPhase::Began));
    assert_eq!(session.selected(), Some(id));

    touch_frame(&mut session, pinch(screen, 25.0, TouchPhase::Moved));
    assert_eq!(scale_of(&session, id), 0.5);

    touch_frame(&mut session, pinch(screen, 5.0, TouchPhase::Moved));
    assert_eq!(scale_of(&session, id), 0.5);
}

#[test]
fn out_of_range_pinch_never_touches_scale() {
    let mut session = session_with(CoreConfig::default());
    let (id, screen) = spawn_tiger(&mut session);
    touch_frame(&mut session, pinch(screen, 40.0, TouchPhase::Began));

    // Default range is [0.1, 5.0].
    for half in [2.0, 3.0, 220.0, 300.0] {
        let before = session.registry().transform(id).unwrap();
        touch_frame(&mut session, pinch(screen, half, TouchPhase::Moved));
        assert_eq!(session.registry().transform(id).unwrap().scale, before.scale);
    }
}

#[test]
fn full_pinch_cycle_restores_scale() {
    let mut session = session_with(CoreConfig::default());
    let (id, screen) = spawn_tiger(&mut session);
    touch_frame(&mut session, pinch(screen, 40.0, TouchPhase::Began));
    for half in [50.0, 70.0, 90.0, 60.0, 30.0, 40.0] {
        touch_frame(&mut session, pinch(screen, half, TouchPhase::Moved));
    }
    assert!((scale_of(&session, id) - 1.0).abs() < 1e-5);
}

#[test]
fn selected_critter_stays_put_while_behavior_would_move_it() {
    let mut session = session_with(CoreConfig::default());
    let (id, screen) = spawn_tiger(&mut session);
    session.command_walk_to(id, Vec3::new(3.0, 0.0, -6.0)).unwrap();
    touch_frame(&mut session, vec![Touch::began(0, screen)]);
    let held = session.registry().transform(id).unwrap();
    for _ in 0..60 {
        touch_frame(&mut session, Vec::new());
    }
    assert_eq!(session.registry().transform(id).unwrap(), held);
}

/// Forces every draw.
struct FixedDraws;

impl BehaviorRng for FixedDraws {
    fn roll(&mut self) -> f32 {
        0.1
    }

    fn unit_disc(&mut self) -> Vec2 {
        Vec2::new(-0.4, 0.7)
    }
}

#[test]
fn wander_then_rest_scenario() {
    let cfg = BehaviorConfig::default();
    let mut state = BehaviorState::new(Quat::IDENTITY);
    let mut transform = Transform::new(Vec3::new(1.0, 0.0, 1.0), Quat::IDENTITY, 1.0);
    let start = transform.position;

    let mut ticks = 0;
    while state.phase == BehaviorPhase::Idle {
        state.tick(&mut transform, 0.1, &cfg, None, &mut FixedDraws);
        ticks += 1;
        assert!(ticks < 100);
    }
    assert_eq!(state.phase, BehaviorPhase::Walking);
    let offset = state.target - start;
    assert_eq!(offset.y, 0.0);
    assert!(Vec2::new(offset.x, offset.z).length() <= cfg.wander_radius + 1e-4);

    let target = state.target;
    let mut ticks = 0;
    while state.phase == BehaviorPhase::Walking {
        state.tick(&mut transform, 0.1, &cfg, None, &mut FixedDraws);
        ticks += 1;
        assert!(ticks < 2000);
    }
    assert_eq!(state.phase, BehaviorPhase::Idle);
    assert_eq!(state.timer, 0.0);
    let left = Vec2::new(target.x - transform.position.x, target.z - transform.position.z);
    assert!(left.length() < cfg.stopping_distance);
}
