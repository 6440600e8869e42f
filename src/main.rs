use std::error::Error;
use std::rc::Rc;

use critter_anchor::{
    AnchorEvent, ArSession, Camera, CoreConfig, CoreEvent, FrameInput, Pose, SurfaceRaycaster,
    Template, TemplateDatabase, TemplateTable, Touch, TouchPhase, TrackingConfidence,
};
use glam::{Vec2, Vec3};

const FRAME_DT: f32 = 1.0 / 60.0;
const MARKER: &str = "tiger_card";

/// Flat tabletop standing in for perception plane hits.
struct Tabletop {
    camera: Camera,
    height: f32,
}

impl SurfaceRaycaster for Tabletop {
    fn raycast(&self, screen: Vec2) -> Option<Pose> {
        let ray = self.camera.screen_point_to_ray(screen);
        ray.intersect_plane(Vec3::Y * self.height, Vec3::Y)
            .map(|t| Pose::at(ray.point_at(t)))
    }
}

fn builtin_templates() -> TemplateDatabase {
    let mut tiger = Template::new("tiger", "critters/tiger").with_image_target(MARKER);
    tiger.display_name = "Tiger".into();
    tiger.default_scale = 0.3;
    let mut owl = Template::new("owl", "critters/owl");
    owl.display_name = "Owl".into();
    owl.default_scale = 0.2;
    TemplateDatabase::new([tiger, owl])
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => CoreConfig::load_from_file(path)?,
        None => CoreConfig::default(),
    };
    let templates: Rc<dyn TemplateTable> = match args.next() {
        Some(path) => Rc::new(TemplateDatabase::load_from_file(path)?),
        None => Rc::new(builtin_templates()),
    };

    let camera = Camera::new(
        Pose::at(Vec3::new(0.0, 0.4, 0.0)),
        60f32.to_radians(),
        Vec2::new(1080.0, 1920.0),
    );
    let table = Tabletop {
        camera,
        height: 0.0,
    };
    let marker_pose = Pose::at(Vec3::new(0.0, 0.0, -1.2));
    let mut session = ArSession::new(config, templates).with_rng_seed(42);

    let frame = |session: &mut ArSession, anchors: Vec<AnchorEvent>, touches: Vec<Touch>| {
        let mut input = FrameInput::new(FRAME_DT)
            .with_camera(camera)
            .with_surfaces(&table)
            .with_touches(touches);
        input.anchors = anchors;
        session.frame(&input);
        for event in session.drain_events() {
            match event {
                CoreEvent::EntitySpawned { instance, template } => {
                    log::info!("event: {} spawned from '{}'", instance, template)
                }
                CoreEvent::EntityDespawned { instance } => log::info!("event: {} despawned", instance),
                CoreEvent::SelectionChanged { previous, current } => {
                    log::info!("event: selection {:?} -> {:?}", previous, current)
                }
            }
        }
        session.drain_scene_commands().len()
    };

    // Marker comes into view and stays tracked for a second.
    frame(
        &mut session,
        vec![AnchorEvent::Added {
            id: MARKER.into(),
            pose: marker_pose,
        }],
        Vec::new(),
    );
    for _ in 0..60 {
        let update = AnchorEvent::Updated {
            id: MARKER.into(),
            pose: marker_pose,
            confidence: TrackingConfidence::Tracking,
        };
        frame(&mut session, vec![update], Vec::new());
    }
    let tiger = session
        .tracking()
        .bound_entity(MARKER)
        .ok_or("marker did not spawn a critter")?;

    // Select the tiger, drag it a little, then pinch it bigger.
    let current = session
        .registry()
        .transform(tiger)
        .ok_or("tiger vanished")?;
    let tap = camera
        .world_to_screen(current.position)
        .ok_or("tiger is behind the camera")?;
    frame(&mut session, Vec::new(), vec![Touch::began(0, tap)]);
    for step in 1..=20 {
        let pos = tap + Vec2::new(step as f32 * 4.0, 0.0);
        frame(&mut session, Vec::new(), vec![Touch::moved(0, pos, Vec2::new(4.0, 0.0))]);
    }
    let held = tap + Vec2::new(80.0, 0.0);
    let pinch = |spread: f32, phase: TouchPhase| {
        let mut a = Touch::began(0, held - Vec2::new(spread, 0.0));
        let mut b = Touch::began(1, held + Vec2::new(spread, 0.0));
        a.phase = phase;
        b.phase = phase;
        vec![a, b]
    };
    frame(&mut session, Vec::new(), pinch(60.0, TouchPhase::Began));
    for step in 1..=20 {
        frame(
            &mut session,
            Vec::new(),
            pinch(60.0 + step as f32 * 3.0, TouchPhase::Moved),
        );
    }
    frame(&mut session, Vec::new(), Vec::new());
    session.deselect();

    // Spawn an owl on the table in front of the camera.
    let owl = session.spawn_at_center("owl", &camera, Some(&table))?;
    log::info!("Owl {} placed", owl);
    frame(&mut session, Vec::new(), Vec::new());

    // Let both wander for ten seconds.
    for _ in 0..600 {
        frame(&mut session, Vec::new(), Vec::new());
    }

    // The marker gets covered up; the tiger hides after the delay.
    let lost = AnchorEvent::Updated {
        id: MARKER.into(),
        pose: marker_pose,
        confidence: TrackingConfidence::Lost,
    };
    frame(&mut session, vec![lost], Vec::new());
    for _ in 0..150 {
        frame(&mut session, Vec::new(), Vec::new());
    }

    for id in session.registry().ids() {
        if let Some(record) = session.registry().record(id) {
            let phase = session
                .registry()
                .behavior(id)
                .map_or("static", |b| b.phase.label());
            log::info!(
                "{} '{}' visible={} pos={:?} scale={:.2} phase={}",
                record.instance,
                record.template,
                record.visible,
                record.transform.position,
                record.transform.uniform_scale(),
                phase,
            );
        }
    }
    let stats = session.stats();
    log::info!(
        "Ran {} frames, last frame work {:.1}us",
        stats.frame_count,
        stats.profile.frame_us(),
    );
    Ok(())
}

fn main() {
    env_logger::init();
    log::info!("critter-anchor demo starting up");

    if let Err(e) = run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
