use std::rc::Rc;

use glam::{Vec2, Vec3};
use instant::Instant;

use crate::arbiter::{InteractionArbiter, TransformProposals};
use crate::config::CoreConfig;
use crate::debug::profile::FramePhase;
use crate::debug::FrameStats;
use crate::ecs::components::{BehaviorState, InstanceId};
use crate::ecs::systems::behavior;
use crate::error::CoreError;
use crate::events::{CoreEvent, SceneCommand};
use crate::gesture::{
    FrameView, GestureInteractionController, MouseSample, SurfaceRaycaster, Touch, TouchPhase,
};
use crate::math::{Camera, Pose};
use crate::placement::PlacementTool;
use crate::registry::EntityRegistry;
use crate::templates::TemplateTable;
use crate::tracking::{AnchorEvent, TrackingLifecycleController};

/// How far along the camera ray a critter lands when no surface is hit.
const FALLBACK_SPAWN_DISTANCE: f32 = 1.0;

/// Pointer input for one frame.
#[derive(Debug, Clone)]
pub enum PointerInput {
    Touches(Vec<Touch>),
    Mouse(MouseSample),
}

impl Default for PointerInput {
    fn default() -> Self {
        Self::Touches(Vec::new())
    }
}

/// Everything the host hands the core for one frame.
pub struct FrameInput<'a> {
    pub dt: f32,
    pub anchors: Vec<AnchorEvent>,
    pub pointer: PointerInput,
    pub camera: Option<Camera>,
    pub surfaces: Option<&'a dyn SurfaceRaycaster>,
}

impl<'a> FrameInput<'a> {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            anchors: Vec::new(),
            pointer: PointerInput::default(),
            camera: None,
            surfaces: None,
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_anchor(mut self, event: AnchorEvent) -> Self {
        self.anchors.push(event);
        self
    }

    pub fn with_touches(mut self, touches: Vec<Touch>) -> Self {
        self.pointer = PointerInput::Touches(touches);
        self
    }

    pub fn with_mouse(mut self, mouse: MouseSample) -> Self {
        self.pointer = PointerInput::Mouse(mouse);
        self
    }

    pub fn with_surfaces(mut self, surfaces: &'a dyn SurfaceRaycaster) -> Self {
        self.surfaces = Some(surfaces);
        self
    }
}

/// The whole core: owns the registry and runs the controllers once per frame
/// in a fixed order (tracking, gesture, behavior, then the arbiter commit).
pub struct ArSession {
    config: CoreConfig,
    templates: Rc<dyn TemplateTable>,
    registry: EntityRegistry,
    tracking: TrackingLifecycleController,
    gesture: GestureInteractionController,
    arbiter: InteractionArbiter,
    proposals: TransformProposals,
    placement: PlacementTool,
    rng: fastrand::Rng,
    stats: FrameStats,
}

impl ArSession {
    pub fn new(config: CoreConfig, templates: Rc<dyn TemplateTable>) -> Self {
        Self {
            tracking: TrackingLifecycleController::new(Rc::clone(&templates), config.tracking.clone()),
            gesture: GestureInteractionController::new(config.gesture.clone()),
            placement: PlacementTool::new(&config.placement),
            arbiter: InteractionArbiter::new(),
            proposals: TransformProposals::new(),
            registry: EntityRegistry::new(),
            rng: fastrand::Rng::new(),
            stats: FrameStats::new(),
            templates,
            config,
        }
    }

    /// Reseed the behavior RNG for reproducible runs.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn frame(&mut self, input: &FrameInput<'_>) {
        let dt = input.dt.max(0.0);

        // Tracking. Countdowns advance before the batch, so time starts
        // counting from the report that armed them.
        let started = Instant::now();
        self.tracking.tick(dt, &mut self.registry);
        let selected = self.gesture.selected();
        for event in &input.anchors {
            if let Err(err) =
                self.tracking
                    .apply(event, &mut self.registry, &mut self.proposals, selected)
            {
                err.log_skipped("anchor event");
            }
        }
        self.stats.profile.record(FramePhase::Tracking, started);

        // Gesture
        let started = Instant::now();
        self.placement.tick(dt);
        let view = FrameView {
            camera: input.camera.as_ref(),
            dt,
            surfaces: input.surfaces,
        };
        match &input.pointer {
            PointerInput::Touches(touches) => {
                if !self.place_from_tap(touches, input.surfaces) {
                    self.gesture
                        .process_frame(touches, &view, &mut self.registry, &mut self.proposals);
                }
            }
            PointerInput::Mouse(mouse) => {
                self.gesture
                    .process_mouse(mouse, &view, &mut self.registry, &mut self.proposals);
            }
        }
        self.arbiter
            .sync_selection(self.gesture.selected(), &mut self.registry);
        self.stats.profile.record(FramePhase::Gesture, started);

        // Behavior
        let started = Instant::now();
        let camera_position = input.camera.map(|c| c.position());
        behavior::update(
            self.registry.world_mut(),
            dt,
            &self.config.behavior,
            camera_position,
            &mut self.rng,
            &mut self.proposals,
        );
        self.stats.profile.record(FramePhase::Behavior, started);

        // Arbiter
        let started = Instant::now();
        self.arbiter.commit(&mut self.proposals, &mut self.registry);
        self.stats.profile.record(FramePhase::Arbiter, started);

        self.stats.record_frame(dt as f64, self.registry.len());
    }

    /// Placement mode swallows single Began taps. Returns whether it did.
    fn place_from_tap(&mut self, touches: &[Touch], surfaces: Option<&dyn SurfaceRaycaster>) -> bool {
        let [touch] = touches else {
            return false;
        };
        if !self.placement.is_active() || touch.phase != TouchPhase::Began {
            return false;
        }
        match self.placement.try_place(touch, surfaces) {
            Ok(Some(pose)) => {
                if let Some(template_id) = self.placement.template().map(str::to_owned) {
                    if let Err(err) = self.spawn_template(&template_id, pose) {
                        err.log_skipped("placement");
                    }
                }
            }
            Ok(None) => {}
            Err(err) => err.log_skipped("placement"),
        }
        true
    }

    fn spawn_template(&mut self, template_id: &str, pose: Pose) -> Result<InstanceId, CoreError> {
        let template = self
            .templates
            .lookup_template(template_id)
            .ok_or_else(|| CoreError::template_miss(template_id))?;
        Ok(self.registry.spawn(template, pose, None))
    }

    /// Spawn an unanchored critter under a screen point: on a detected
    /// surface when snapping is on and one is hit, else a meter along the ray.
    pub fn spawn_at_screen_point(
        &mut self,
        template_id: &str,
        screen: Vec2,
        camera: &Camera,
        surfaces: Option<&dyn SurfaceRaycaster>,
    ) -> Result<InstanceId, CoreError> {
        let surface_hit = if self.config.gesture.snap_to_planes {
            surfaces.and_then(|s| s.raycast(screen))
        } else {
            None
        };
        let position = match surface_hit {
            Some(pose) => pose.position,
            None => camera
                .screen_point_to_ray(screen)
                .point_at(FALLBACK_SPAWN_DISTANCE),
        };
        self.spawn_template(template_id, Pose::at(position))
    }

    pub fn spawn_at_center(
        &mut self,
        template_id: &str,
        camera: &Camera,
        surfaces: Option<&dyn SurfaceRaycaster>,
    ) -> Result<InstanceId, CoreError> {
        self.spawn_at_screen_point(template_id, camera.screen_center(), camera, surfaces)
    }

    /// Remove a critter. Its anchor, if any, becomes free to spawn again.
    pub fn despawn(&mut self, instance: InstanceId) -> Result<(), CoreError> {
        self.registry.despawn(instance)?;
        self.tracking.release(instance);
        Ok(())
    }

    pub fn despawn_all(&mut self) -> Vec<InstanceId> {
        let cleared = self.registry.clear();
        for &id in &cleared {
            self.tracking.release(id);
        }
        cleared
    }

    pub fn clear_all_markers(&mut self) -> Vec<InstanceId> {
        self.tracking.clear_all_markers(&mut self.registry)
    }

    /// Send a critter walking. Non-finite targets are refused; returns
    /// whether the command was taken.
    pub fn command_walk_to(&mut self, instance: InstanceId, target: Vec3) -> Result<bool, CoreError> {
        if !target.is_finite() {
            log::warn!("Ignoring non-finite walk target {:?} for {}", target, instance);
            return Ok(false);
        }
        let transform = self
            .registry
            .transform(instance)
            .ok_or(CoreError::StaleReference(instance))?;
        self.behavior_of(instance)?.command_walk_to(&transform, target);
        Ok(true)
    }

    pub fn command_eat(&mut self, instance: InstanceId) -> Result<(), CoreError> {
        self.behavior_of(instance)?.command_eat();
        Ok(())
    }

    pub fn command_sleep(&mut self, instance: InstanceId) -> Result<(), CoreError> {
        self.behavior_of(instance)?.command_sleep();
        Ok(())
    }

    pub fn command_look_at_camera(&mut self, instance: InstanceId) -> Result<(), CoreError> {
        let cfg = &self.config.behavior;
        self.registry
            .behavior_mut(instance)
            .ok_or_else(|| CoreError::instance_miss(instance))?
            .command_look_at_camera(cfg);
        Ok(())
    }

    /// Toggle autonomous behavior. A gesture-selected critter stays disabled
    /// until it is deselected.
    pub fn set_ai_enabled(&mut self, instance: InstanceId, enabled: bool) -> Result<(), CoreError> {
        if enabled && self.arbiter.owner() == Some(instance) {
            log::debug!("{} is under gesture control, AI stays off", instance);
            return Ok(());
        }
        self.behavior_of(instance)?.set_ai_enabled(enabled);
        Ok(())
    }

    fn behavior_of(
        &mut self,
        instance: InstanceId,
    ) -> Result<&mut BehaviorState, CoreError> {
        self.registry
            .behavior_mut(instance)
            .ok_or_else(|| CoreError::instance_miss(instance))
    }

    pub fn set_interaction_enabled(&mut self, enabled: bool) {
        self.gesture
            .set_interaction_enabled(enabled, &mut self.registry);
        self.arbiter
            .sync_selection(self.gesture.selected(), &mut self.registry);
    }

    /// Explicit deselect. Returns whether anything was selected.
    pub fn deselect(&mut self) -> bool {
        let changed = self.gesture.deselect(&mut self.registry);
        self.arbiter
            .sync_selection(self.gesture.selected(), &mut self.registry);
        changed
    }

    pub fn start_placement(&mut self, template_id: &str) -> Result<(), CoreError> {
        if self.templates.lookup_template(template_id).is_none() {
            return Err(CoreError::template_miss(template_id));
        }
        self.placement.activate(template_id);
        Ok(())
    }

    pub fn stop_placement(&mut self) {
        self.placement.deactivate();
    }

    pub fn selected(&self) -> Option<InstanceId> {
        self.gesture.selected()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn tracking(&self) -> &TrackingLifecycleController {
        &self.tracking
    }

    pub fn gesture(&self) -> &GestureInteractionController {
        &self.gesture
    }

    pub fn placement(&self) -> &PlacementTool {
        &self.placement
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        self.registry.outbox_mut().drain_events()
    }

    pub fn drain_scene_commands(&mut self) -> Vec<SceneCommand> {
        self.registry.outbox_mut().drain_scene()
    }
}
