use glam::{Quat, Vec2, Vec3};

use crate::arbiter::{TransformProposals, WriteSource};
use crate::config::{GestureConfig, RegionBasis};
use crate::ecs::components::{InstanceId, Transform};
use crate::error::CoreError;
use crate::events::CoreEvent;
use crate::math::{Camera, Pose};
use crate::registry::EntityRegistry;

/// Pinch distances below this (pixels) can't be used as a ratio base.
const MIN_PINCH_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Began,
    Moved,
    Ended,
}

/// One active pointer for this frame.
#[derive(Debug, Clone, Copy)]
pub struct Touch {
    pub id: u64,
    /// Screen pixels, origin top-left.
    pub position: Vec2,
    /// Movement since last frame, in pixels.
    pub delta: Vec2,
    pub phase: TouchPhase,
    /// The pointer is over a UI surface and must not reach the scene.
    pub over_ui: bool,
}

impl Touch {
    pub fn began(id: u64, position: Vec2) -> Self {
        Self {
            id,
            position,
            delta: Vec2::ZERO,
            phase: TouchPhase::Began,
            over_ui: false,
        }
    }

    pub fn moved(id: u64, position: Vec2, delta: Vec2) -> Self {
        Self {
            id,
            position,
            delta,
            phase: TouchPhase::Moved,
            over_ui: false,
        }
    }

    pub fn ended(id: u64, position: Vec2) -> Self {
        Self {
            id,
            position,
            delta: Vec2::ZERO,
            phase: TouchPhase::Ended,
            over_ui: false,
        }
    }

    pub fn on_ui(mut self) -> Self {
        self.over_ui = true;
        self
    }
}

/// Editor-style mouse input, sampled once per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseSample {
    pub position: Vec2,
    pub delta: Vec2,
    /// Button went down this frame.
    pub pressed: bool,
    /// Button is down.
    pub held: bool,
    /// Button went up this frame.
    pub released: bool,
    /// Rotate instead of move while dragging (shift).
    pub rotate_modifier: bool,
    /// Scroll wheel delta.
    pub scroll: f32,
    pub over_ui: bool,
}

/// Live hit-test against surfaces detected by perception.
pub trait SurfaceRaycaster {
    fn raycast(&self, screen: Vec2) -> Option<Pose>;
}

/// Per-frame inputs that come from outside the core.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    pub camera: Option<&'a Camera>,
    pub dt: f32,
    pub surfaces: Option<&'a dyn SurfaceRaycaster>,
}

/// Where a drag sample landed on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenRegion {
    /// Drag moves the critter.
    Center,
    /// Drag rotates the critter.
    Edge,
}

/// Transient state of the current touch interaction.
#[derive(Debug, Clone, Copy)]
pub struct GestureSession {
    pub selected: Option<InstanceId>,
    /// Entity origin minus the ground point under the finger at selection time.
    pub drag_offset: Vec3,
    pub initial_pinch_distance: f32,
    pub initial_scale: Vec3,
    pub pinch_active: bool,
    /// Previous frame's drag classification.
    pub region: Option<ScreenRegion>,
}

impl Default for GestureSession {
    fn default() -> Self {
        Self {
            selected: None,
            drag_offset: Vec3::ZERO,
            initial_pinch_distance: 0.0,
            initial_scale: Vec3::ONE,
            pinch_active: false,
            region: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectMode {
    /// Hitting the current selection deselects it.
    Toggle,
    /// Hitting the current selection keeps it.
    Keep,
}

/// Turns touches and mouse input into selection changes and transform proposals.
pub struct GestureInteractionController {
    cfg: GestureConfig,
    session: GestureSession,
    camera_missing_logged: bool,
}

impl GestureInteractionController {
    pub fn new(cfg: GestureConfig) -> Self {
        Self {
            cfg,
            session: GestureSession::default(),
            camera_missing_logged: false,
        }
    }

    pub fn session(&self) -> &GestureSession {
        &self.session
    }

    pub fn selected(&self) -> Option<InstanceId> {
        self.session.selected
    }

    /// Turning interaction off also drops the current selection.
    pub fn set_interaction_enabled(&mut self, enabled: bool, registry: &mut EntityRegistry) {
        self.cfg.enabled = enabled;
        if !enabled {
            self.deselect(registry);
        }
    }

    /// Explicit deselect. Returns whether anything was selected.
    pub fn deselect(&mut self, registry: &mut EntityRegistry) -> bool {
        if self.session.selected.is_none() {
            return false;
        }
        self.set_selection(None, registry);
        self.session.pinch_active = false;
        true
    }

    /// Process this frame's active touches. The touch count picks the branch.
    pub fn process_frame(
        &mut self,
        touches: &[Touch],
        view: &FrameView<'_>,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
    ) {
        let Some(camera) = self.begin_frame(view, registry) else {
            return;
        };

        match touches {
            [] => {
                self.session.pinch_active = false;
                self.session.region = None;
            }
            [touch] => {
                self.session.pinch_active = false;
                self.single_touch(touch, camera, view, registry, proposals);
            }
            [a, b] => self.pinch(a, b, camera, registry, proposals),
            _ => {
                self.session.pinch_active = false;
            }
        }
    }

    /// Editor mouse controls: press selects, drag moves (or rotates with the
    /// modifier), release deselects, scroll scales.
    pub fn process_mouse(
        &mut self,
        mouse: &MouseSample,
        view: &FrameView<'_>,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
    ) {
        let Some(camera) = self.begin_frame(view, registry) else {
            return;
        };

        if mouse.pressed && !mouse.over_ui {
            self.try_select(mouse.position, camera, registry, SelectMode::Toggle);
        }

        let Some(id) = self.session.selected else {
            return;
        };
        let Some(current) = registry.transform(id) else {
            return;
        };
        let mut next = current;

        if mouse.held {
            if mouse.rotate_modifier {
                self.rotate(&mut next, mouse.delta.x * self.cfg.mouse_rotate_factor, view.dt);
            } else {
                self.drag(&mut next, mouse.position, camera, view);
            }
        }

        if mouse.scroll != 0.0 && registry.is_scalable(id) {
            let proposed = next.scale * (1.0 + mouse.scroll * self.cfg.scroll_scale_speed);
            if self.scale_in_range(proposed.x) {
                next.scale = proposed;
            }
        }

        if next != current {
            proposals.propose(id, WriteSource::Gesture, next);
        }

        if mouse.released {
            self.set_selection(None, registry);
        }
    }

    /// Shared frame prologue. Drops stale selections, then yields the camera
    /// if processing can go ahead.
    fn begin_frame<'a>(
        &mut self,
        view: &FrameView<'a>,
        registry: &mut EntityRegistry,
    ) -> Option<&'a Camera> {
        self.validate_selection(registry);

        if !self.cfg.enabled {
            return None;
        }

        let Some(camera) = view.camera else {
            if !self.camera_missing_logged {
                CoreError::UnavailableDependency("camera").log_skipped("gesture frame skipped");
                self.camera_missing_logged = true;
            }
            return None;
        };
        self.camera_missing_logged = false;
        Some(camera)
    }

    /// Clear a selection whose entity was despawned or hidden elsewhere.
    fn validate_selection(&mut self, registry: &mut EntityRegistry) {
        let Some(id) = self.session.selected else {
            return;
        };
        match registry.is_visible(id) {
            Some(true) => {}
            Some(false) => {
                log::info!("{} hidden mid-gesture, dropping selection", id);
                self.deselect(registry);
            }
            None => {
                CoreError::StaleReference(id).log_skipped("gesture selection");
                self.deselect(registry);
            }
        }
    }

    fn single_touch(
        &mut self,
        touch: &Touch,
        camera: &Camera,
        view: &FrameView<'_>,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
    ) {
        match touch.phase {
            TouchPhase::Began => {
                if touch.over_ui {
                    log::debug!("Touch {} on UI, ignoring", touch.id);
                    return;
                }
                self.try_select(touch.position, camera, registry, SelectMode::Toggle);
            }
            TouchPhase::Moved => {
                if touch.over_ui {
                    return;
                }
                let Some(id) = self.session.selected else {
                    return;
                };
                let Some(current) = registry.transform(id) else {
                    return;
                };
                let mut next = current;
                match self.classify(touch.position, camera) {
                    ScreenRegion::Edge => self.rotate(&mut next, touch.delta.x, view.dt),
                    ScreenRegion::Center => self.drag(&mut next, touch.position, camera, view),
                }
                if next != current {
                    proposals.propose(id, WriteSource::Gesture, next);
                }
            }
            TouchPhase::Ended => {}
        }
    }

    fn pinch(
        &mut self,
        a: &Touch,
        b: &Touch,
        camera: &Camera,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
    ) {
        let distance = a.position.distance(b.position);

        if a.phase == TouchPhase::Began || b.phase == TouchPhase::Began {
            self.session.initial_pinch_distance = distance;
            self.session.pinch_active = true;
            let midpoint = (a.position + b.position) * 0.5;
            self.try_select(midpoint, camera, registry, SelectMode::Keep);
            if let Some(t) = self.session.selected.and_then(|id| registry.transform(id)) {
                self.session.initial_scale = t.scale;
            }
            return;
        }

        if !self.session.pinch_active
            || self.session.initial_pinch_distance < MIN_PINCH_DISTANCE
            || (a.phase != TouchPhase::Moved && b.phase != TouchPhase::Moved)
        {
            return;
        }
        let Some(id) = self.session.selected else {
            return;
        };
        if !registry.is_scalable(id) {
            return;
        }
        let Some(current) = registry.transform(id) else {
            return;
        };

        let factor = distance / self.session.initial_pinch_distance;
        let proposed = self.session.initial_scale * factor;
        // Out-of-range proposals are dropped, not clamped, so reversing the
        // pinch never jumps.
        if !self.scale_in_range(proposed.x) {
            return;
        }
        let mut next = current;
        next.scale = proposed;
        if next != current {
            proposals.propose(id, WriteSource::Gesture, next);
        }
    }

    fn scale_in_range(&self, value: f32) -> bool {
        value >= self.cfg.min_scale && value <= self.cfg.max_scale
    }

    fn try_select(
        &mut self,
        screen: Vec2,
        camera: &Camera,
        registry: &mut EntityRegistry,
        mode: SelectMode,
    ) {
        let ray = camera.screen_point_to_ray(screen);
        let Some(hit) = registry.pick(&ray, self.cfg.hit_distance) else {
            return;
        };

        if self.session.selected == Some(hit) {
            if mode == SelectMode::Toggle {
                self.set_selection(None, registry);
            }
            return;
        }

        if self.session.selected.is_some() {
            self.set_selection(None, registry);
        }

        let Some(transform) = registry.transform(hit) else {
            return;
        };
        self.session.drag_offset = ray
            .intersect_ground(transform.position)
            .map_or(Vec3::ZERO, |point| transform.position - point);
        self.session.initial_scale = transform.scale;
        self.set_selection(Some(hit), registry);
    }

    fn set_selection(&mut self, current: Option<InstanceId>, registry: &mut EntityRegistry) {
        let previous = self.session.selected;
        if previous == current {
            return;
        }
        self.session.selected = current;
        match (previous, current) {
            (_, Some(id)) => log::info!("Selected {}", id),
            (Some(id), None) => log::info!("Deselected {}", id),
            (None, None) => {}
        }
        registry
            .outbox_mut()
            .event(CoreEvent::SelectionChanged { previous, current });
    }

    /// Center/edge classification. Samples exactly on the boundary keep the
    /// previous frame's region.
    fn classify(&mut self, screen: Vec2, camera: &Camera) -> ScreenRegion {
        let radius = match self.cfg.region_basis {
            RegionBasis::HalfMinDimension => camera.viewport.min_element() * 0.5,
            RegionBasis::HalfDiagonal => camera.viewport.length() * 0.5,
        };
        let boundary = radius * self.cfg.region_threshold;
        let distance = screen.distance(camera.screen_center());

        let region = if distance > boundary {
            ScreenRegion::Edge
        } else if distance < boundary {
            ScreenRegion::Center
        } else {
            self.session.region.unwrap_or(ScreenRegion::Center)
        };
        self.session.region = Some(region);
        region
    }

    /// Spin about the world vertical axis.
    fn rotate(&self, transform: &mut Transform, delta_x: f32, dt: f32) {
        let degrees = delta_x * self.cfg.rotation_speed * dt;
        transform.rotation = Quat::from_rotation_y(degrees.to_radians()) * transform.rotation;
    }

    fn drag(&self, transform: &mut Transform, screen: Vec2, camera: &Camera, view: &FrameView<'_>) {
        let surface_hit = if self.cfg.snap_to_planes {
            view.surfaces
                .and_then(|s| s.raycast(screen))
                .map(|pose| pose.position)
        } else {
            None
        };

        let target = match surface_hit {
            Some(point) => point,
            None => {
                let ray = camera.screen_point_to_ray(screen);
                let Some(point) = ray.intersect_ground(transform.position) else {
                    return;
                };
                point + self.session.drag_offset
            }
        };

        let smoothing = self.cfg.movement_smoothing.clamp(0.0, 1.0);
        transform.position = transform.position.lerp(target, smoothing);
    }
}
