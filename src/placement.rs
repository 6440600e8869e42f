use crate::config::PlacementConfig;
use crate::error::CoreError;
use crate::gesture::{SurfaceRaycaster, Touch, TouchPhase};
use crate::math::Pose;

/// Tap-to-place mode. Each successful placement disarms the tool until
/// `rearm_delay` seconds of frame time have passed.
#[derive(Debug, Clone)]
pub struct PlacementTool {
    template: Option<String>,
    rearm_delay: f32,
    /// Seconds since the last placement while disarmed.
    cooldown: Option<f32>,
}

impl PlacementTool {
    pub fn new(cfg: &PlacementConfig) -> Self {
        Self {
            template: None,
            rearm_delay: cfg.rearm_delay,
            cooldown: None,
        }
    }

    /// Start placing `template_id` on tapped surfaces.
    pub fn activate(&mut self, template_id: impl Into<String>) {
        let template_id = template_id.into();
        log::info!("Placement mode on ({})", template_id);
        self.template = Some(template_id);
        self.cooldown = None;
    }

    pub fn deactivate(&mut self) {
        if self.template.take().is_some() {
            log::info!("Placement mode off");
        }
        self.cooldown = None;
    }

    pub fn is_active(&self) -> bool {
        self.template.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.is_active() && self.cooldown.is_none()
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn tick(&mut self, dt: f32) {
        if let Some(elapsed) = self.cooldown.as_mut() {
            *elapsed += dt;
            if *elapsed >= self.rearm_delay {
                self.cooldown = None;
            }
        }
    }

    /// Pose to place at for this tap, if it lands on a surface.
    pub fn try_place(
        &mut self,
        touch: &Touch,
        surfaces: Option<&dyn SurfaceRaycaster>,
    ) -> Result<Option<Pose>, CoreError> {
        if !self.is_armed() || touch.phase != TouchPhase::Began || touch.over_ui {
            return Ok(None);
        }
        let surfaces = surfaces.ok_or(CoreError::UnavailableDependency("surface hit-test"))?;
        let Some(pose) = surfaces.raycast(touch.position) else {
            log::debug!("Tap at {:?} hit no surface", touch.position);
            return Ok(None);
        };
        self.cooldown = Some(0.0);
        Ok(Some(pose))
    }
}
