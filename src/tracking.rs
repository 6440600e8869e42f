use std::collections::HashMap;
use std::rc::Rc;

use crate::arbiter::{TransformProposals, WriteSource};
use crate::config::TrackingConfig;
use crate::ecs::components::InstanceId;
use crate::error::CoreError;
use crate::math::Pose;
use crate::registry::EntityRegistry;
use crate::templates::TemplateTable;

/// Perception confidence for an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingConfidence {
    Tracking,
    /// Pose is estimated, still good enough to show content.
    Degraded,
    Lost,
}

impl TrackingConfidence {
    pub fn is_tracked(self) -> bool {
        matches!(self, Self::Tracking | Self::Degraded)
    }
}

/// One perception event. Delivered in batches, once per frame.
#[derive(Debug, Clone)]
pub enum AnchorEvent {
    Added {
        id: String,
        pose: Pose,
    },
    Updated {
        id: String,
        pose: Pose,
        confidence: TrackingConfidence,
    },
    Removed {
        id: String,
    },
}

/// What the controller knows about a marker or plane.
#[derive(Debug, Clone)]
pub struct TrackingAnchor {
    pub id: String,
    pub confidence: TrackingConfidence,
    pub pose: Pose,
    /// Controller clock (seconds) of the last tracked update.
    pub last_seen: f64,
    /// At most one critter per anchor.
    pub entity: Option<InstanceId>,
    /// Keep the critter glued to the anchor pose.
    pub follow: bool,
    /// Seconds since tracking was lost, while a hide is pending.
    pub hide_countdown: Option<f32>,
}

impl TrackingAnchor {
    fn new(id: &str, pose: Pose, now: f64) -> Self {
        Self {
            id: id.to_string(),
            confidence: TrackingConfidence::Tracking,
            pose,
            last_seen: now,
            entity: None,
            follow: false,
            hide_countdown: None,
        }
    }
}

/// Maps perception events to spawn/show/hide transitions. Loss of tracking
/// only ever hides; despawning is left to explicit user actions.
pub struct TrackingLifecycleController {
    templates: Rc<dyn TemplateTable>,
    cfg: TrackingConfig,
    anchors: HashMap<String, TrackingAnchor>,
    clock: f64,
}

impl TrackingLifecycleController {
    pub fn new(templates: Rc<dyn TemplateTable>, cfg: TrackingConfig) -> Self {
        Self {
            templates,
            cfg,
            anchors: HashMap::new(),
            clock: 0.0,
        }
    }

    pub fn anchor(&self, id: &str) -> Option<&TrackingAnchor> {
        self.anchors.get(id)
    }

    pub fn bound_entity(&self, id: &str) -> Option<InstanceId> {
        self.anchors.get(id).and_then(|a| a.entity)
    }

    /// Route one batched perception event.
    pub fn apply(
        &mut self,
        event: &AnchorEvent,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
        selected: Option<InstanceId>,
    ) -> Result<(), CoreError> {
        match event {
            AnchorEvent::Added { id, pose } => self.on_anchor_added(id, *pose, registry).map(|_| ()),
            AnchorEvent::Updated {
                id,
                pose,
                confidence,
            } => self.on_anchor_updated(id, *pose, *confidence, registry, proposals, selected),
            AnchorEvent::Removed { id } => self.on_anchor_removed(id, registry),
        }
    }

    /// A marker or plane was detected. Spawns its critter unless the anchor
    /// already has one. Returns the new id, or `None` when auto-spawn is off.
    pub fn on_anchor_added(
        &mut self,
        id: &str,
        pose: Pose,
        registry: &mut EntityRegistry,
    ) -> Result<Option<InstanceId>, CoreError> {
        let now = self.clock;
        let anchor = self
            .anchors
            .entry(id.to_string())
            .or_insert_with(|| TrackingAnchor::new(id, pose, now));
        anchor.pose = pose;
        anchor.confidence = TrackingConfidence::Tracking;
        anchor.last_seen = now;
        anchor.hide_countdown = None;

        if let Some(instance) = anchor.entity {
            if registry.contains(instance) {
                return Err(CoreError::DuplicateBinding {
                    anchor: id.to_string(),
                    instance,
                });
            }
            log::debug!("Anchor '{}' lost its critter {}, rebinding", id, instance);
            anchor.entity = None;
        }

        let template = self
            .templates
            .lookup_by_image_target(id)
            .or_else(|| self.templates.lookup_template(id))
            .ok_or_else(|| CoreError::template_miss(id))?;

        if !self.cfg.auto_spawn_on_detect {
            log::debug!("Anchor '{}' detected, auto-spawn off", id);
            return Ok(None);
        }

        let instance = registry.spawn(template, pose, Some(id));
        anchor.entity = Some(instance);
        anchor.follow = self.cfg.follow_anchor || template.follow_anchor;
        log::info!("Anchor '{}' bound to {}", id, instance);
        Ok(Some(instance))
    }

    pub fn on_anchor_updated(
        &mut self,
        id: &str,
        pose: Pose,
        confidence: TrackingConfidence,
        registry: &mut EntityRegistry,
        proposals: &mut TransformProposals,
        selected: Option<InstanceId>,
    ) -> Result<(), CoreError> {
        let anchor = self
            .anchors
            .get_mut(id)
            .ok_or_else(|| CoreError::anchor_miss(id))?;
        anchor.pose = pose;
        anchor.confidence = confidence;

        let Some(instance) = anchor.entity else {
            return Ok(());
        };
        let Some(visible) = registry.is_visible(instance) else {
            anchor.entity = None;
            anchor.hide_countdown = None;
            return Err(CoreError::StaleReference(instance));
        };

        if confidence.is_tracked() {
            anchor.last_seen = self.clock;
            if anchor.hide_countdown.take().is_some() {
                log::debug!("Anchor '{}' recovered, hide cancelled", id);
            }
            if !visible {
                registry.set_visible(instance, true)?;
            }
            if anchor.follow && selected != Some(instance) {
                if let Some(mut transform) = registry.transform(instance) {
                    transform.position = pose.position;
                    proposals.propose(instance, WriteSource::Tracking, transform);
                }
            }
        } else if self.cfg.hide_when_lost && visible && anchor.hide_countdown.is_none() {
            log::debug!("Anchor '{}' lost, hiding in {}s", id, self.cfg.hide_delay);
            anchor.hide_countdown = Some(0.0);
        }
        Ok(())
    }

    /// The anchor is gone. Hides its critter immediately but keeps it alive.
    pub fn on_anchor_removed(
        &mut self,
        id: &str,
        registry: &mut EntityRegistry,
    ) -> Result<(), CoreError> {
        let anchor = self
            .anchors
            .get_mut(id)
            .ok_or_else(|| CoreError::anchor_miss(id))?;
        anchor.confidence = TrackingConfidence::Lost;
        anchor.hide_countdown = None;

        let Some(instance) = anchor.entity else {
            return Ok(());
        };
        match registry.set_visible(instance, false) {
            Ok(_) => Ok(()),
            Err(err) => {
                anchor.entity = None;
                Err(err)
            }
        }
    }

    /// Advance the clock and any pending hide countdowns. Call before the
    /// frame's event batch so a countdown armed by that batch starts at zero.
    pub fn tick(&mut self, dt: f32, registry: &mut EntityRegistry) {
        self.clock += dt as f64;

        for anchor in self.anchors.values_mut() {
            let Some(elapsed) = anchor.hide_countdown.as_mut() else {
                continue;
            };
            *elapsed += dt;
            if *elapsed < self.cfg.hide_delay {
                continue;
            }
            anchor.hide_countdown = None;

            let Some(instance) = anchor.entity else {
                continue;
            };
            if let Err(err) = registry.set_visible(instance, false) {
                anchor.entity = None;
                err.log_skipped("hide countdown");
            }
        }
    }

    /// Forget the binding to `instance` so the anchor can spawn again.
    pub fn release(&mut self, instance: InstanceId) -> bool {
        for anchor in self.anchors.values_mut() {
            if anchor.entity == Some(instance) {
                anchor.entity = None;
                anchor.hide_countdown = None;
                log::debug!("Anchor '{}' released {}", anchor.id, instance);
                return true;
            }
        }
        false
    }

    /// Despawn every anchor-bound critter. Anchors stay known, so the next
    /// detection spawns fresh ones. Returns the despawned ids.
    pub fn clear_all_markers(&mut self, registry: &mut EntityRegistry) -> Vec<InstanceId> {
        let mut cleared = Vec::new();
        for anchor in self.anchors.values_mut() {
            anchor.hide_countdown = None;
            let Some(instance) = anchor.entity.take() else {
                continue;
            };
            match registry.despawn(instance) {
                Ok(()) => cleared.push(instance),
                Err(err) => err.log_skipped("clear markers"),
            }
        }
        cleared.sort();
        log::info!("Cleared {} marker critters", cleared.len());
        cleared
    }
}
