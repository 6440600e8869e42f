use std::collections::HashMap;

use crate::ecs::components::{
    BehaviorState, Draggable, InstanceId, PickBounds, Scalable, TemplateId, Trackable, Transform,
    Visible,
};
use crate::error::CoreError;
use crate::events::{CoreEvent, Outbox, SceneCommand};
use crate::math::{Pose, Ray};
use crate::templates::Template;

/// Read-only copy of an entity's record.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub instance: InstanceId,
    pub template: String,
    pub transform: Transform,
    pub visible: bool,
    pub anchor: Option<String>,
}

/// Owns every spawned critter. Wraps the hecs world with an id index so other
/// controllers can refer to entities by [`InstanceId`] and detect stale ids.
pub struct EntityRegistry {
    world: hecs::World,
    index: HashMap<InstanceId, hecs::Entity>,
    next_id: u64,
    outbox: Outbox,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            index: HashMap::new(),
            next_id: 1,
            outbox: Outbox::new(),
        }
    }

    /// Spawn a critter from `template` at `pose`. The template's base rotation
    /// is applied on top of the pose rotation.
    pub fn spawn(&mut self, template: &Template, pose: Pose, anchor: Option<&str>) -> InstanceId {
        let instance = InstanceId(self.next_id);
        self.next_id += 1;

        let base_rotation = template.base_rotation_quat();
        let transform = Transform::new(
            pose.position,
            pose.rotation * base_rotation,
            template.default_scale,
        );

        let mut builder = hecs::EntityBuilder::new();
        builder.add(instance);
        builder.add(TemplateId(template.id.clone()));
        builder.add(transform);
        builder.add(Visible(true));
        builder.add(PickBounds {
            half_extents: template.half_extents(),
        });
        if template.draggable {
            builder.add(Draggable);
        }
        if template.scalable {
            builder.add(Scalable);
        }
        if let Some(anchor) = anchor {
            builder.add(Trackable {
                anchor: anchor.to_string(),
            });
        }
        if template.autonomous {
            builder.add(BehaviorState::new(transform.rotation));
        }
        let entity = self.world.spawn(builder.build());
        self.index.insert(instance, entity);

        self.outbox.scene(SceneCommand::Create {
            instance,
            asset_ref: template.asset_ref.clone(),
            transform,
        });
        self.outbox.event(CoreEvent::EntitySpawned {
            instance,
            template: template.id.clone(),
        });
        log::info!(
            "Spawned {} ({}) at {:?}",
            instance,
            template.id,
            transform.position
        );
        instance
    }

    pub fn despawn(&mut self, instance: InstanceId) -> Result<(), CoreError> {
        let entity = self
            .index
            .remove(&instance)
            .ok_or_else(|| CoreError::instance_miss(instance))?;
        if self.world.despawn(entity).is_err() {
            log::debug!("{} was indexed but already gone from the world", instance);
        }
        self.outbox.scene(SceneCommand::Destroy { instance });
        self.outbox.event(CoreEvent::EntityDespawned { instance });
        log::info!("Despawned {}", instance);
        Ok(())
    }

    /// Despawn everything. Returns the retired ids.
    pub fn clear(&mut self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.index.keys().copied().collect();
        ids.sort();
        for &id in &ids {
            if let Err(err) = self.despawn(id) {
                log::debug!("Clear skipped {}: {}", id, err);
            }
        }
        ids
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.index.contains_key(&instance)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.index.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn entity(&self, instance: InstanceId) -> Option<hecs::Entity> {
        self.index.get(&instance).copied()
    }

    pub fn is_visible(&self, instance: InstanceId) -> Option<bool> {
        let entity = self.entity(instance)?;
        self.world.get::<&Visible>(entity).ok().map(|v| v.0)
    }

    /// Show or hide. Returns whether the visibility actually changed.
    pub fn set_visible(&mut self, instance: InstanceId, visible: bool) -> Result<bool, CoreError> {
        let entity = self
            .entity(instance)
            .ok_or(CoreError::StaleReference(instance))?;
        let flag = self
            .world
            .query_one_mut::<&mut Visible>(entity)
            .map_err(|_| CoreError::StaleReference(instance))?;
        if flag.0 == visible {
            return Ok(false);
        }
        flag.0 = visible;
        self.outbox.scene(SceneCommand::SetVisible { instance, visible });
        log::info!("{} {}", if visible { "Showing" } else { "Hiding" }, instance);
        Ok(true)
    }

    pub fn transform(&self, instance: InstanceId) -> Option<Transform> {
        let entity = self.entity(instance)?;
        self.world.get::<&Transform>(entity).ok().map(|t| *t)
    }

    /// Overwrite a transform. Only the arbiter calls this after spawn.
    pub(crate) fn write_transform(
        &mut self,
        instance: InstanceId,
        transform: Transform,
    ) -> Result<(), CoreError> {
        let entity = self
            .entity(instance)
            .ok_or(CoreError::StaleReference(instance))?;
        let current = self
            .world
            .query_one_mut::<&mut Transform>(entity)
            .map_err(|_| CoreError::StaleReference(instance))?;
        if *current == transform {
            return Ok(());
        }
        *current = transform;
        self.outbox.scene(SceneCommand::SetTransform { instance, transform });
        Ok(())
    }

    pub fn behavior(&self, instance: InstanceId) -> Option<BehaviorState> {
        let entity = self.entity(instance)?;
        self.world.get::<&BehaviorState>(entity).ok().map(|b| *b)
    }

    pub fn behavior_mut(&mut self, instance: InstanceId) -> Option<&mut BehaviorState> {
        let entity = self.entity(instance)?;
        self.world.query_one_mut::<&mut BehaviorState>(entity).ok()
    }

    pub fn is_scalable(&self, instance: InstanceId) -> bool {
        self.has::<Scalable>(instance)
    }

    fn has<T: hecs::Component>(&self, instance: InstanceId) -> bool {
        self.entity(instance)
            .and_then(|e| self.world.entity(e).ok())
            .is_some_and(|e| e.has::<T>())
    }

    pub fn record(&self, instance: InstanceId) -> Option<EntityRecord> {
        let entity = self.entity(instance)?;
        let e = self.world.entity(entity).ok()?;
        let template = e.get::<&TemplateId>()?.0.clone();
        let transform = *e.get::<&Transform>()?;
        let visible = e.get::<&Visible>()?.0;
        let anchor = e.get::<&Trackable>().map(|t| t.anchor.clone());
        Some(EntityRecord {
            instance,
            template,
            transform,
            visible,
            anchor,
        })
    }

    /// Closest visible, draggable critter whose pick volume the ray enters.
    pub fn pick(&self, ray: &Ray, max_distance: f32) -> Option<InstanceId> {
        let mut best: Option<(InstanceId, f32)> = None;
        for (_, (id, transform, bounds, visible)) in self
            .world
            .query::<(&InstanceId, &Transform, &PickBounds, &Visible)>()
            .with::<&Draggable>()
            .iter()
        {
            if !visible.0 {
                continue;
            }
            let Some(dist) = bounds.world_aabb(transform).ray_distance(ray, max_distance) else {
                continue;
            };
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((*id, dist));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn world_mut(&mut self) -> &mut hecs::World {
        &mut self.world
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn tiger() -> Template {
        Template::new("tiger", "models/tiger")
    }

    #[test]
    fn ids_are_never_reused() {
        let mut reg = EntityRegistry::new();
        let a = reg.spawn(&tiger(), Pose::IDENTITY, None);
        reg.despawn(a).unwrap();
        let b = reg.spawn(&tiger(), Pose::IDENTITY, None);
        assert_ne!(a, b);
        assert!(!reg.contains(a));
        assert_eq!(reg.despawn(a), Err(CoreError::instance_miss(a)));
    }

    #[test]
    fn hidden_entities_keep_state() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(&tiger(), Pose::at(Vec3::X), Some("tiger_card"));
        assert!(reg.set_visible(id, false).unwrap());
        assert!(!reg.set_visible(id, false).unwrap());
        let record = reg.record(id).unwrap();
        assert!(!record.visible);
        assert_eq!(record.anchor.as_deref(), Some("tiger_card"));
        assert_eq!(record.transform.position, Vec3::X);
        assert!(reg.behavior(id).is_some());
    }

    #[test]
    fn pick_skips_hidden_and_prefers_nearest() {
        let mut reg = EntityRegistry::new();
        let near = reg.spawn(&tiger(), Pose::at(Vec3::new(0.0, 0.0, -3.0)), None);
        let far = reg.spawn(&tiger(), Pose::at(Vec3::new(0.0, 0.0, -6.0)), None);
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        assert_eq!(reg.pick(&ray, 100.0), Some(near));
        reg.set_visible(near, false).unwrap();
        assert_eq!(reg.pick(&ray, 100.0), Some(far));
    }

    #[test]
    fn capabilities_follow_template_flags() {
        let mut reg = EntityRegistry::new();
        let mut rock = Template::new("rock", "models/rock");
        rock.draggable = false;
        rock.autonomous = false;
        let mut statue = Template::new("statue", "models/statue");
        statue.scalable = false;

        let rock = reg.spawn(&rock, Pose::at(Vec3::new(0.0, 0.0, -2.0)), None);
        let statue = reg.spawn(&statue, Pose::at(Vec3::new(0.0, 0.0, -5.0)), None);
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        assert_eq!(reg.pick(&ray, 100.0), Some(statue));
        assert!(reg.is_scalable(rock));
        assert!(!reg.is_scalable(statue));
        assert!(reg.behavior(rock).is_none());
    }

    #[test]
    fn despawn_after_world_drift_still_retires_the_id() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(&tiger(), Pose::IDENTITY, None);
        let entity = reg.entity(id).unwrap();
        reg.world_mut().despawn(entity).unwrap();

        assert_eq!(reg.despawn(id), Ok(()));
        assert!(!reg.contains(id));
        assert!(reg.outbox_mut().drain_events().contains(&CoreEvent::EntityDespawned { instance: id }));
    }

    #[test]
    fn lifecycle_is_reported() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(&tiger(), Pose::IDENTITY, None);
        reg.clear();
        let events = reg.outbox_mut().drain_events();
        assert_eq!(
            events,
            vec![
                CoreEvent::EntitySpawned {
                    instance: id,
                    template: "tiger".into()
                },
                CoreEvent::EntityDespawned { instance: id },
            ]
        );
        assert!(reg.is_empty());
    }
}
