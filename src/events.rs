use crate::ecs::components::{InstanceId, Transform};

/// Notifications for UI/display collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    EntitySpawned {
        instance: InstanceId,
        template: String,
    },
    EntityDespawned {
        instance: InstanceId,
    },
    SelectionChanged {
        previous: Option<InstanceId>,
        current: Option<InstanceId>,
    },
}

/// Requests for the scene-graph host.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    Create {
        instance: InstanceId,
        asset_ref: String,
        transform: Transform,
    },
    Destroy {
        instance: InstanceId,
    },
    SetTransform {
        instance: InstanceId,
        transform: Transform,
    },
    SetVisible {
        instance: InstanceId,
        visible: bool,
    },
}

/// Outbound buffers, drained by the host once per frame.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<CoreEvent>,
    scene: Vec<SceneCommand>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    pub fn scene(&mut self, command: SceneCommand) {
        self.scene.push(command);
    }

    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drain_scene(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.scene)
    }
}
