use std::collections::HashMap;

use crate::ecs::components::{InstanceId, Transform};
use crate::registry::EntityRegistry;

/// Who wants to move an entity this frame. Ordered by priority, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteSource {
    Behavior,
    Tracking,
    Gesture,
}

#[derive(Debug, Clone, Copy)]
pub struct TransformProposal {
    pub instance: InstanceId,
    pub source: WriteSource,
    pub transform: Transform,
}

/// Transform writes requested during a frame. Controllers read the committed
/// registry state and only propose; nothing lands until [`InteractionArbiter::commit`].
#[derive(Debug, Default)]
pub struct TransformProposals {
    pending: Vec<TransformProposal>,
}

impl TransformProposals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose(&mut self, instance: InstanceId, source: WriteSource, transform: Transform) {
        self.pending.push(TransformProposal {
            instance,
            source,
            transform,
        });
    }

    /// Latest proposal for `instance` from `source`, if any.
    pub fn latest(&self, instance: InstanceId, source: WriteSource) -> Option<&TransformProposal> {
        self.pending
            .iter()
            .rev()
            .find(|p| p.instance == instance && p.source == source)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Single writer for entity transforms. While an entity is gesture-selected,
/// its autonomous behavior is switched off and only gesture writes land.
#[derive(Debug, Default)]
pub struct InteractionArbiter {
    owner: Option<InstanceId>,
}

impl InteractionArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity currently owned by gesture control.
    pub fn owner(&self) -> Option<InstanceId> {
        self.owner
    }

    /// Hand transform ownership to the current gesture selection.
    pub fn sync_selection(&mut self, selected: Option<InstanceId>, registry: &mut EntityRegistry) {
        if selected != self.owner {
            if let Some(released) = self.owner.take() {
                if let Some(behavior) = registry.behavior_mut(released) {
                    behavior.set_ai_enabled(true);
                    log::debug!("{} back under autonomous control", released);
                }
            }
            self.owner = selected;
        }

        if let Some(owner) = self.owner {
            if let Some(behavior) = registry.behavior_mut(owner) {
                if behavior.ai_enabled {
                    behavior.set_ai_enabled(false);
                    log::debug!("{} under gesture control", owner);
                }
            }
        }
    }

    /// Resolve this frame's proposals and write the winners. Returns the
    /// number of transforms written.
    pub fn commit(
        &mut self,
        proposals: &mut TransformProposals,
        registry: &mut EntityRegistry,
    ) -> usize {
        let mut winners: HashMap<InstanceId, TransformProposal> = HashMap::new();
        for proposal in proposals.pending.drain(..) {
            if proposal.source != WriteSource::Gesture && Some(proposal.instance) == self.owner {
                log::debug!(
                    "Dropping {:?} write for gesture-owned {}",
                    proposal.source,
                    proposal.instance
                );
                continue;
            }
            match winners.get(&proposal.instance) {
                Some(current) if current.source > proposal.source => {}
                _ => {
                    winners.insert(proposal.instance, proposal);
                }
            }
        }

        let mut ordered: Vec<TransformProposal> = winners.into_values().collect();
        ordered.sort_by_key(|p| p.instance);

        let mut written = 0;
        for proposal in ordered {
            match registry.write_transform(proposal.instance, proposal.transform) {
                Ok(()) => written += 1,
                Err(err) => err.log_skipped("transform write"),
            }
        }
        written
    }
}
