use std::sync::Arc;

use crate::ability::AbilitySpec;
use crate::active_effect::ActiveEffectHandle;
use crate::behaviour::{Behaviour, BehaviourContext};
use crate::collaborators::SpatialQuery;
use crate::effect::EffectDefinition;
use crate::hub::AbilitySystemHub;

/// Does nothing; the generic gates, cost, cooldown and tags still apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBehaviour;

impl Behaviour for NoopBehaviour {}

type ActivationCheck = dyn Fn(&AbilitySystemHub, &AbilitySpec) -> bool + Send + Sync;
type Callback = dyn Fn(&mut BehaviourContext) + Send + Sync;

/// A behaviour assembled from closures.
#[derive(Default)]
pub struct FnBehaviour {
    can_activate: Option<Box<ActivationCheck>>,
    on_activated: Option<Box<Callback>>,
    on_ended: Option<Box<Callback>>,
    on_cancelled: Option<Box<Callback>>,
}

impl FnBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_activate(
        mut self,
        check: impl Fn(&AbilitySystemHub, &AbilitySpec) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.can_activate = Some(Box::new(check));
        self
    }

    pub fn on_activated(mut self, callback: impl Fn(&mut BehaviourContext) + Send + Sync + 'static) -> Self {
        self.on_activated = Some(Box::new(callback));
        self
    }

    pub fn on_ended(mut self, callback: impl Fn(&mut BehaviourContext) + Send + Sync + 'static) -> Self {
        self.on_ended = Some(Box::new(callback));
        self
    }

    pub fn on_cancelled(mut self, callback: impl Fn(&mut BehaviourContext) + Send + Sync + 'static) -> Self {
        self.on_cancelled = Some(Box::new(callback));
        self
    }
}

impl Behaviour for FnBehaviour {
    fn can_activate(&self, hub: &AbilitySystemHub, spec: &AbilitySpec) -> bool {
        self.can_activate.as_ref().is_none_or(|check| check(hub, spec))
    }

    fn on_activated(&self, context: &mut BehaviourContext) {
        if let Some(callback) = &self.on_activated {
            callback(context);
        }
    }

    fn on_ended(&self, context: &mut BehaviourContext) {
        if let Some(callback) = &self.on_ended {
            callback(context);
        }
    }

    fn on_cancelled(&self, context: &mut BehaviourContext) {
        if let Some(callback) = &self.on_cancelled {
            callback(context);
        }
    }
}

/// Handles of the effects an [`ApplyEffectsBehaviour`] activation put on its owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedEffects(pub Vec<ActiveEffectHandle>);

/// Applies a fixed list of effects to the owner at the ability's level.
///
/// With `remove_on_end`, the held effects are removed again when the ability ends or is
/// cancelled, which suits manually ended auras and stances.
#[derive(Debug, Clone, Default)]
pub struct ApplyEffectsBehaviour {
    pub effects: Vec<Arc<EffectDefinition>>,
    pub remove_on_end: bool,
}

impl ApplyEffectsBehaviour {
    pub fn new(effects: impl IntoIterator<Item = Arc<EffectDefinition>>) -> Self {
        Self {
            effects: effects.into_iter().collect(),
            remove_on_end: false,
        }
    }

    pub fn removing_on_end(mut self) -> Self {
        self.remove_on_end = true;
        self
    }

    fn remove_applied(&self, context: &mut BehaviourContext) {
        if !self.remove_on_end {
            return;
        }
        let applied = context
            .spec_mut()
            .and_then(|spec| spec.state_mut::<AppliedEffects>())
            .map(|applied| std::mem::take(&mut applied.0))
            .unwrap_or_default();
        for handle in applied {
            context.hub_mut().remove_effect(handle);
        }
    }
}

impl Behaviour for ApplyEffectsBehaviour {
    fn on_activated(&self, context: &mut BehaviourContext) {
        let level = context.spec().map(|spec| spec.level()).unwrap_or(1) as f32;
        let mut applied = Vec::new();
        for effect in self.effects.iter() {
            let application = context.hub_mut().apply_effect_to_self(effect, level);
            if application.is_rejected() {
                log::debug!("'{}' rejected effect '{}': {:?}", context.ability().name, effect.name, application);
            }
            if let Some(handle) = application.handle() {
                applied.push(handle);
            }
        }
        // reactivation appends so earlier handles are still removed on end
        if let Some(spec) = context.spec_mut() {
            if let Some(existing) = spec.state_mut::<AppliedEffects>() {
                for handle in applied {
                    if !existing.0.contains(&handle) {
                        existing.0.push(handle);
                    }
                }
            } else {
                spec.insert_state(AppliedEffects(applied));
            }
        }
    }

    fn on_ended(&self, context: &mut BehaviourContext) {
        self.remove_applied(context);
    }

    fn on_cancelled(&self, context: &mut BehaviourContext) {
        self.remove_applied(context);
    }
}

/// Picks the closest entity within `radius` of the owner and records it as the ability spec's
/// target, where it stays until the next activation.
///
/// Refuses activation when the hub has no owner or nothing is in range.
pub struct TargetInRangeBehaviour {
    pub spatial: Arc<dyn SpatialQuery>,
    pub radius: f32,
}

impl TargetInRangeBehaviour {
    pub fn new(spatial: Arc<dyn SpatialQuery>, radius: f32) -> Self {
        Self { spatial, radius }
    }

    fn find_target(&self, hub: &AbilitySystemHub) -> Option<bevy::prelude::Entity> {
        let owner = hub.owner()?;
        self.spatial
            .closest_in_range(owner.position(), self.radius, Some(owner.entity()))
    }
}

impl Behaviour for TargetInRangeBehaviour {
    fn can_activate(&self, hub: &AbilitySystemHub, _spec: &AbilitySpec) -> bool {
        self.find_target(hub).is_some()
    }

    fn on_activated(&self, context: &mut BehaviourContext) {
        let target = self.find_target(context.hub());
        if let Some(spec) = context.spec_mut() {
            spec.set_target(target);
        }
    }
}
