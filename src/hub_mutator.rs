use std::sync::Arc;

use bevy::{ecs::system::SystemParam, prelude::*};

use crate::activation::ActivationFailure;
use crate::active_effect::ActiveEffectHandle;
use crate::effect::{EffectApplication, EffectDefinition, EffectRejection, EffectSpec};
use crate::hub::AbilitySystemHub;

/// A `SystemParam` for driving hubs from systems by entity.
///
/// Entities without a hub are a logged no-op.
#[derive(SystemParam)]
pub struct HubMutator<'w, 's> {
    query: Query<'w, 's, &'static mut AbilitySystemHub>,
}

impl HubMutator<'_, '_> {
    /// Current value of an attribute, or `None` when the entity has no hub or attribute.
    pub fn attribute(&self, entity: Entity, attribute: &str) -> Option<f32> {
        self.query.get(entity).ok()?.attribute(attribute)
    }

    pub fn hub(&self, entity: Entity) -> Option<&AbilitySystemHub> {
        self.query.get(entity).ok()
    }

    /// Applies an effect from `source` onto `target`. `source == target` applies to self.
    pub fn apply_effect(
        &mut self,
        source: Entity,
        target: Entity,
        definition: &Arc<EffectDefinition>,
        level: f32,
    ) -> EffectApplication {
        self.apply_effect_spec(source, target, EffectSpec::new(definition, level))
    }

    pub fn apply_effect_spec(&mut self, source: Entity, target: Entity, spec: EffectSpec) -> EffectApplication {
        if source == target {
            return match self.query.get_mut(target) {
                Ok(mut hub) => hub.apply_effect_spec_to_self(spec),
                Err(_) => {
                    log::warn!("Cannot apply '{}': {} has no hub", spec.definition.name, target);
                    EffectApplication::Rejected(EffectRejection::NoAttributeSet)
                }
            };
        }

        match self.query.get_many_mut([source, target]) {
            Ok([source_hub, mut target_hub]) => source_hub.apply_effect_spec_to_target(spec, &mut target_hub),
            Err(error) => {
                log::warn!("Cannot apply '{}' from {} to {}: {}", spec.definition.name, source, target, error);
                EffectApplication::Rejected(EffectRejection::NoAttributeSet)
            }
        }
    }

    pub fn try_activate(&mut self, entity: Entity, ability: &str) -> Result<(), ActivationFailure> {
        match self.query.get_mut(entity) {
            Ok(mut hub) => hub.activate_ability(ability),
            Err(_) => {
                log::warn!("Cannot activate '{}': {} has no hub", ability, entity);
                Err(ActivationFailure::NotGranted)
            }
        }
    }

    pub fn end_ability(&mut self, entity: Entity, ability: &str) -> bool {
        self.query
            .get_mut(entity)
            .map(|mut hub| hub.end_ability(ability))
            .unwrap_or(false)
    }

    pub fn remove_effect(&mut self, entity: Entity, handle: ActiveEffectHandle) -> bool {
        self.query
            .get_mut(entity)
            .map(|mut hub| hub.remove_effect(handle))
            .unwrap_or(false)
    }
}
