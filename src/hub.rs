use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::ability::{AbilityDefinition, AbilitySpec};
use crate::activation::{AbilityActivationLogic, ActivationFailure};
use crate::active_effect::{ActiveEffect, ActiveEffectHandle, ActiveEffectState};
use crate::attribute_set::{AttributeChange, AttributeSet, AttributeSnapshot};
use crate::collaborators::OwnerIdentity;
use crate::config::HubSettings;
use crate::effect::{EffectApplication, EffectDefinition, EffectRejection, EffectSpec, StackDurationRefresh};
use crate::modifiers::{attach_modifiers, detach_modifiers, execute_modifiers};
use crate::tags::{GameplayTag, TagContainer, TagCountMap};

/// An effect that left a hub, by expiry or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEffect {
    pub handle: ActiveEffectHandle,
    pub name: String,
}

/// Everything that happened on a hub since the last drain, in order per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubNotifications {
    pub attribute_changes: Vec<AttributeChange>,
    pub activations: Vec<String>,
    pub removed_effects: Vec<RemovedEffect>,
}

impl HubNotifications {
    pub fn is_empty(&self) -> bool {
        self.attribute_changes.is_empty() && self.activations.is_empty() && self.removed_effects.is_empty()
    }
}

/// Per-entity gameplay runtime: attributes, active effects, granted abilities,
/// cooldowns and the tag multiset.
///
/// Every mutation of an entity's gameplay state goes through its hub. Hub methods are
/// synchronous and not reentrant; behaviour callbacks may apply or remove effects but
/// cannot tick the hub or start new activations on it.
#[derive(Component)]
pub struct AbilitySystemHub {
    logic: Arc<AbilityActivationLogic>,
    settings: HubSettings,
    owner: Option<Arc<dyn OwnerIdentity>>,
    pub(crate) attributes: Option<AttributeSet>,
    pub(crate) tags: TagCountMap,
    pub(crate) abilities: Vec<AbilitySpec>,
    cooldowns: BTreeMap<String, f32>,
    active_effects: Vec<ActiveEffect>,
    next_handle: u64,
    pub(crate) in_callback: bool,
    pub(crate) pending_activations: Vec<String>,
    removed_effects: Vec<RemovedEffect>,
}

impl AbilitySystemHub {
    pub fn new(logic: Arc<AbilityActivationLogic>) -> Self {
        Self {
            logic,
            settings: HubSettings::default(),
            owner: None,
            attributes: None,
            tags: TagCountMap::new(),
            abilities: Vec::new(),
            cooldowns: BTreeMap::new(),
            active_effects: Vec::new(),
            next_handle: 1,
            in_callback: false,
            pending_activations: Vec::new(),
            removed_effects: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: HubSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn logic(&self) -> &Arc<AbilityActivationLogic> {
        &self.logic
    }

    /// Binds the owner behaviours see. Required before any activation.
    pub fn init_owner(&mut self, owner: Arc<dyn OwnerIdentity>) {
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<&Arc<dyn OwnerIdentity>> {
        self.owner.as_ref()
    }

    pub fn owner_entity(&self) -> Option<Entity> {
        self.owner.as_ref().map(|owner| owner.entity())
    }

    /// Installs the attribute set, replacing any previous one. Changes recorded before
    /// installation are discarded.
    pub fn initialize_attribute_set(&mut self, mut attributes: AttributeSet) {
        attributes.drain_changes();
        self.attributes = Some(attributes);
    }

    pub fn attributes(&self) -> Option<&AttributeSet> {
        self.attributes.as_ref()
    }

    pub fn attributes_mut(&mut self) -> Option<&mut AttributeSet> {
        self.attributes.as_mut()
    }

    /// Current value of one attribute.
    pub fn attribute(&self, attribute: &str) -> Option<f32> {
        self.attributes.as_ref().and_then(|attributes| attributes.value(attribute))
    }

    /// Advances every active effect, then every cooldown, by `dt` seconds.
    ///
    /// Effects advance in application order. Periodic executions write into base values;
    /// expired effects are removed at the end of the pass.
    pub fn tick(&mut self, dt: f32) {
        if self.in_callback {
            log::warn!("Refusing to tick a hub from inside a behaviour callback");
            return;
        }
        let dt = dt.max(0.0);
        let max_executions = self.settings.max_periodic_executions_per_tick;

        let mut expired = Vec::new();
        for effect in self.active_effects.iter_mut() {
            let tick = effect.advance(dt, max_executions);
            if tick.executions > 0 {
                if let Some(attributes) = self.attributes.as_mut() {
                    let definition = effect.definition().clone();
                    for _ in 0..tick.executions {
                        execute_modifiers(&definition.modifiers, attributes, &effect.environment());
                    }
                }
            }
            if tick.expired {
                expired.push(effect.handle());
            }
        }
        for handle in expired {
            log::debug!("Effect {:?} expired", handle);
            self.remove_effect(handle);
        }

        for remaining in self.cooldowns.values_mut() {
            *remaining = (*remaining - dt).max(0.0);
        }
        self.cooldowns.retain(|_, remaining| *remaining > 0.0);
    }

    /// Grants an ability, or updates the level of the existing grant.
    pub fn give_ability(&mut self, definition: &Arc<AbilityDefinition>, level: u32) -> &mut AbilitySpec {
        let index = match self.ability_index(&definition.name) {
            Some(index) => {
                self.abilities[index].set_level(level);
                index
            }
            None => {
                self.abilities.push(AbilitySpec::new(definition.clone(), level));
                self.abilities.len() - 1
            }
        };
        &mut self.abilities[index]
    }

    /// Cancels the ability if active and revokes it. A running cooldown keeps counting.
    pub fn clear_ability(&mut self, ability: &str) -> bool {
        self.cancel_ability(ability);
        match self.ability_index(ability) {
            Some(index) => {
                self.abilities.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn ability_spec(&self, ability: &str) -> Option<&AbilitySpec> {
        self.abilities.iter().find(|spec| spec.name() == ability)
    }

    pub fn ability_spec_mut(&mut self, ability: &str) -> Option<&mut AbilitySpec> {
        self.abilities.iter_mut().find(|spec| spec.name() == ability)
    }

    pub fn granted_abilities(&self) -> &[AbilitySpec] {
        &self.abilities
    }

    /// Whether every gate would currently pass.
    pub fn can_activate_ability(&self, ability: &str) -> Result<(), ActivationFailure> {
        self.logic.check(self, ability).map(|_| ())
    }

    pub fn try_activate_ability(&mut self, ability: &str) -> bool {
        self.activate_ability(ability).is_ok()
    }

    /// [`try_activate_ability`](Self::try_activate_ability) reporting why it was refused.
    pub fn activate_ability(&mut self, ability: &str) -> Result<(), ActivationFailure> {
        let logic = self.logic.clone();
        logic.try_activate(self, ability)
    }

    pub fn end_ability(&mut self, ability: &str) -> bool {
        let logic = self.logic.clone();
        logic.end(self, ability)
    }

    pub fn cancel_ability(&mut self, ability: &str) -> bool {
        let logic = self.logic.clone();
        logic.cancel(self, ability)
    }

    /// Cancels every active ability carrying any of `tags`. Returns how many were cancelled.
    pub fn cancel_abilities_with_tags(&mut self, tags: &TagContainer) -> usize {
        let matching: Vec<String> = self
            .abilities
            .iter()
            .filter(|spec| spec.is_active() && spec.definition().ability_tags.has_any(tags))
            .map(|spec| spec.name().to_string())
            .collect();
        matching.iter().filter(|ability| self.cancel_ability(ability)).count()
    }

    pub fn apply_effect_to_self(&mut self, definition: &Arc<EffectDefinition>, level: f32) -> EffectApplication {
        self.apply_effect_spec_to_self(EffectSpec::new(definition, level))
    }

    pub fn apply_effect_spec_to_self(&mut self, spec: EffectSpec) -> EffectApplication {
        let source = self.owner_entity();
        let snapshot = self.attributes.as_ref().map(AttributeSet::snapshot);
        self.receive_effect(spec, source, snapshot)
    }

    /// Applies an effect from this hub onto `target`. Source-backed magnitudes read this
    /// hub's attributes as they are now.
    pub fn apply_effect_to_target(
        &self,
        definition: &Arc<EffectDefinition>,
        target: &mut AbilitySystemHub,
        level: f32,
    ) -> EffectApplication {
        self.apply_effect_spec_to_target(EffectSpec::new(definition, level), target)
    }

    pub fn apply_effect_spec_to_target(&self, spec: EffectSpec, target: &mut AbilitySystemHub) -> EffectApplication {
        let snapshot = self.attributes.as_ref().map(AttributeSet::snapshot);
        target.receive_effect(spec, self.owner_entity(), snapshot)
    }

    /// Applies an effect whose source is known only by a snapshot of its attributes.
    pub fn receive_effect(
        &mut self,
        spec: EffectSpec,
        source: Option<Entity>,
        source_snapshot: Option<AttributeSnapshot>,
    ) -> EffectApplication {
        let definition = spec.definition.clone();
        if let Err(error) = definition.validate() {
            log::error!("{}", error);
            return EffectApplication::Rejected(EffectRejection::InvalidDefinition);
        }
        if !self.tags.has_all(&definition.application_required_tags) {
            return EffectApplication::Rejected(EffectRejection::MissingRequiredTags);
        }
        if self.tags.has_any(&definition.application_blocked_tags) {
            log::debug!("Effect '{}' blocked by tags", definition.name);
            return EffectApplication::Rejected(EffectRejection::BlockedByTags);
        }
        let target = self.owner_entity();
        let Some(attributes) = self.attributes.as_mut() else {
            log::warn!("Effect '{}' applied to a hub without attributes", definition.name);
            return EffectApplication::Rejected(EffectRejection::NoAttributeSet);
        };

        if definition.is_instant() {
            let target_snapshot = attributes.snapshot();
            // never held, so it needs no real handle
            let effect = ActiveEffect::new(
                ActiveEffectHandle(0),
                spec,
                source,
                target,
                source_snapshot,
                Some(target_snapshot),
            );
            execute_modifiers(&definition.modifiers, attributes, &effect.environment());
            return EffectApplication::Executed;
        }

        if let Some(stacking) = definition.stacking {
            let existing = self
                .active_effects
                .iter_mut()
                .find(|effect| effect.definition().name == definition.name);
            if let Some(effect) = existing {
                let max_stacks = stacking.max_stacks.unwrap_or(u32::MAX);
                effect.stack_count = (effect.stack_count + 1).min(max_stacks);
                effect.recapture(spec, source, source_snapshot, attributes);
                if stacking.duration_refresh == StackDurationRefresh::Refresh {
                    effect.reset_duration();
                }
                if !definition.is_periodic() {
                    detach_modifiers(effect.handle, attributes);
                    attach_modifiers(effect.handle, &definition.modifiers, attributes, &effect.environment());
                }
                log::debug!("Effect '{}' now at {} stacks", definition.name, effect.stack_count);
                return EffectApplication::Stacked { handle: effect.handle, stack_count: effect.stack_count };
            }
        }

        let handle = ActiveEffectHandle(self.next_handle);
        self.next_handle += 1;
        let target_snapshot = attributes.snapshot();
        let mut effect = ActiveEffect::new(handle, spec, source, target, source_snapshot, Some(target_snapshot));

        match definition.period {
            Some(periodicity) => {
                if periodicity.execute_on_application {
                    execute_modifiers(&definition.modifiers, attributes, &effect.environment());
                    effect.executions += 1;
                }
            }
            None => {
                attach_modifiers(handle, &definition.modifiers, attributes, &effect.environment());
            }
        }
        self.tags.add_tags(&definition.granted_tags);
        effect.state = ActiveEffectState::Active;
        self.active_effects.push(effect);
        log::debug!("Effect '{}' applied as {:?}", definition.name, handle);
        EffectApplication::Applied(handle)
    }

    /// Unapplies the effect's modifiers and granted tags. False for unknown handles.
    pub fn remove_effect(&mut self, handle: ActiveEffectHandle) -> bool {
        let Some(index) = self.active_effects.iter().position(|effect| effect.handle == handle) else {
            return false;
        };
        let effect = self.active_effects.remove(index);
        if let Some(attributes) = self.attributes.as_mut() {
            detach_modifiers(handle, attributes);
        }
        self.tags.remove_tags(&effect.definition().granted_tags);
        self.removed_effects.push(RemovedEffect { handle, name: effect.definition().name.clone() });
        true
    }

    /// Takes `count` stacks off an active effect, rescaling its held modifiers. The effect
    /// is removed once no stacks remain. Returns the stacks left, `None` for unknown handles.
    pub fn remove_effect_stacks(&mut self, handle: ActiveEffectHandle, count: u32) -> Option<u32> {
        let effect = self.active_effects.iter_mut().find(|effect| effect.handle == handle)?;
        let remaining = effect.stack_count.saturating_sub(count);
        if remaining == 0 {
            self.remove_effect(handle);
            return Some(0);
        }

        effect.stack_count = remaining;
        let definition = effect.definition().clone();
        if !definition.is_periodic() {
            if let Some(attributes) = self.attributes.as_mut() {
                detach_modifiers(handle, attributes);
                attach_modifiers(handle, &definition.modifiers, attributes, &effect.environment());
            }
        }
        Some(remaining)
    }

    /// Removes every active effect granting a tag that matches any of `tags`.
    pub fn remove_effects_with_tags(&mut self, tags: &TagContainer) -> usize {
        let matching: Vec<ActiveEffectHandle> = self
            .active_effects
            .iter()
            .filter(|effect| effect.definition().granted_tags.has_any(tags))
            .map(ActiveEffect::handle)
            .collect();
        matching.into_iter().filter(|handle| self.remove_effect(*handle)).count()
    }

    pub fn active_effects(&self) -> &[ActiveEffect] {
        &self.active_effects
    }

    pub fn active_effect(&self, handle: ActiveEffectHandle) -> Option<&ActiveEffect> {
        self.active_effects.iter().find(|effect| effect.handle == handle)
    }

    /// Starts (or restarts) a cooldown. Non-positive durations clear it.
    pub fn start_cooldown(&mut self, ability: &str, seconds: f32) {
        if seconds > 0.0 {
            self.cooldowns.insert(ability.to_string(), seconds);
        } else {
            self.cooldowns.remove(ability);
        }
    }

    pub fn is_ability_on_cooldown(&self, ability: &str) -> bool {
        self.cooldowns.contains_key(ability)
    }

    pub fn get_ability_cooldown_remaining(&self, ability: &str) -> f32 {
        self.cooldowns.get(ability).copied().unwrap_or(0.0)
    }

    pub fn cooldown_snapshot(&self) -> Vec<(String, f32)> {
        self.cooldowns
            .iter()
            .map(|(ability, remaining)| (ability.clone(), *remaining))
            .collect()
    }

    pub fn add_tags(&mut self, tags: &TagContainer) {
        self.tags.add_tags(tags);
    }

    pub fn remove_tags(&mut self, tags: &TagContainer) {
        self.tags.remove_tags(tags);
    }

    pub fn add_tag(&mut self, tag: impl Into<GameplayTag>) {
        self.tags.add_tag(&tag.into());
    }

    pub fn remove_tag(&mut self, tag: impl Into<GameplayTag>) {
        self.tags.remove_tag(&tag.into());
    }

    pub fn has_tag(&self, tag: impl Into<GameplayTag>) -> bool {
        self.tags.has_tag(&tag.into())
    }

    pub fn has_any_tags(&self, tags: &TagContainer) -> bool {
        self.tags.has_any(tags)
    }

    pub fn has_all_tags(&self, tags: &TagContainer) -> bool {
        self.tags.has_all(tags)
    }

    pub fn tags(&self) -> &TagCountMap {
        &self.tags
    }

    /// Takes everything recorded since the last call.
    pub fn drain_notifications(&mut self) -> HubNotifications {
        HubNotifications {
            attribute_changes: self
                .attributes
                .as_mut()
                .map(AttributeSet::drain_changes)
                .unwrap_or_default(),
            activations: std::mem::take(&mut self.pending_activations),
            removed_effects: std::mem::take(&mut self.removed_effects),
        }
    }

    fn ability_index(&self, ability: &str) -> Option<usize> {
        self.abilities.iter().position(|spec| spec.name() == ability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::BehaviourRegistry;
    use crate::behaviours::NoopBehaviour;
    use crate::collaborators::StaticOwner;
    use crate::modifiers::ModifierInfo;

    fn hub() -> AbilitySystemHub {
        let mut registry = BehaviourRegistry::new();
        registry.register("Noop", Arc::new(NoopBehaviour)).unwrap();
        let logic = Arc::new(AbilityActivationLogic::new(Arc::new(registry)));
        let mut hub = AbilitySystemHub::new(logic);
        hub.init_owner(Arc::new(StaticOwner::new(Entity::from_raw(7), Vec3::ZERO)));
        hub.initialize_attribute_set(AttributeSet::new().with_attribute("Health", 100.0));
        hub
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut hub = hub();
        let buff = Arc::new(EffectDefinition::infinite("Fortify").with_modifier(ModifierInfo::add("Health", 10.0)));
        let first = hub.apply_effect_to_self(&buff, 1.0).handle().unwrap();
        assert!(hub.remove_effect(first));
        let second = hub.apply_effect_to_self(&buff, 1.0).handle().unwrap();
        assert_ne!(first, second);
        assert!(!hub.remove_effect(first));
    }

    #[test]
    fn test_give_ability_is_idempotent() {
        let mut hub = hub();
        let dash = Arc::new(AbilityDefinition::new("Dash", "Noop"));
        hub.give_ability(&dash, 1);
        hub.give_ability(&dash, 3);
        assert_eq!(hub.granted_abilities().len(), 1);
        assert_eq!(hub.ability_spec("Dash").map(AbilitySpec::level), Some(3));
    }

    #[test]
    fn test_notifications_drain_once() {
        let mut hub = hub();
        let hit = Arc::new(EffectDefinition::instant("Hit").with_modifier(ModifierInfo::add("Health", -10.0)));
        hub.apply_effect_to_self(&hit, 1.0);

        let notifications = hub.drain_notifications();
        assert_eq!(notifications.attribute_changes.len(), 1);
        assert!(hub.drain_notifications().is_empty());
    }

    #[test]
    fn test_no_attribute_set_rejects_effects() {
        let logic = Arc::new(AbilityActivationLogic::new(Arc::new(BehaviourRegistry::new())));
        let mut hub = AbilitySystemHub::new(logic);
        let hit = Arc::new(EffectDefinition::instant("Hit").with_modifier(ModifierInfo::add("Health", -10.0)));
        assert_eq!(
            hub.apply_effect_to_self(&hit, 1.0),
            EffectApplication::Rejected(EffectRejection::NoAttributeSet)
        );
    }
}
