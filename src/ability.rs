use std::any::Any;
use std::sync::Arc;

use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::magnitude::ScalableFloat;
use crate::tags::{GameplayTag, TagContainer};

/// When an activated ability returns to inactive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndPolicy {
    /// Ends right after activation (fire and forget).
    #[default]
    InstantEnd,
    /// Stays active until ended or cancelled (channels, auras, toggles).
    ManualEnd,
}

/// A resource spent on activation, evaluated at the ability's level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityCost {
    pub attribute: String,
    pub amount: ScalableFloat,
}

impl AbilityCost {
    pub fn new(attribute: impl Into<String>, amount: impl Into<ScalableFloat>) -> Self {
        Self { attribute: attribute.into(), amount: amount.into() }
    }
}

/// Immutable ability configuration. Carries no logic.
///
/// Abilities are identified by `name`; `behaviour` selects the [`Behaviour`](crate::behaviour::Behaviour)
/// registered for this kind of ability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub name: String,
    pub behaviour: String,
    #[serde(default)]
    pub end_policy: EndPolicy,
    #[serde(default)]
    pub cost: Option<AbilityCost>,
    /// Cooldown seconds, evaluated at the ability's level.
    #[serde(default)]
    pub cooldown: Option<ScalableFloat>,
    /// Allows activating again while already active.
    #[serde(default)]
    pub allow_reactivation: bool,
    /// Added to the owner's tags while active.
    #[serde(default)]
    pub ability_tags: TagContainer,
    /// Other active abilities carrying any of these are cancelled on activation.
    #[serde(default)]
    pub cancel_tags: TagContainer,
    /// Activation is refused while the owner holds any of these.
    #[serde(default)]
    pub block_tags: TagContainer,
    /// Activation is refused unless the owner holds all of these.
    #[serde(default)]
    pub required_tags: TagContainer,
}

impl AbilityDefinition {
    pub fn new(name: impl Into<String>, behaviour: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: behaviour.into(),
            end_policy: EndPolicy::InstantEnd,
            cost: None,
            cooldown: None,
            allow_reactivation: false,
            ability_tags: TagContainer::new(),
            cancel_tags: TagContainer::new(),
            block_tags: TagContainer::new(),
            required_tags: TagContainer::new(),
        }
    }

    pub fn manual_end(mut self) -> Self {
        self.end_policy = EndPolicy::ManualEnd;
        self
    }

    pub fn with_cost(mut self, attribute: impl Into<String>, amount: impl Into<ScalableFloat>) -> Self {
        self.cost = Some(AbilityCost::new(attribute, amount));
        self
    }

    pub fn with_cooldown(mut self, seconds: impl Into<ScalableFloat>) -> Self {
        self.cooldown = Some(seconds.into());
        self
    }

    pub fn reactivatable(mut self) -> Self {
        self.allow_reactivation = true;
        self
    }

    pub fn tagged(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.ability_tags.add(tag);
        self
    }

    pub fn cancelling(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.cancel_tags.add(tag);
        self
    }

    pub fn blocked_by(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.block_tags.add(tag);
        self
    }

    pub fn requiring(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.required_tags.add(tag);
        self
    }

    pub fn cost_at(&self, level: u32) -> Option<(&str, f32)> {
        self.cost
            .as_ref()
            .map(|cost| (cost.attribute.as_str(), cost.amount.evaluate(level as f32)))
    }

    pub fn cooldown_at(&self, level: u32) -> f32 {
        self.cooldown
            .as_ref()
            .map(|cooldown| cooldown.evaluate(level as f32).max(0.0))
            .unwrap_or(0.0)
    }
}

/// Per-owner runtime state of one granted ability.
///
/// Behaviours are shared between hubs, so anything an activation needs to remember
/// lives here.
#[derive(Debug)]
pub struct AbilitySpec {
    pub(crate) definition: Arc<AbilityDefinition>,
    pub(crate) level: u32,
    pub(crate) active: bool,
    pub(crate) activation_count: u32,
    pub(crate) target: Option<Entity>,
    pub(crate) state: Option<Box<dyn Any + Send + Sync>>,
}

impl AbilitySpec {
    pub(crate) fn new(definition: Arc<AbilityDefinition>, level: u32) -> Self {
        Self {
            definition,
            level: level.max(1),
            active: false,
            activation_count: 0,
            target: None,
            state: None,
        }
    }

    pub fn definition(&self) -> &Arc<AbilityDefinition> {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level.max(1);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activation_count(&self) -> u32 {
        self.activation_count
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<Entity>) {
        self.target = target;
    }

    pub fn state<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|state| state.downcast_ref::<T>())
    }

    pub fn state_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|state| state.downcast_mut::<T>())
    }

    pub fn insert_state<T: Any + Send + Sync>(&mut self, state: T) {
        self.state = Some(Box::new(state));
    }

    pub fn clear_state(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnitude::LevelCurve;

    #[test]
    fn test_level_is_clamped() {
        let mut spec = AbilitySpec::new(Arc::new(AbilityDefinition::new("Dash", "Dash")), 0);
        assert_eq!(spec.level(), 1);
        spec.set_level(0);
        assert_eq!(spec.level(), 1);
        spec.set_level(4);
        assert_eq!(spec.level(), 4);
    }

    #[test]
    fn test_cost_and_cooldown_scale_with_level() {
        let definition = AbilityDefinition::new("Fireball", "Projectile")
            .with_cost("Mana", ScalableFloat::new(10.0).with_curve(LevelCurve::Table(vec![1.0, 1.5, 2.0])))
            .with_cooldown(4.0);
        assert_eq!(definition.cost_at(1), Some(("Mana", 10.0)));
        assert_eq!(definition.cost_at(3), Some(("Mana", 20.0)));
        assert_eq!(definition.cooldown_at(2), 4.0);
        assert_eq!(AbilityDefinition::new("Free", "Noop").cooldown_at(1), 0.0);
    }

    #[test]
    fn test_typed_state_slot() {
        #[derive(Debug, PartialEq)]
        struct Charges(u32);

        let mut spec = AbilitySpec::new(Arc::new(AbilityDefinition::new("Volley", "Volley")), 1);
        assert!(spec.state::<Charges>().is_none());
        spec.insert_state(Charges(3));
        spec.state_mut::<Charges>().unwrap().0 -= 1;
        assert_eq!(spec.state::<Charges>(), Some(&Charges(2)));
        assert!(spec.state::<u32>().is_none());
    }
}
