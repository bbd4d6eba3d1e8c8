use std::sync::Arc;

use bevy::platform::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::active_effect::ActiveEffectHandle;
use crate::attribute_set::AttributeSet;
use crate::error::{HubError, HubResult};
use crate::modifiers::ModifierInfo;
use crate::tags::{GameplayTag, TagContainer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DurationPolicy {
    /// Executes against base values once and is never held.
    Instant,
    /// Held for this many seconds.
    Duration(f32),
    /// Held until explicitly removed.
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Periodicity {
    pub period: f32,
    /// Also execute once at the moment of application.
    #[serde(default)]
    pub execute_on_application: bool,
}

/// What happens to the remaining duration when a stack is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackDurationRefresh {
    /// Remaining duration resets to the full duration; the period timer is kept.
    #[default]
    Refresh,
    Keep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StackingPolicy {
    #[serde(default)]
    pub max_stacks: Option<u32>,
    #[serde(default)]
    pub duration_refresh: StackDurationRefresh,
}

/// Immutable effect configuration, shared by every application of it.
///
/// Effects are identified by `name`; re-applying a stackable effect with the same name
/// merges into the existing active instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDefinition {
    pub name: String,
    pub duration: DurationPolicy,
    #[serde(default)]
    pub period: Option<Periodicity>,
    #[serde(default)]
    pub modifiers: Vec<ModifierInfo>,
    /// Added to the target's tags while the effect is active.
    #[serde(default)]
    pub granted_tags: TagContainer,
    /// The target must hold all of these for the effect to apply.
    #[serde(default)]
    pub application_required_tags: TagContainer,
    /// The target must hold none of these (immunities).
    #[serde(default)]
    pub application_blocked_tags: TagContainer,
    #[serde(default)]
    pub stacking: Option<StackingPolicy>,
}

impl EffectDefinition {
    pub fn new(name: impl Into<String>, duration: DurationPolicy) -> Self {
        Self {
            name: name.into(),
            duration,
            period: None,
            modifiers: Vec::new(),
            granted_tags: TagContainer::new(),
            application_required_tags: TagContainer::new(),
            application_blocked_tags: TagContainer::new(),
            stacking: None,
        }
    }

    pub fn instant(name: impl Into<String>) -> Self {
        Self::new(name, DurationPolicy::Instant)
    }

    pub fn timed(name: impl Into<String>, seconds: f32) -> Self {
        Self::new(name, DurationPolicy::Duration(seconds))
    }

    pub fn infinite(name: impl Into<String>) -> Self {
        Self::new(name, DurationPolicy::Infinite)
    }

    pub fn with_modifier(mut self, modifier: ModifierInfo) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_period(mut self, period: f32) -> Self {
        self.period = Some(Periodicity { period, execute_on_application: false });
        self
    }

    pub fn with_period_on_application(mut self, period: f32) -> Self {
        self.period = Some(Periodicity { period, execute_on_application: true });
        self
    }

    pub fn granting(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.granted_tags.add(tag);
        self
    }

    pub fn requiring(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.application_required_tags.add(tag);
        self
    }

    pub fn blocked_by(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.application_blocked_tags.add(tag);
        self
    }

    pub fn stackable(mut self, max_stacks: Option<u32>) -> Self {
        self.stacking = Some(StackingPolicy { max_stacks, ..Default::default() });
        self
    }

    pub fn with_stacking(mut self, stacking: StackingPolicy) -> Self {
        self.stacking = Some(stacking);
        self
    }

    pub fn is_instant(&self) -> bool {
        matches!(self.duration, DurationPolicy::Instant)
    }

    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    pub fn is_stackable(&self) -> bool {
        self.stacking.is_some()
    }

    pub fn validate(&self) -> HubResult<()> {
        let invalid = |details: &str| {
            Err(HubError::InvalidDefinition { name: self.name.clone(), details: details.to_string() })
        };

        if let DurationPolicy::Duration(seconds) = self.duration {
            if !(seconds > 0.0) {
                return invalid("duration must be positive");
            }
        }
        if let Some(periodicity) = &self.period {
            if self.is_instant() {
                return invalid("instant effects cannot be periodic");
            }
            if !(periodicity.period > 0.0) {
                return invalid("period must be positive");
            }
        }
        if let Some(StackingPolicy { max_stacks: Some(0), .. }) = self.stacking {
            return invalid("max stacks must be at least 1");
        }
        if self.is_instant() && self.is_stackable() {
            return invalid("instant effects cannot stack");
        }
        Ok(())
    }

    /// Checks that every modifier targets an attribute `attributes` defines.
    pub fn check_attributes(&self, attributes: &AttributeSet) -> HubResult<()> {
        match self.modifiers.iter().find(|modifier| !attributes.contains(&modifier.attribute)) {
            Some(modifier) => Err(HubError::UnknownAttribute { attribute: modifier.attribute.clone() }),
            None => Ok(()),
        }
    }
}

/// An effect definition paired with the per-application inputs.
#[derive(Debug, Clone)]
pub struct EffectSpec {
    pub definition: Arc<EffectDefinition>,
    pub level: f32,
    pub set_by_caller: HashMap<GameplayTag, f32>,
}

impl EffectSpec {
    pub fn new(definition: &Arc<EffectDefinition>, level: f32) -> Self {
        Self {
            definition: definition.clone(),
            level,
            set_by_caller: HashMap::new(),
        }
    }

    pub fn with_set_by_caller(mut self, tag: impl Into<GameplayTag>, magnitude: f32) -> Self {
        self.set_by_caller.insert(tag.into(), magnitude);
        self
    }
}

/// Why an effect application changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectRejection {
    NoAttributeSet,
    InvalidDefinition,
    MissingRequiredTags,
    BlockedByTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectApplication {
    /// An instant effect ran against base values; nothing is held.
    Executed,
    Applied(ActiveEffectHandle),
    /// Merged into an existing active instance.
    Stacked { handle: ActiveEffectHandle, stack_count: u32 },
    Rejected(EffectRejection),
}

impl EffectApplication {
    /// The handle of the active instance holding this application, if any.
    pub fn handle(&self) -> Option<ActiveEffectHandle> {
        match self {
            EffectApplication::Applied(handle) | EffectApplication::Stacked { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, EffectApplication::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_timing() {
        assert!(EffectDefinition::timed("Zero", 0.0).validate().is_err());
        assert!(EffectDefinition::instant("Ticking").with_period(1.0).validate().is_err());
        assert!(EffectDefinition::infinite("Stalled").with_period(0.0).validate().is_err());
        assert!(EffectDefinition::instant("Stacking").stackable(None).validate().is_err());
        assert!(EffectDefinition::infinite("Burn").with_period(0.5).stackable(Some(3)).validate().is_ok());
    }

    #[test]
    fn test_check_attributes_names_the_unknown_one() {
        let attributes = AttributeSet::new().with_attribute("Health", 100.0);
        let effect = EffectDefinition::instant("Drain")
            .with_modifier(ModifierInfo::add("Health", -5.0))
            .with_modifier(ModifierInfo::add("Mana", -5.0));
        assert_eq!(
            effect.check_attributes(&attributes),
            Err(HubError::UnknownAttribute { attribute: "Mana".to_string() })
        );
    }

    #[test]
    fn test_handle_only_for_held_effects() {
        let handle = ActiveEffectHandle(4);
        assert_eq!(EffectApplication::Applied(handle).handle(), Some(handle));
        assert_eq!(EffectApplication::Stacked { handle, stack_count: 2 }.handle(), Some(handle));
        assert_eq!(EffectApplication::Executed.handle(), None);
        assert!(EffectApplication::Rejected(EffectRejection::BlockedByTags).is_rejected());
    }
}
