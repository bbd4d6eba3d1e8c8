use std::sync::{Arc, RwLock};

use bevy::platform::collections::HashMap;

use crate::ability::{AbilityDefinition, AbilitySpec};
use crate::collaborators::OwnerIdentity;
use crate::error::{HubError, HubResult};
use crate::hub::AbilitySystemHub;

/// Suffix pairing for the naming-convention lookup: `"FireballData"` resolves to a
/// behaviour registered as `"FireballBehaviour"`.
const DATA_SUFFIX: &str = "Data";
const BEHAVIOUR_SUFFIX: &str = "Behaviour";

/// Mutable view handed to behaviour callbacks.
///
/// The hub refuses ticks and new activations while a callback runs.
pub struct BehaviourContext<'a> {
    pub(crate) hub: &'a mut AbilitySystemHub,
    pub(crate) ability: Arc<AbilityDefinition>,
}

impl<'a> BehaviourContext<'a> {
    pub fn hub(&self) -> &AbilitySystemHub {
        &*self.hub
    }

    pub fn hub_mut(&mut self) -> &mut AbilitySystemHub {
        &mut *self.hub
    }

    pub fn ability(&self) -> &Arc<AbilityDefinition> {
        &self.ability
    }

    pub fn spec(&self) -> Option<&AbilitySpec> {
        self.hub.ability_spec(&self.ability.name)
    }

    pub fn spec_mut(&mut self) -> Option<&mut AbilitySpec> {
        self.hub.ability_spec_mut(&self.ability.name)
    }

    pub fn owner(&self) -> Option<&Arc<dyn OwnerIdentity>> {
        self.hub.owner()
    }
}

/// Ability-specific payload.
///
/// One instance is shared by every hub using it; per-activation data belongs on the
/// [`AbilitySpec`].
pub trait Behaviour: Send + Sync {
    /// Extra gating, run after every generic gate has passed.
    fn can_activate(&self, _hub: &AbilitySystemHub, _spec: &AbilitySpec) -> bool {
        true
    }

    fn on_activated(&self, _context: &mut BehaviourContext) {}

    fn on_ended(&self, _context: &mut BehaviourContext) {}

    fn on_cancelled(&self, _context: &mut BehaviourContext) {}
}

/// Checked registration table from ability behaviour keys to shared behaviours.
///
/// Lookups try an explicit mapping first, then a behaviour registered under the key
/// itself, then the `…Data` ⇒ `…Behaviour` convention. The outcome is cached per key, and
/// a missing mapping is reported once and leaves that ability inert.
#[derive(Default)]
pub struct BehaviourRegistry {
    behaviours: HashMap<String, Arc<dyn Behaviour>>,
    mappings: HashMap<String, String>,
    resolved: RwLock<HashMap<String, Option<Arc<dyn Behaviour>>>>,
}

impl BehaviourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, behaviour: Arc<dyn Behaviour>) -> HubResult<()> {
        let key = key.into();
        if self.behaviours.contains_key(&key) {
            return Err(HubError::DuplicateBehaviour { key });
        }
        self.behaviours.insert(key, behaviour);
        self.invalidate();
        Ok(())
    }

    /// Routes a definition's behaviour key to a differently named registration.
    pub fn map(&mut self, definition_key: impl Into<String>, behaviour_key: impl Into<String>) {
        self.mappings.insert(definition_key.into(), behaviour_key.into());
        self.invalidate();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.behaviours.contains_key(key)
    }

    pub fn resolve(&self, definition: &AbilityDefinition) -> HubResult<Arc<dyn Behaviour>> {
        let key = definition.behaviour.as_str();
        let missing = || HubError::MissingBehaviour {
            key: key.to_string(),
            ability: definition.name.clone(),
        };

        if let Ok(cache) = self.resolved.read() {
            if let Some(cached) = cache.get(key) {
                return cached.clone().ok_or_else(missing);
            }
        }

        let found = self.lookup(key);
        if found.is_none() {
            log::error!("{}; the ability stays inert until one is registered", missing());
        }
        if let Ok(mut cache) = self.resolved.write() {
            cache.insert(key.to_string(), found.clone());
        }
        found.ok_or_else(missing)
    }

    /// Reports every definition whose behaviour cannot be resolved.
    pub fn validate<'a>(&self, definitions: impl IntoIterator<Item = &'a AbilityDefinition>) -> Vec<HubError> {
        definitions
            .into_iter()
            .filter(|definition| self.lookup(&definition.behaviour).is_none())
            .map(|definition| HubError::MissingBehaviour {
                key: definition.behaviour.clone(),
                ability: definition.name.clone(),
            })
            .collect()
    }

    fn lookup(&self, key: &str) -> Option<Arc<dyn Behaviour>> {
        if let Some(mapped) = self.mappings.get(key) {
            return self.behaviours.get(mapped).cloned();
        }
        if let Some(behaviour) = self.behaviours.get(key) {
            return Some(behaviour.clone());
        }
        let stem = key.strip_suffix(DATA_SUFFIX)?;
        self.behaviours.get(&format!("{}{}", stem, BEHAVIOUR_SUFFIX)).cloned()
    }

    fn invalidate(&mut self) {
        if let Ok(cache) = self.resolved.get_mut() {
            cache.clear();
        }
    }
}
