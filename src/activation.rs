use std::sync::Arc;

use crate::ability::{AbilityDefinition, EndPolicy};
use crate::behaviour::{Behaviour, BehaviourContext, BehaviourRegistry};
use crate::hub::AbilitySystemHub;

/// Why an activation request was refused. Nothing on the hub changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationFailure {
    NotGranted,
    NoOwner,
    AlreadyActive,
    OnCooldown,
    InsufficientCost,
    Blocked,
    MissingRequiredTags,
    BehaviourRefused,
    MissingBehaviour,
    /// Requested from inside a behaviour callback on the same hub.
    Reentrant,
}

impl std::fmt::Display for ActivationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            ActivationFailure::NotGranted => "ability not granted",
            ActivationFailure::NoOwner => "hub has no owner",
            ActivationFailure::AlreadyActive => "already active",
            ActivationFailure::OnCooldown => "on cooldown",
            ActivationFailure::InsufficientCost => "cannot pay cost",
            ActivationFailure::Blocked => "blocked by tags",
            ActivationFailure::MissingRequiredTags => "missing required tags",
            ActivationFailure::BehaviourRefused => "refused by behaviour",
            ActivationFailure::MissingBehaviour => "no behaviour registered",
            ActivationFailure::Reentrant => "requested from a behaviour callback",
        };
        write!(f, "{}", reason)
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Activated,
    Ended,
    Cancelled,
}

/// The activation state machine shared by every ability: gate, activate, end, cancel.
///
/// Holds no per-ability state; everything it mutates lives on the hub it is handed.
pub struct AbilityActivationLogic {
    registry: Arc<BehaviourRegistry>,
}

impl AbilityActivationLogic {
    pub fn new(registry: Arc<BehaviourRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BehaviourRegistry> {
        &self.registry
    }

    /// Runs every gate in order without mutating anything.
    ///
    /// Order: granted, owner bound, not already active (unless reactivatable), cooldown,
    /// cost, block tags, required tags, then the behaviour's own check.
    pub fn check(&self, hub: &AbilitySystemHub, ability: &str) -> Result<Arc<dyn Behaviour>, ActivationFailure> {
        let spec = hub.ability_spec(ability).ok_or(ActivationFailure::NotGranted)?;
        if hub.owner().is_none() {
            return Err(ActivationFailure::NoOwner);
        }

        let definition = spec.definition();
        if spec.is_active() && !definition.allow_reactivation {
            return Err(ActivationFailure::AlreadyActive);
        }
        if hub.is_ability_on_cooldown(ability) {
            return Err(ActivationFailure::OnCooldown);
        }
        if let Some((attribute, amount)) = definition.cost_at(spec.level()) {
            let available = hub.attributes().and_then(|attributes| attributes.value(attribute));
            match available {
                Some(value) if amount <= value => {}
                Some(_) => return Err(ActivationFailure::InsufficientCost),
                None => {
                    log::warn!("'{}' costs '{}', which the hub does not have", ability, attribute);
                    return Err(ActivationFailure::InsufficientCost);
                }
            }
        }
        if hub.has_any_tags(&definition.block_tags) {
            return Err(ActivationFailure::Blocked);
        }
        if !hub.has_all_tags(&definition.required_tags) {
            return Err(ActivationFailure::MissingRequiredTags);
        }

        let behaviour = self
            .registry
            .resolve(definition)
            .map_err(|_| ActivationFailure::MissingBehaviour)?;
        if !behaviour.can_activate(hub, spec) {
            return Err(ActivationFailure::BehaviourRefused);
        }
        Ok(behaviour)
    }

    pub fn try_activate(&self, hub: &mut AbilitySystemHub, ability: &str) -> Result<(), ActivationFailure> {
        if hub.in_callback {
            log::warn!("Refusing to activate '{}' from inside a behaviour callback", ability);
            return Err(ActivationFailure::Reentrant);
        }

        let behaviour = self.check(hub, ability).inspect_err(|failure| {
            log::debug!("Activation of '{}' refused: {}", ability, failure);
        })?;

        let Some(spec) = hub.ability_spec_mut(ability) else {
            return Err(ActivationFailure::NotGranted);
        };
        let was_active = spec.active;
        spec.active = true;
        spec.activation_count += 1;
        let definition = spec.definition.clone();
        let level = spec.level;

        let cancelled: Vec<String> = hub
            .abilities
            .iter()
            .filter(|other| other.active && other.name() != ability)
            .filter(|other| other.definition.ability_tags.has_any(&definition.cancel_tags))
            .map(|other| other.name().to_string())
            .collect();
        for other in cancelled {
            self.cancel(hub, &other);
        }

        if !was_active {
            hub.tags.add_tags(&definition.ability_tags);
        }
        if let Some((attribute, amount)) = definition.cost_at(level) {
            if let Some(attributes) = hub.attributes.as_mut() {
                attributes.spend(attribute, amount);
            }
        }
        let cooldown = definition.cooldown_at(level);
        if cooldown > 0.0 {
            hub.start_cooldown(ability, cooldown);
        }

        log::debug!("Activated '{}' (level {})", ability, level);
        hub.pending_activations.push(ability.to_string());
        self.invoke(hub, &definition, &behaviour, Phase::Activated);

        if definition.end_policy == EndPolicy::InstantEnd {
            self.end(hub, ability);
        }
        Ok(())
    }

    /// Returns the ability to inactive through `on_ended`. False when it was not active.
    pub fn end(&self, hub: &mut AbilitySystemHub, ability: &str) -> bool {
        self.finish(hub, ability, Phase::Ended)
    }

    /// Like [`end`](Self::end), but routed through `on_cancelled`.
    pub fn cancel(&self, hub: &mut AbilitySystemHub, ability: &str) -> bool {
        self.finish(hub, ability, Phase::Cancelled)
    }

    fn finish(&self, hub: &mut AbilitySystemHub, ability: &str, phase: Phase) -> bool {
        let Some(spec) = hub.ability_spec_mut(ability) else {
            return false;
        };
        if !spec.active {
            return false;
        }
        spec.active = false;
        let definition = spec.definition.clone();
        hub.tags.remove_tags(&definition.ability_tags);

        match self.registry.resolve(&definition) {
            Ok(behaviour) => self.invoke(hub, &definition, &behaviour, phase),
            Err(error) => log::debug!("{}", error),
        }
        true
    }

    fn invoke(
        &self,
        hub: &mut AbilitySystemHub,
        definition: &Arc<AbilityDefinition>,
        behaviour: &Arc<dyn Behaviour>,
        phase: Phase,
    ) {
        let was_in_callback = std::mem::replace(&mut hub.in_callback, true);
        {
            let mut context = BehaviourContext { hub: &mut *hub, ability: definition.clone() };
            match phase {
                Phase::Activated => behaviour.on_activated(&mut context),
                Phase::Ended => behaviour.on_ended(&mut context),
                Phase::Cancelled => behaviour.on_cancelled(&mut context),
            }
        }
        hub.in_callback = was_in_callback;
    }
}
