use serde::{Deserialize, Serialize};

use crate::active_effect::ActiveEffectHandle;
use crate::attribute::AttributeModifier;
use crate::attribute_set::AttributeSet;
use crate::magnitude::{CaptureEnvironment, MagnitudeCalculation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierOp {
    Add,
    Multiply,
    /// Replaces the aggregated value outright; the most recently applied override wins.
    Override,
}

/// One rule of an effect: which attribute, how to combine, and how to size it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierInfo {
    pub attribute: String,
    pub op: ModifierOp,
    pub magnitude: MagnitudeCalculation,
}

impl ModifierInfo {
    pub fn new(attribute: impl Into<String>, op: ModifierOp, magnitude: impl Into<MagnitudeCalculation>) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            magnitude: magnitude.into(),
        }
    }

    pub fn add(attribute: impl Into<String>, magnitude: impl Into<MagnitudeCalculation>) -> Self {
        Self::new(attribute, ModifierOp::Add, magnitude)
    }

    pub fn multiply(attribute: impl Into<String>, magnitude: impl Into<MagnitudeCalculation>) -> Self {
        Self::new(attribute, ModifierOp::Multiply, magnitude)
    }

    pub fn override_with(attribute: impl Into<String>, magnitude: impl Into<MagnitudeCalculation>) -> Self {
        Self::new(attribute, ModifierOp::Override, magnitude)
    }
}

/// Executes each modifier once against its attribute's base value, in order.
///
/// Each magnitude is computed right before its own write, so later modifiers observe
/// the earlier ones. Returns how many modifiers found their attribute.
pub(crate) fn execute_modifiers(
    modifiers: &[ModifierInfo],
    target: &mut AttributeSet,
    env: &CaptureEnvironment,
) -> usize {
    let mut executed = 0;
    for modifier in modifiers.iter() {
        if !target.contains(&modifier.attribute) {
            log::warn!("Modifier targets unknown attribute '{}'", modifier.attribute);
            continue;
        }
        let magnitude = modifier.magnitude.resolve_value(target, env);
        if target.apply_to_base(&modifier.attribute, modifier.op, magnitude) {
            executed += 1;
        }
    }
    executed
}

/// Hands each modifier to its attribute to hold on behalf of `source`.
pub(crate) fn attach_modifiers(
    source: ActiveEffectHandle,
    modifiers: &[ModifierInfo],
    target: &mut AttributeSet,
    env: &CaptureEnvironment,
) -> usize {
    let mut attached = 0;
    for modifier in modifiers.iter() {
        if !target.contains(&modifier.attribute) {
            log::warn!("Modifier targets unknown attribute '{}'", modifier.attribute);
            continue;
        }
        let magnitude = modifier.magnitude.resolve(target, env, true);
        let held = AttributeModifier { source, op: modifier.op, magnitude };
        if target.add_modifier(&modifier.attribute, held) {
            attached += 1;
        }
    }
    attached
}

/// Removes everything `source` attached.
pub(crate) fn detach_modifiers(source: ActiveEffectHandle, target: &mut AttributeSet) -> usize {
    target.remove_modifiers_from(source)
}
