use std::collections::{BTreeMap, VecDeque};

use bevy::platform::collections::HashMap;

use crate::active_effect::ActiveEffectHandle;
use crate::attribute::{Attribute, AttributeBound, AttributeBounds, AttributeModifier, ModifierMagnitude};
use crate::modifiers::ModifierOp;

/// A change of an attribute's current value, recorded in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub attribute: String,
    pub old: f32,
    pub new: f32,
}

/// Read-only copy of an attribute set's current values.
///
/// Taken from the source hub when an effect is applied so that source-backed magnitudes
/// can be evaluated later without access to the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSnapshot(BTreeMap<String, f32>);

impl AttributeSnapshot {
    pub fn get(&self, attribute: &str) -> Option<f32> {
        self.0.get(attribute).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// The named attributes owned by one hub.
///
/// Every write goes through a full recompute of the touched attribute, followed by the
/// attributes that depend on it (live magnitudes and attribute bounds).
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    attributes: BTreeMap<String, Attribute>,
    changes: Vec<AttributeChange>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, base_value: f32) -> Self {
        self.define(attribute, Attribute::new(base_value));
        self
    }

    pub fn with_bounded_attribute(
        mut self,
        attribute: impl Into<String>,
        base_value: f32,
        bounds: AttributeBounds,
    ) -> Self {
        self.define(attribute, Attribute::new(base_value).with_bounds(bounds));
        self
    }

    /// Inserts or replaces an attribute definition.
    pub fn define(&mut self, attribute: impl Into<String>, definition: Attribute) {
        let key = attribute.into();
        self.attributes.insert(key.clone(), definition);
        self.recompute(&key);
    }

    pub fn set_bounds(&mut self, attribute: &str, bounds: AttributeBounds) -> bool {
        let Some(existing) = self.attributes.get_mut(attribute) else {
            return false;
        };
        existing.bounds = bounds;
        self.recompute(attribute);
        true
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    pub fn get(&self, attribute: &str) -> Option<&Attribute> {
        self.attributes.get(attribute)
    }

    /// Current value of an attribute.
    pub fn value(&self, attribute: &str) -> Option<f32> {
        self.attributes.get(attribute).map(Attribute::current_value)
    }

    pub fn base_value(&self, attribute: &str) -> Option<f32> {
        self.attributes.get(attribute).map(Attribute::base_value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(name, attribute)| (name.as_str(), attribute))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn snapshot(&self) -> AttributeSnapshot {
        AttributeSnapshot(
            self.attributes
                .iter()
                .map(|(name, attribute)| (name.clone(), attribute.current_value))
                .collect(),
        )
    }

    /// Sets the base value (clamped to the attribute's bounds) and recomputes.
    pub fn set_base_value(&mut self, attribute: &str, value: f32) -> bool {
        let Some(existing) = self.attributes.get(attribute) else {
            return false;
        };
        let clamped = self.clamp(&existing.bounds, value);
        if let Some(existing) = self.attributes.get_mut(attribute) {
            existing.base_value = clamped;
        }
        self.recompute(attribute);
        true
    }

    /// Executes one instant operation against the base value.
    pub fn apply_to_base(&mut self, attribute: &str, op: ModifierOp, magnitude: f32) -> bool {
        let Some(base) = self.base_value(attribute) else {
            return false;
        };
        let value = match op {
            ModifierOp::Add => base + magnitude,
            ModifierOp::Multiply => base * magnitude,
            ModifierOp::Override => magnitude,
        };
        self.set_base_value(attribute, value)
    }

    /// Lowers the current value by `amount` through the base value, never below zero.
    ///
    /// The base delta is divided by the attribute's multipliers so the current value drops
    /// by exactly the charged amount. While an Override hides the base value, the base
    /// value is charged directly.
    pub fn spend(&mut self, attribute: &str, amount: f32) -> bool {
        let Some(existing) = self.attributes.get(attribute) else {
            return false;
        };
        let charge = amount.min(existing.current_value.max(0.0));
        let factor = existing.base_factor(|magnitude| self.resolve_magnitude(attribute, existing, magnitude));
        let base = match factor {
            Some(factor) if factor != 0.0 => existing.base_value - charge / factor,
            _ => (existing.base_value - charge).max(0.0),
        };
        self.set_base_value(attribute, base)
    }

    /// Adjusts the current value directly, bypassing the base value.
    ///
    /// The next recompute of this attribute derives the current value from the base value
    /// again; durable changes belong in [`set_base_value`](Self::set_base_value).
    pub fn modify_current_value(&mut self, attribute: &str, delta: f32) -> bool {
        let Some(current) = self.value(attribute) else {
            return false;
        };
        self.set_current_value(attribute, current + delta)
    }

    pub fn set_current_value(&mut self, attribute: &str, value: f32) -> bool {
        let Some(existing) = self.attributes.get(attribute) else {
            return false;
        };
        let new = self.clamp(&existing.bounds, value);
        let old = existing.current_value;
        if old != new {
            if let Some(existing) = self.attributes.get_mut(attribute) {
                existing.current_value = new;
            }
            self.changes.push(AttributeChange { attribute: attribute.to_string(), old, new });
            for dependent in self.dependents_of(attribute) {
                self.recompute(&dependent);
            }
        }
        true
    }

    pub(crate) fn add_modifier(&mut self, attribute: &str, modifier: AttributeModifier) -> bool {
        let Some(existing) = self.attributes.get_mut(attribute) else {
            return false;
        };
        existing.modifiers.push(modifier);
        self.recompute(attribute);
        true
    }

    /// Drops every modifier held for `source` and recomputes what it touched.
    pub(crate) fn remove_modifiers_from(&mut self, source: ActiveEffectHandle) -> usize {
        let mut touched = Vec::new();
        let mut removed = 0;
        for (name, attribute) in self.attributes.iter_mut() {
            let before = attribute.modifiers.len();
            attribute.modifiers.retain(|modifier| modifier.source != source);
            let count = before - attribute.modifiers.len();
            if count > 0 {
                removed += count;
                touched.push(name.clone());
            }
        }
        for name in touched {
            self.recompute(&name);
        }
        removed
    }

    /// Recomputes `attribute` and then, transitively, every attribute that depends on it.
    pub fn recompute(&mut self, attribute: &str) {
        // each attribute may be revisited a bounded number of times so dependency cycles terminate
        let limit = self.attributes.len() + 1;
        let mut visits: HashMap<String, usize> = HashMap::new();
        let mut queue = VecDeque::from([attribute.to_string()]);

        while let Some(name) = queue.pop_front() {
            let count = visits.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count > limit {
                log::warn!("Attribute dependency cycle through '{}'", name);
                continue;
            }

            if self.recompute_single(&name) || name == attribute {
                queue.extend(self.dependents_of(&name));
            }
        }
    }

    pub fn drain_changes(&mut self) -> Vec<AttributeChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    fn recompute_single(&mut self, name: &str) -> bool {
        let Some(attribute) = self.attributes.get(name) else {
            return false;
        };

        let raw = attribute.aggregate(|magnitude| self.resolve_magnitude(name, attribute, magnitude));
        let new = self.clamp(&attribute.bounds, raw);
        let old = attribute.current_value;

        if old == new {
            return false;
        }

        if let Some(attribute) = self.attributes.get_mut(name) {
            attribute.current_value = new;
        }
        self.changes.push(AttributeChange { attribute: name.to_string(), old, new });
        true
    }

    fn resolve_magnitude(&self, name: &str, attribute: &Attribute, magnitude: &ModifierMagnitude) -> f32 {
        match magnitude {
            ModifierMagnitude::Fixed(value) => *value,
            ModifierMagnitude::Live(live) => {
                let backing = if live.backing == name {
                    attribute.base_value
                } else {
                    self.value(&live.backing).unwrap_or(0.0)
                };
                live.evaluate(backing)
            }
        }
    }

    fn dependents_of(&self, name: &str) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(other, attribute)| other.as_str() != name && attribute.depends_on(name))
            .map(|(other, _)| other.clone())
            .collect()
    }

    fn resolve_bound(&self, bound: &Option<AttributeBound>) -> Option<f32> {
        match bound {
            Some(AttributeBound::Value(value)) => Some(*value),
            Some(AttributeBound::Attribute(name)) => self.value(name),
            None => None,
        }
    }

    fn clamp(&self, bounds: &AttributeBounds, value: f32) -> f32 {
        let mut value = value;
        if let Some(max) = self.resolve_bound(&bounds.max) {
            value = value.min(max);
        }
        if let Some(min) = self.resolve_bound(&bounds.min) {
            value = value.max(min);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::LiveMagnitude;

    fn modifier(source: u64, op: ModifierOp, value: f32) -> AttributeModifier {
        AttributeModifier {
            source: ActiveEffectHandle(source),
            op,
            magnitude: ModifierMagnitude::Fixed(value),
        }
    }

    #[test]
    fn test_remove_middle_modifier_has_no_drift() {
        let mut set = AttributeSet::new().with_attribute("MoveSpeed", 10.0);
        set.add_modifier("MoveSpeed", modifier(1, ModifierOp::Add, 20.0));
        set.add_modifier("MoveSpeed", modifier(2, ModifierOp::Multiply, 0.5));
        set.add_modifier("MoveSpeed", modifier(3, ModifierOp::Add, 20.0));
        assert_eq!(set.value("MoveSpeed"), Some(25.0));

        set.remove_modifiers_from(ActiveEffectHandle(2));
        assert_eq!(set.value("MoveSpeed"), Some(50.0));

        set.remove_modifiers_from(ActiveEffectHandle(3));
        set.remove_modifiers_from(ActiveEffectHandle(1));
        assert_eq!(set.value("MoveSpeed"), Some(10.0));
    }

    #[test]
    fn test_base_is_clamped_by_bounding_attribute() {
        let mut set = AttributeSet::new()
            .with_attribute("MaxHealth", 100.0)
            .with_bounded_attribute("Health", 100.0, AttributeBounds::capped_by("MaxHealth"));

        set.apply_to_base("Health", ModifierOp::Add, 50.0);
        assert_eq!(set.base_value("Health"), Some(100.0));

        set.apply_to_base("Health", ModifierOp::Add, -150.0);
        assert_eq!(set.value("Health"), Some(0.0));
    }

    #[test]
    fn test_lowering_max_reclamps_dependent() {
        let mut set = AttributeSet::new()
            .with_attribute("MaxHealth", 100.0)
            .with_bounded_attribute("Health", 100.0, AttributeBounds::capped_by("MaxHealth"));

        set.add_modifier("MaxHealth", modifier(1, ModifierOp::Multiply, 0.5));
        assert_eq!(set.value("Health"), Some(50.0));

        set.remove_modifiers_from(ActiveEffectHandle(1));
        assert_eq!(set.value("Health"), Some(100.0));
    }

    #[test]
    fn test_live_modifier_tracks_backing_attribute() {
        let mut set = AttributeSet::new()
            .with_attribute("MaxHealth", 100.0)
            .with_attribute("Shield", 0.0);

        let live = ModifierMagnitude::Live(LiveMagnitude {
            backing: "MaxHealth".to_string(),
            coefficient: 0.2,
            pre_add: 0.0,
            post_add: 0.0,
            scale: 1.0,
        });
        set.add_modifier(
            "Shield",
            AttributeModifier { source: ActiveEffectHandle(1), op: ModifierOp::Add, magnitude: live },
        );
        assert_eq!(set.value("Shield"), Some(20.0));

        set.set_base_value("MaxHealth", 200.0);
        assert_eq!(set.value("Shield"), Some(40.0));
    }

    #[test]
    fn test_changes_are_recorded_in_order() {
        let mut set = AttributeSet::new().with_attribute("Mana", 50.0);
        set.drain_changes();

        set.apply_to_base("Mana", ModifierOp::Add, -20.0);
        set.set_base_value("Mana", 30.0);

        let changes = set.drain_changes();
        assert_eq!(
            changes,
            vec![AttributeChange { attribute: "Mana".to_string(), old: 50.0, new: 30.0 }]
        );
        assert!(!set.has_pending_changes());
    }

    #[test]
    fn test_direct_current_write_is_replaced_by_recompute() {
        let mut set = AttributeSet::new().with_attribute("Armor", 10.0);
        set.modify_current_value("Armor", 5.0);
        assert_eq!(set.value("Armor"), Some(15.0));
        assert_eq!(set.base_value("Armor"), Some(10.0));

        set.recompute("Armor");
        assert_eq!(set.value("Armor"), Some(10.0));
    }

    #[test]
    fn test_spend_charges_the_current_value_under_multipliers() {
        let mut set = AttributeSet::new().with_attribute("Mana", 50.0);
        set.add_modifier("Mana", modifier(1, ModifierOp::Multiply, 2.0));
        assert_eq!(set.value("Mana"), Some(100.0));

        set.spend("Mana", 80.0);
        assert_eq!(set.value("Mana"), Some(20.0));
        assert_eq!(set.base_value("Mana"), Some(10.0));

        set.spend("Mana", 50.0);
        assert_eq!(set.value("Mana"), Some(0.0));
    }

    #[test]
    fn test_spend_under_override_charges_base() {
        let mut set = AttributeSet::new().with_attribute("Mana", 50.0);
        set.add_modifier("Mana", modifier(1, ModifierOp::Override, 30.0));
        set.spend("Mana", 20.0);
        assert_eq!(set.value("Mana"), Some(30.0));
        assert_eq!(set.base_value("Mana"), Some(30.0));
    }

    #[test]
    fn test_unknown_attribute_is_a_no_op() {
        let mut set = AttributeSet::new();
        assert!(!set.set_base_value("Nope", 1.0));
        assert!(!set.apply_to_base("Nope", ModifierOp::Add, 1.0));
        assert_eq!(set.value("Nope"), None);
    }
}
