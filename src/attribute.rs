use serde::{Deserialize, Serialize};

use crate::active_effect::ActiveEffectHandle;
use crate::modifiers::ModifierOp;

/// One side of an attribute's clamp range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeBound {
    Value(f32),
    /// The current value of another attribute in the same set, e.g. `Health <= MaxHealth`.
    Attribute(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeBounds {
    pub min: Option<AttributeBound>,
    pub max: Option<AttributeBound>,
}

impl AttributeBounds {
    pub fn new(min: Option<AttributeBound>, max: Option<AttributeBound>) -> Self {
        Self { min, max }
    }

    pub fn non_negative() -> Self {
        Self::new(Some(AttributeBound::Value(0.0)), None)
    }

    pub fn capped_by(attribute: impl Into<String>) -> Self {
        Self::new(
            Some(AttributeBound::Value(0.0)),
            Some(AttributeBound::Attribute(attribute.into())),
        )
    }

    pub(crate) fn references(&self, attribute: &str) -> bool {
        let refers = |bound: &Option<AttributeBound>| {
            matches!(bound, Some(AttributeBound::Attribute(name)) if name == attribute)
        };
        refers(&self.min) || refers(&self.max)
    }
}

/// A magnitude that tracks another attribute of the same set.
///
/// Evaluates as `((backing + pre_add) * coefficient + post_add) * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMagnitude {
    pub backing: String,
    pub coefficient: f32,
    pub pre_add: f32,
    pub post_add: f32,
    pub scale: f32,
}

impl LiveMagnitude {
    pub fn evaluate(&self, backing_value: f32) -> f32 {
        ((backing_value + self.pre_add) * self.coefficient + self.post_add) * self.scale
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModifierMagnitude {
    Fixed(f32),
    Live(LiveMagnitude),
}

/// A modifier currently held by an attribute on behalf of one active effect.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModifier {
    pub source: ActiveEffectHandle,
    pub op: ModifierOp,
    pub magnitude: ModifierMagnitude,
}

/// One numeric stat: a base value plus the current value derived from it.
///
/// The current value is always recomputed from scratch out of the base value and every
/// held modifier, never accumulated, so removing modifiers in any order cannot drift.
#[derive(Debug, Clone, Default)]
pub struct Attribute {
    pub(crate) base_value: f32,
    pub(crate) current_value: f32,
    pub(crate) bounds: AttributeBounds,
    pub(crate) modifiers: Vec<AttributeModifier>,
}

impl Attribute {
    pub fn new(base_value: f32) -> Self {
        Self {
            base_value,
            current_value: base_value,
            bounds: AttributeBounds::default(),
            modifiers: Vec::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: AttributeBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn base_value(&self) -> f32 {
        self.base_value
    }

    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn bounds(&self) -> &AttributeBounds {
        &self.bounds
    }

    /// Modifiers in application order.
    pub fn modifiers(&self) -> &[AttributeModifier] {
        &self.modifiers
    }

    pub(crate) fn depends_on(&self, attribute: &str) -> bool {
        self.bounds.references(attribute)
            || self.modifiers.iter().any(|modifier| {
                matches!(&modifier.magnitude, ModifierMagnitude::Live(live) if live.backing == attribute)
            })
    }

    /// Unclamped value of `(base + ΣAdd) × ΠMultiply`, or the most recently applied
    /// Override when one is held.
    pub(crate) fn aggregate(&self, mut resolve: impl FnMut(&ModifierMagnitude) -> f32) -> f32 {
        let mut added = 0.0;
        let mut multiplied = 1.0;
        let mut overridden = None;

        for modifier in self.modifiers.iter() {
            let value = resolve(&modifier.magnitude);
            match modifier.op {
                ModifierOp::Add => added += value,
                ModifierOp::Multiply => multiplied *= value,
                ModifierOp::Override => overridden = Some(value),
            }
        }

        overridden.unwrap_or((self.base_value + added) * multiplied)
    }

    /// Factor the base value is scaled by, or `None` while an Override hides it.
    pub(crate) fn base_factor(&self, mut resolve: impl FnMut(&ModifierMagnitude) -> f32) -> Option<f32> {
        let mut multiplied = 1.0;
        for modifier in self.modifiers.iter() {
            match modifier.op {
                ModifierOp::Add => {}
                ModifierOp::Multiply => multiplied *= resolve(&modifier.magnitude),
                ModifierOp::Override => return None,
            }
        }
        Some(multiplied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(source: u64, op: ModifierOp, value: f32) -> AttributeModifier {
        AttributeModifier {
            source: ActiveEffectHandle(source),
            op,
            magnitude: ModifierMagnitude::Fixed(value),
        }
    }

    fn aggregate(attribute: &Attribute) -> f32 {
        attribute.aggregate(|magnitude| match magnitude {
            ModifierMagnitude::Fixed(value) => *value,
            ModifierMagnitude::Live(_) => 0.0,
        })
    }

    #[test]
    fn test_add_then_multiply() {
        let mut speed = Attribute::new(10.0);
        speed.modifiers.push(fixed(1, ModifierOp::Add, 20.0));
        speed.modifiers.push(fixed(2, ModifierOp::Multiply, 0.5));
        speed.modifiers.push(fixed(3, ModifierOp::Add, 20.0));
        assert_eq!(aggregate(&speed), 25.0);
    }

    #[test]
    fn test_last_override_wins() {
        let mut speed = Attribute::new(10.0);
        speed.modifiers.push(fixed(1, ModifierOp::Override, 3.0));
        speed.modifiers.push(fixed(2, ModifierOp::Add, 5.0));
        speed.modifiers.push(fixed(3, ModifierOp::Override, 7.0));
        assert_eq!(aggregate(&speed), 7.0);
    }

    #[test]
    fn test_live_magnitude_formula() {
        let live = LiveMagnitude {
            backing: "MaxHealth".to_string(),
            coefficient: 0.5,
            pre_add: 10.0,
            post_add: 1.0,
            scale: 2.0,
        };
        // ((90 + 10) * 0.5 + 1) * 2
        assert_eq!(live.evaluate(90.0), 102.0);
    }
}
