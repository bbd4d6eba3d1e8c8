use std::fmt::Debug;
use std::sync::Arc;

use bevy::platform::collections::HashMap;
use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::attribute::{LiveMagnitude, ModifierMagnitude};
use crate::attribute_set::{AttributeSet, AttributeSnapshot};
use crate::expressions::Expression;
use crate::tags::GameplayTag;

/// Scales a value by level, either through a table or an expression of `Level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LevelCurve {
    /// Entry `i` is the value at level `i + 1`; levels between entries interpolate
    /// linearly, levels past either end clamp.
    Table(Vec<f32>),
    Expression(Expression),
}

impl LevelCurve {
    pub fn evaluate(&self, level: f32) -> f32 {
        match self {
            LevelCurve::Table(points) => {
                let Some(last) = points.last() else {
                    return 1.0;
                };
                let position = (level - 1.0).max(0.0);
                if position >= (points.len() - 1) as f32 {
                    return *last;
                }
                let index = position.floor() as usize;
                let t = position - index as f32;
                points[index] + (points[index + 1] - points[index]) * t
            }
            LevelCurve::Expression(expression) => {
                expression.evaluate_with(|name| if name == "Level" { level } else { 0.0 })
            }
        }
    }
}

/// A constant, optionally multiplied by a level curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalableFloat {
    pub value: f32,
    #[serde(default)]
    pub curve: Option<LevelCurve>,
}

impl ScalableFloat {
    pub fn new(value: f32) -> Self {
        Self { value, curve: None }
    }

    pub fn with_curve(mut self, curve: LevelCurve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn evaluate(&self, level: f32) -> f32 {
        match &self.curve {
            Some(curve) => self.value * curve.evaluate(level),
            None => self.value,
        }
    }
}

impl From<f32> for ScalableFloat {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeCapture {
    Source,
    Target,
}

/// `(backing + pre_multiply_add) * coefficient + post_multiply_add`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBasedFloat {
    pub backing_attribute: String,
    pub capture: AttributeCapture,
    /// Captures the backing value once at application. When false, target-backed
    /// magnitudes follow the live backing attribute for as long as the modifier is held.
    /// Source captures always read the snapshot taken at application, whatever this says.
    #[serde(default)]
    pub snapshot: bool,
    pub coefficient: f32,
    #[serde(default)]
    pub pre_multiply_add: f32,
    #[serde(default)]
    pub post_multiply_add: f32,
}

impl AttributeBasedFloat {
    pub fn new(backing_attribute: impl Into<String>, capture: AttributeCapture, coefficient: f32) -> Self {
        Self {
            backing_attribute: backing_attribute.into(),
            capture,
            snapshot: false,
            coefficient,
            pre_multiply_add: 0.0,
            post_multiply_add: 0.0,
        }
    }

    pub fn snapshotted(mut self) -> Self {
        self.snapshot = true;
        self
    }

    pub fn with_adds(mut self, pre_multiply_add: f32, post_multiply_add: f32) -> Self {
        self.pre_multiply_add = pre_multiply_add;
        self.post_multiply_add = post_multiply_add;
        self
    }

    pub fn evaluate(&self, raw: f32) -> f32 {
        (raw + self.pre_multiply_add) * self.coefficient + self.post_multiply_add
    }
}

/// A magnitude handed in by the caller at application time, keyed by tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetByCallerFloat {
    pub tag: GameplayTag,
    pub coefficient: f32,
}

impl SetByCallerFloat {
    pub fn new(tag: impl Into<GameplayTag>, coefficient: f32) -> Self {
        Self { tag: tag.into(), coefficient }
    }
}

/// Everything a calculation may read besides attributes.
#[derive(Debug, Clone, Copy)]
pub struct CalculationContext<'a> {
    pub level: f32,
    pub stack_count: u32,
    pub set_by_caller: &'a HashMap<GameplayTag, f32>,
    pub source: Option<Entity>,
    pub target: Option<Entity>,
}

/// A formula too involved for the built-in magnitude kinds, e.g. armour mitigation.
pub trait CustomCalculation: Send + Sync + Debug {
    fn calculate(
        &self,
        source: Option<&AttributeSnapshot>,
        target: &AttributeSet,
        context: &CalculationContext,
    ) -> f32;
}

/// A custom calculation written as an expression.
///
/// Identifiers: `Attr@Source` reads the source snapshot, `Attr@Target` or a bare `Attr`
/// reads the target, `Level` and `Stacks` read the context, and `SetByCaller@Tag.Name`
/// reads a caller-supplied value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionCalculation(pub Expression);

impl ExpressionCalculation {
    pub fn new(expression: Expression) -> Self {
        Self(expression)
    }
}

impl CustomCalculation for ExpressionCalculation {
    fn calculate(
        &self,
        source: Option<&AttributeSnapshot>,
        target: &AttributeSet,
        context: &CalculationContext,
    ) -> f32 {
        self.0.evaluate_with(|name| {
            if name == "Level" {
                return context.level;
            }
            if name == "Stacks" {
                return context.stack_count as f32;
            }
            if let Some(tag) = name.strip_prefix("SetByCaller@") {
                return context.set_by_caller.get(&GameplayTag::from(tag)).copied().unwrap_or(0.0);
            }
            if let Some(attribute) = name.strip_suffix("@Source") {
                return source.and_then(|snapshot| snapshot.get(attribute)).unwrap_or(0.0);
            }
            let attribute = name.strip_suffix("@Target").unwrap_or(name);
            target.value(attribute).unwrap_or(0.0)
        })
    }
}

/// How a modifier computes its magnitude before stack scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MagnitudeCalculation {
    ScalableFloat(ScalableFloat),
    AttributeBased(AttributeBasedFloat),
    SetByCaller(SetByCallerFloat),
    Expression(ExpressionCalculation),
    #[serde(skip)]
    Custom(Arc<dyn CustomCalculation>),
}

impl From<f32> for MagnitudeCalculation {
    fn from(value: f32) -> Self {
        Self::ScalableFloat(ScalableFloat::new(value))
    }
}

impl From<ScalableFloat> for MagnitudeCalculation {
    fn from(value: ScalableFloat) -> Self {
        Self::ScalableFloat(value)
    }
}

impl From<AttributeBasedFloat> for MagnitudeCalculation {
    fn from(value: AttributeBasedFloat) -> Self {
        Self::AttributeBased(value)
    }
}

impl From<SetByCallerFloat> for MagnitudeCalculation {
    fn from(value: SetByCallerFloat) -> Self {
        Self::SetByCaller(value)
    }
}

impl From<ExpressionCalculation> for MagnitudeCalculation {
    fn from(value: ExpressionCalculation) -> Self {
        Self::Expression(value)
    }
}

/// Values captured when an effect is applied, used for every later evaluation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CaptureEnvironment<'a> {
    pub source: Option<&'a AttributeSnapshot>,
    pub target_snapshot: Option<&'a AttributeSnapshot>,
    pub context: CalculationContext<'a>,
    pub scale: f32,
}

impl MagnitudeCalculation {
    /// Computes the (stack-scaled) magnitude.
    ///
    /// `persistent` asks for a magnitude that an attribute will hold; target-backed
    /// non-snapshot magnitudes then stay live instead of being read once.
    pub(crate) fn resolve(
        &self,
        target: &AttributeSet,
        env: &CaptureEnvironment,
        persistent: bool,
    ) -> ModifierMagnitude {
        let context = &env.context;
        let value = match self {
            MagnitudeCalculation::ScalableFloat(scalable) => scalable.evaluate(context.level),
            MagnitudeCalculation::AttributeBased(based) => {
                let raw = match (based.capture, based.snapshot) {
                    (AttributeCapture::Source, _) => {
                        env.source.and_then(|snapshot| snapshot.get(&based.backing_attribute))
                    }
                    (AttributeCapture::Target, true) => env
                        .target_snapshot
                        .and_then(|snapshot| snapshot.get(&based.backing_attribute))
                        .or_else(|| target.value(&based.backing_attribute)),
                    (AttributeCapture::Target, false) if persistent => {
                        return ModifierMagnitude::Live(LiveMagnitude {
                            backing: based.backing_attribute.clone(),
                            coefficient: based.coefficient,
                            pre_add: based.pre_multiply_add,
                            post_add: based.post_multiply_add,
                            scale: env.scale,
                        });
                    }
                    (AttributeCapture::Target, false) => target.value(&based.backing_attribute),
                };
                let raw = raw.unwrap_or_else(|| {
                    log::warn!(
                        "Backing attribute '{}' unavailable on {:?}; using 0",
                        based.backing_attribute,
                        based.capture
                    );
                    0.0
                });
                based.evaluate(raw)
            }
            MagnitudeCalculation::SetByCaller(by_caller) => {
                let supplied = context.set_by_caller.get(&by_caller.tag).copied().unwrap_or_else(|| {
                    log::warn!("No set-by-caller magnitude supplied for '{}'; using 0", by_caller.tag);
                    0.0
                });
                supplied * by_caller.coefficient
            }
            MagnitudeCalculation::Expression(expression) => expression.calculate(env.source, target, context),
            MagnitudeCalculation::Custom(custom) => custom.calculate(env.source, target, context),
        };
        ModifierMagnitude::Fixed(value * env.scale)
    }

    /// Resolves to a plain number, reading live attributes once.
    pub(crate) fn resolve_value(&self, target: &AttributeSet, env: &CaptureEnvironment) -> f32 {
        match self.resolve(target, env, false) {
            ModifierMagnitude::Fixed(value) => value,
            ModifierMagnitude::Live(live) => {
                let backing = target.value(&live.backing).unwrap_or(0.0);
                live.evaluate(backing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(
        source: Option<&'a AttributeSnapshot>,
        target_snapshot: Option<&'a AttributeSnapshot>,
        set_by_caller: &'a HashMap<GameplayTag, f32>,
        scale: f32,
    ) -> CaptureEnvironment<'a> {
        CaptureEnvironment {
            source,
            target_snapshot,
            context: CalculationContext {
                level: 1.0,
                stack_count: 1,
                set_by_caller,
                source: None,
                target: None,
            },
            scale,
        }
    }

    #[test]
    fn test_table_curve_interpolates_and_clamps() {
        let curve = LevelCurve::Table(vec![1.0, 2.0, 4.0]);
        assert_eq!(curve.evaluate(1.0), 1.0);
        assert_eq!(curve.evaluate(1.5), 1.5);
        assert_eq!(curve.evaluate(3.0), 4.0);
        assert_eq!(curve.evaluate(10.0), 4.0);
        assert_eq!(curve.evaluate(0.0), 1.0);
    }

    #[test]
    fn test_table_curve_clamps_huge_levels() {
        let curve = LevelCurve::Table(vec![1.0, 2.0]);
        assert_eq!(curve.evaluate(f32::MAX), 2.0);
        assert_eq!(curve.evaluate(f32::INFINITY), 2.0);
        assert_eq!(LevelCurve::Table(vec![3.0]).evaluate(5.0), 3.0);
    }

    #[test]
    fn test_expression_curve() {
        let scalable = ScalableFloat::new(10.0)
            .with_curve(LevelCurve::Expression(Expression::new("1.0 + (Level - 1.0) * 0.5").unwrap()));
        assert_eq!(scalable.evaluate(1.0), 10.0);
        assert_eq!(scalable.evaluate(3.0), 20.0);
    }

    #[test]
    fn test_attribute_based_reads_source_snapshot() {
        let source = AttributeSet::new().with_attribute("Attack", 40.0).snapshot();
        let target = AttributeSet::new();
        let by_caller = HashMap::new();
        let calc: MagnitudeCalculation =
            AttributeBasedFloat::new("Attack", AttributeCapture::Source, 0.5).with_adds(10.0, 2.0).into();

        let value = calc.resolve_value(&target, &env(Some(&source), None, &by_caller, 1.0));
        assert_eq!(value, 27.0);
    }

    #[test]
    fn test_live_target_magnitude_for_persistent_modifiers() {
        let target = AttributeSet::new().with_attribute("MaxHealth", 100.0);
        let by_caller = HashMap::new();
        let calc: MagnitudeCalculation =
            AttributeBasedFloat::new("MaxHealth", AttributeCapture::Target, 0.1).into();

        let resolved = calc.resolve(&target, &env(None, None, &by_caller, 2.0), true);
        let ModifierMagnitude::Live(live) = resolved else {
            panic!("expected a live magnitude");
        };
        assert_eq!(live.scale, 2.0);
        assert_eq!(live.evaluate(100.0), 20.0);
    }

    #[test]
    fn test_set_by_caller_scales_supplied_value() {
        let target = AttributeSet::new();
        let mut by_caller = HashMap::new();
        by_caller.insert(GameplayTag::new("Data.Damage"), 80.0);
        let calc: MagnitudeCalculation = SetByCallerFloat::new("Data.Damage", 0.25).into();

        assert_eq!(calc.resolve_value(&target, &env(None, None, &by_caller, 1.0)), 20.0);

        let missing: MagnitudeCalculation = SetByCallerFloat::new("Data.Missing", 1.0).into();
        assert_eq!(missing.resolve_value(&target, &env(None, None, &by_caller, 1.0)), 0.0);
    }

    #[test]
    fn test_expression_calculation_reads_both_sides() {
        let source = AttributeSet::new().with_attribute("Attack", 50.0).snapshot();
        let target = AttributeSet::new().with_attribute("Armor", 25.0);
        let by_caller = HashMap::new();
        let calc: MagnitudeCalculation = ExpressionCalculation::new(
            Expression::new("-(Attack@Source * 100.0 / (100.0 + Armor@Target))").unwrap(),
        )
        .into();

        assert_eq!(calc.resolve_value(&target, &env(Some(&source), None, &by_caller, 1.0)), -40.0);
    }
}
