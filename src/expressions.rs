use evalexpr::{Context, ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node, Value};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// A compiled arithmetic expression used by level curves and formula calculations.
///
/// Expressions are defined as strings (e.g., `"Attack@Source * 1.5 - Armor@Target"`) and
/// compiled once. Identifiers are resolved at evaluation time; any identifier the caller
/// does not provide evaluates as `0.0`.
///
/// Serializes as its source string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    pub(crate) definition: String,
    pub(crate) compiled: Node<DefaultNumericTypes>,
}

impl Expression {
    /// Creates a new `Expression` by parsing and compiling an expression string.
    ///
    /// Returns `Err(HubError::InvalidExpression)` if the string does not parse.
    pub fn new(expression: &str) -> HubResult<Self> {
        let compiled = evalexpr::build_operator_tree::<DefaultNumericTypes>(expression)
            .map_err(|err| HubError::InvalidExpression {
                expression: expression.to_string(),
                details: err.to_string(),
            })?;

        Ok(Self {
            definition: expression.to_string(),
            compiled,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Identifiers referenced by this expression, in source order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.compiled.iter_variable_identifiers()
    }

    pub fn evaluate(&self, context: &HashMapContext) -> f32 {
        self.try_evaluate(context).unwrap_or_else(|error| {
            log::warn!("{}", error);
            0.0
        })
    }

    /// Evaluates with every identifier resolved through `resolve`.
    pub fn evaluate_with(&self, resolve: impl FnMut(&str) -> f32) -> f32 {
        self.try_evaluate_with(resolve).unwrap_or_else(|error| {
            log::warn!("{}", error);
            0.0
        })
    }

    /// Fallible form of [`evaluate_with`](Self::evaluate_with).
    pub fn try_evaluate_with(&self, mut resolve: impl FnMut(&str) -> f32) -> HubResult<f32> {
        let mut context = HashMapContext::<DefaultNumericTypes>::new();
        for var_name in self.compiled.iter_variable_identifiers() {
            let value = resolve(var_name) as f64;
            context
                .set_value(var_name.to_string(), Value::Float(value))
                .map_err(|e| self.invalid(e))?;
        }
        self.eval(&context)
    }

    /// Fallible evaluation that uses the compiled expression without reparsing.
    ///
    /// Identifiers missing from `base_context` are filled with `0.0`.
    pub(crate) fn try_evaluate(&self, base_context: &HashMapContext) -> HubResult<f32> {
        let missing: Vec<&str> = self
            .compiled
            .iter_variable_identifiers()
            .filter(|var_name| base_context.get_value(var_name).is_none())
            .collect();
        if missing.is_empty() {
            return self.eval(base_context);
        }

        let mut context = base_context.clone();
        for var_name in missing {
            context
                .set_value(var_name.to_string(), Value::Float(0.0))
                .map_err(|e| self.invalid(e))?;
        }
        self.eval(&context)
    }

    fn eval(&self, context: &HashMapContext) -> HubResult<f32> {
        let eval_value = self.compiled.eval_with_context(context).map_err(|e| self.invalid(e))?;
        Ok(eval_value.as_number().unwrap_or(0.0) as f32)
    }

    fn invalid(&self, error: impl std::fmt::Display) -> HubError {
        HubError::InvalidExpression {
            expression: self.definition.clone(),
            details: error.to_string(),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl TryFrom<String> for Expression {
    type Error = HubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Expression::new(&value)
    }
}

impl From<Expression> for String {
    fn from(value: Expression) -> Self {
        value.definition
    }
}
