use std::sync::Arc;

use bevy::prelude::Entity;

use crate::attribute_set::{AttributeSet, AttributeSnapshot};
use crate::effect::{DurationPolicy, EffectDefinition, EffectSpec};
use crate::magnitude::{CalculationContext, CaptureEnvironment};

/// Identifies one active effect on one hub. Never reused by that hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActiveEffectHandle(pub(crate) u64);

impl ActiveEffectHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveEffectState {
    Applying,
    Active,
    Removed,
}

/// Result of advancing one active effect by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EffectTick {
    pub executions: u32,
    pub expired: bool,
}

/// A live application of an [`EffectDefinition`] on the hub that owns it.
#[derive(Debug, Clone)]
pub struct ActiveEffect {
    pub(crate) handle: ActiveEffectHandle,
    pub(crate) spec: EffectSpec,
    pub(crate) state: ActiveEffectState,
    /// Seconds left; `-1.0` for infinite effects, `0.0` once consumed.
    pub(crate) remaining: f32,
    pub(crate) period_timer: f32,
    pub(crate) stack_count: u32,
    pub(crate) executions: u32,
    pub(crate) source: Option<Entity>,
    pub(crate) target: Option<Entity>,
    pub(crate) source_snapshot: Option<AttributeSnapshot>,
    pub(crate) target_snapshot: Option<AttributeSnapshot>,
}

impl ActiveEffect {
    pub(crate) fn new(
        handle: ActiveEffectHandle,
        spec: EffectSpec,
        source: Option<Entity>,
        target: Option<Entity>,
        source_snapshot: Option<AttributeSnapshot>,
        target_snapshot: Option<AttributeSnapshot>,
    ) -> Self {
        let remaining = match spec.definition.duration {
            DurationPolicy::Duration(seconds) => seconds,
            DurationPolicy::Infinite => -1.0,
            DurationPolicy::Instant => 0.0,
        };
        Self {
            handle,
            spec,
            state: ActiveEffectState::Applying,
            remaining,
            period_timer: 0.0,
            stack_count: 1,
            executions: 0,
            source,
            target,
            source_snapshot,
            target_snapshot,
        }
    }

    pub fn handle(&self) -> ActiveEffectHandle {
        self.handle
    }

    pub fn definition(&self) -> &Arc<EffectDefinition> {
        &self.spec.definition
    }

    pub fn spec(&self) -> &EffectSpec {
        &self.spec
    }

    pub fn state(&self) -> ActiveEffectState {
        self.state
    }

    pub fn level(&self) -> f32 {
        self.spec.level
    }

    /// Seconds left, or `None` for infinite effects.
    pub fn remaining_duration(&self) -> Option<f32> {
        match self.spec.definition.duration {
            DurationPolicy::Infinite => None,
            _ => Some(self.remaining),
        }
    }

    pub fn period_timer(&self) -> f32 {
        self.period_timer
    }

    pub fn stack_count(&self) -> u32 {
        self.stack_count
    }

    /// Number of periodic executions so far.
    pub fn executions(&self) -> u32 {
        self.executions
    }

    pub fn source(&self) -> Option<Entity> {
        self.source
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.spec.definition.duration, DurationPolicy::Infinite)
    }

    /// Multiplier applied to every magnitude of this effect.
    pub(crate) fn scale(&self) -> f32 {
        if self.spec.definition.is_stackable() {
            self.stack_count as f32
        } else {
            1.0
        }
    }

    pub(crate) fn environment(&self) -> CaptureEnvironment<'_> {
        CaptureEnvironment {
            source: self.source_snapshot.as_ref(),
            target_snapshot: self.target_snapshot.as_ref(),
            context: CalculationContext {
                level: self.spec.level,
                stack_count: self.stack_count,
                set_by_caller: &self.spec.set_by_caller,
                source: self.source,
                target: self.target,
            },
            scale: self.scale(),
        }
    }

    /// Refreshes the captured inputs from a new application of the same definition.
    pub(crate) fn recapture(
        &mut self,
        spec: EffectSpec,
        source: Option<Entity>,
        source_snapshot: Option<AttributeSnapshot>,
        target: &AttributeSet,
    ) {
        self.spec = spec;
        self.source = source;
        self.source_snapshot = source_snapshot;
        self.target_snapshot = Some(target.snapshot());
    }

    pub(crate) fn reset_duration(&mut self) {
        if let DurationPolicy::Duration(seconds) = self.spec.definition.duration {
            self.remaining = seconds;
        }
    }

    /// Advances timers by `dt` seconds.
    ///
    /// Periodic time is capped at the remaining duration, so a duration effect never
    /// executes past its own end.
    pub(crate) fn advance(&mut self, dt: f32, max_executions: u32) -> EffectTick {
        let infinite = self.is_infinite();
        let elapsed = if infinite { dt } else { dt.min(self.remaining.max(0.0)) };
        if !infinite {
            self.remaining = (self.remaining - dt).max(0.0);
        }

        let mut executions = 0;
        if let Some(periodicity) = self.spec.definition.period {
            self.period_timer += elapsed;
            while self.period_timer >= periodicity.period {
                if executions >= max_executions {
                    log::warn!(
                        "Effect '{}' hit the periodic execution cap ({}) in one tick",
                        self.spec.definition.name,
                        max_executions
                    );
                    self.period_timer %= periodicity.period;
                    break;
                }
                self.period_timer -= periodicity.period;
                executions += 1;
            }
        }
        self.executions += executions;

        EffectTick {
            executions,
            expired: !infinite && self.remaining <= 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(definition: EffectDefinition) -> ActiveEffect {
        let spec = EffectSpec::new(&Arc::new(definition), 1.0);
        ActiveEffect::new(ActiveEffectHandle(1), spec, None, None, None, None)
    }

    #[test]
    fn test_duration_counts_down_and_expires() {
        let mut effect = active(EffectDefinition::timed("Haste", 1.0));
        assert_eq!(effect.advance(0.5, 100), EffectTick { executions: 0, expired: false });
        assert_eq!(effect.remaining_duration(), Some(0.5));
        assert_eq!(effect.advance(0.75, 100), EffectTick { executions: 0, expired: true });
        assert_eq!(effect.remaining_duration(), Some(0.0));
    }

    #[test]
    fn test_periodic_duration_stops_at_its_end() {
        let mut effect = active(EffectDefinition::timed("Poison", 3.0).with_period(1.0));
        let tick = effect.advance(10.0, 100);
        assert_eq!(tick, EffectTick { executions: 3, expired: true });
    }

    #[test]
    fn test_infinite_never_expires() {
        let mut effect = active(EffectDefinition::infinite("Aura").with_period(0.5));
        let mut total = 0;
        for _ in 0..40 {
            let tick = effect.advance(0.25, 100);
            assert!(!tick.expired);
            total += tick.executions;
        }
        // 10 seconds at a 0.5 second period
        assert_eq!(total, 20);
        assert_eq!(effect.executions(), 20);
        assert_eq!(effect.remaining_duration(), None);
    }

    #[test]
    fn test_execution_cap_drops_backlog() {
        let mut effect = active(EffectDefinition::infinite("Flicker").with_period(0.25));
        let tick = effect.advance(10.0, 4);
        assert_eq!(tick.executions, 4);
        assert!(effect.period_timer() < 0.25);
    }
}
