pub use crate::ability::{AbilityCost, AbilityDefinition, AbilitySpec, EndPolicy};
pub use crate::activation::{AbilityActivationLogic, ActivationFailure};
pub use crate::active_effect::{ActiveEffect, ActiveEffectHandle, ActiveEffectState};
pub use crate::attribute::{Attribute, AttributeBound, AttributeBounds};
pub use crate::attribute_set::{AttributeChange, AttributeSet, AttributeSnapshot};
pub use crate::behaviour::{Behaviour, BehaviourContext, BehaviourRegistry};
pub use crate::behaviours::{
    AppliedEffects, ApplyEffectsBehaviour, FnBehaviour, NoopBehaviour, TargetInRangeBehaviour,
};
pub use crate::collaborators::{OwnerIdentity, PointCloud, SpatialQuery, StaticOwner};
pub use crate::config::{AbilitySystemConfig, HubSettings};
pub use crate::effect::{
    DurationPolicy, EffectApplication, EffectDefinition, EffectRejection, EffectSpec, Periodicity,
    StackDurationRefresh, StackingPolicy,
};
pub use crate::error::{HubError, HubResult};
pub use crate::events::{AbilityActivated, ActiveEffectRemoved, AttributeChanged};
pub use crate::expressions::Expression;
pub use crate::hub::{AbilitySystemHub, HubNotifications, RemovedEffect};
pub use crate::hub_mutator::HubMutator;
pub use crate::magnitude::{
    AttributeBasedFloat, AttributeCapture, CalculationContext, CustomCalculation, ExpressionCalculation,
    LevelCurve, MagnitudeCalculation, ScalableFloat, SetByCallerFloat,
};
pub use crate::modifiers::{ModifierInfo, ModifierOp};
pub use crate::schedule::AbilitySystemUpdate;
pub use crate::systems::{emit_hub_events, tick_hubs};
pub use crate::tags::{GameplayTag, TagContainer, TagCountMap};
