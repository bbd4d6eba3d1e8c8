use bevy::prelude::*;

use crate::active_effect::ActiveEffectHandle;

/// An attribute's current value changed on `entity`.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct AttributeChanged {
    pub entity: Entity,
    pub attribute: String,
    pub old: f32,
    pub new: f32,
}

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct AbilityActivated {
    pub entity: Entity,
    pub ability: String,
}

/// An effect expired or was removed from `entity`'s hub.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct ActiveEffectRemoved {
    pub entity: Entity,
    pub handle: ActiveEffectHandle,
    pub effect: String,
}

pub(crate) fn plugin(app: &mut App) {
    app.add_event::<AttributeChanged>()
        .add_event::<AbilityActivated>()
        .add_event::<ActiveEffectRemoved>();
}
