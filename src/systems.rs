use bevy::prelude::*;

use crate::config::AbilitySystemConfig;
use crate::events::{AbilityActivated, ActiveEffectRemoved, AttributeChanged};
use crate::hub::AbilitySystemHub;
use crate::schedule::AbilitySystemUpdate;

/// Ticks every hub once with the scaled frame delta.
pub fn tick_hubs(time: Res<Time>, config: Res<AbilitySystemConfig>, mut hubs: Query<&mut AbilitySystemHub>) {
    if config.paused {
        return;
    }
    let dt = config.scaled_delta(time.delta_secs());
    for mut hub in hubs.iter_mut() {
        hub.tick(dt);
    }
}

/// Turns what each hub recorded this frame into events.
pub fn emit_hub_events(
    mut hubs: Query<(Entity, &mut AbilitySystemHub)>,
    mut attribute_changed: EventWriter<AttributeChanged>,
    mut ability_activated: EventWriter<AbilityActivated>,
    mut effect_removed: EventWriter<ActiveEffectRemoved>,
) {
    for (entity, mut hub) in hubs.iter_mut() {
        let notifications = hub.drain_notifications();
        if notifications.is_empty() {
            continue;
        }
        attribute_changed.write_batch(notifications.attribute_changes.into_iter().map(|change| {
            AttributeChanged { entity, attribute: change.attribute, old: change.old, new: change.new }
        }));
        ability_activated.write_batch(
            notifications
                .activations
                .into_iter()
                .map(|ability| AbilityActivated { entity, ability }),
        );
        effect_removed.write_batch(notifications.removed_effects.into_iter().map(|removed| {
            ActiveEffectRemoved { entity, handle: removed.handle, effect: removed.name }
        }));
    }
}

pub(crate) fn plugin(app: &mut App) {
    app.init_resource::<AbilitySystemConfig>()
        .add_systems(AbilitySystemUpdate, (tick_hubs, emit_hub_events).chain());
}
