pub mod ability;
pub mod activation;
pub mod active_effect;
pub mod attribute;
pub mod attribute_set;
pub mod behaviour;
pub mod behaviours;
pub mod collaborators;
pub mod config;
pub mod effect;
pub mod error;
pub mod events;
pub mod expressions;
pub mod hub;
pub mod hub_mutator;
pub mod magnitude;
pub mod modifiers;
pub mod prelude;
pub mod schedule;
pub mod systems;
pub mod tags;

use bevy::prelude::App;

/// Adds the `AbilitySystemUpdate` schedule, the hub events, the config resource and the
/// per-frame hub tick.
pub fn plugin(app: &mut App) {
    app.add_plugins((schedule::plugin, events::plugin, systems::plugin));
}
