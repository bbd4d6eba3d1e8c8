use bevy::{app::MainScheduleOrder, ecs::schedule::ScheduleLabel, prelude::*};

/// Runs after `PreUpdate`, so by `Update` every hub has been ticked for the frame and
/// its events are readable.
///
/// Systems that need to act before the tick (granting, applying setup effects) can be
/// added to this schedule `.before(tick_hubs)`.
pub fn plugin(app: &mut App) {
    app.init_schedule(AbilitySystemUpdate)
        .world_mut()
        .resource_mut::<MainScheduleOrder>()
        .insert_after(PreUpdate, AbilitySystemUpdate);
}

#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbilitySystemUpdate;
