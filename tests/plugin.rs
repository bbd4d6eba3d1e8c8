use std::sync::Arc;
use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_gameplay_hub::prelude::*;

#[derive(Resource, Default)]
struct Seen {
    changes: Vec<AttributeChanged>,
    activations: Vec<AbilityActivated>,
    removed: Vec<ActiveEffectRemoved>,
}

fn collect(
    mut seen: ResMut<Seen>,
    mut changes: EventReader<AttributeChanged>,
    mut activations: EventReader<AbilityActivated>,
    mut removed: EventReader<ActiveEffectRemoved>,
) {
    seen.changes.extend(changes.read().cloned());
    seen.activations.extend(activations.read().cloned());
    seen.removed.extend(removed.read().cloned());
}

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(bevy_gameplay_hub::plugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(125)))
        .init_resource::<Seen>()
        .add_systems(Update, collect);
    // the first frame only starts the clock
    app.update();
    app
}

fn logic() -> Arc<AbilityActivationLogic> {
    let mut registry = BehaviourRegistry::new();
    registry.register("Noop", Arc::new(NoopBehaviour)).unwrap();
    Arc::new(AbilityActivationLogic::new(Arc::new(registry)))
}

fn spawn_hub(app: &mut App, attributes: AttributeSet) -> Entity {
    let entity = app.world_mut().spawn_empty().id();
    let mut hub = AbilitySystemHub::new(logic());
    hub.init_owner(Arc::new(StaticOwner::new(entity, Vec3::ZERO)));
    hub.initialize_attribute_set(attributes);
    app.world_mut().entity_mut(entity).insert(hub);
    entity
}

fn hub(app: &App, entity: Entity) -> &AbilitySystemHub {
    app.world().get::<AbilitySystemHub>(entity).unwrap()
}

#[test]
fn hubs_are_ticked_every_frame() {
    let mut app = app();
    let entity = spawn_hub(&mut app, AttributeSet::new().with_attribute("Health", 100.0));
    let poison = Arc::new(
        EffectDefinition::timed("Poison", 1.0)
            .with_period(0.5)
            .with_modifier(ModifierInfo::add("Health", -5.0)),
    );
    let handle = app
        .world_mut()
        .get_mut::<AbilitySystemHub>(entity)
        .unwrap()
        .apply_effect_to_self(&poison, 1.0)
        .handle()
        .unwrap();

    for _ in 0..8 {
        app.update();
    }

    assert_eq!(hub(&app, entity).attribute("Health"), Some(90.0));
    assert!(hub(&app, entity).active_effects().is_empty());

    let seen = app.world().resource::<Seen>();
    let health: Vec<(f32, f32)> = seen.changes.iter().map(|change| (change.old, change.new)).collect();
    assert_eq!(health, vec![(100.0, 95.0), (95.0, 90.0)]);
    assert_eq!(
        seen.removed,
        vec![ActiveEffectRemoved { entity, handle, effect: "Poison".to_string() }]
    );
}

#[test]
fn pausing_and_time_scale() {
    let mut app = app();
    let entity = spawn_hub(&mut app, AttributeSet::new().with_attribute("Health", 100.0));
    {
        let mut hub = app.world_mut().get_mut::<AbilitySystemHub>(entity).unwrap();
        hub.start_cooldown("Dash", 1.0);
    }

    app.world_mut().resource_mut::<AbilitySystemConfig>().paused = true;
    for _ in 0..4 {
        app.update();
    }
    assert_eq!(hub(&app, entity).get_ability_cooldown_remaining("Dash"), 1.0);

    *app.world_mut().resource_mut::<AbilitySystemConfig>() = AbilitySystemConfig { time_scale: 2.0, paused: false };
    app.update();
    assert_eq!(hub(&app, entity).get_ability_cooldown_remaining("Dash"), 0.75);
}

#[test]
fn hub_mutator_applies_across_entities() {
    let mut app = app();
    let attacker = spawn_hub(&mut app, AttributeSet::new().with_attribute("Attack", 30.0));
    let defender = spawn_hub(&mut app, AttributeSet::new().with_attribute("Health", 100.0));
    let strike = Arc::new(EffectDefinition::instant("Strike").with_modifier(ModifierInfo::add(
        "Health",
        AttributeBasedFloat::new("Attack", AttributeCapture::Source, -1.0),
    )));

    let result = app
        .world_mut()
        .run_system_once(move |mut hubs: HubMutator| {
            let strike_result = hubs.apply_effect(attacker, defender, &strike, 1.0);
            let self_result = hubs.apply_effect(attacker, attacker, &strike, 1.0);
            (strike_result, self_result, hubs.attribute(defender, "Health"))
        })
        .unwrap();

    assert_eq!(result.0, EffectApplication::Executed);
    // the attacker has no Health attribute; the modifier is skipped
    assert_eq!(result.1, EffectApplication::Executed);
    assert_eq!(result.2, Some(70.0));
}

#[test]
fn activations_become_events() {
    let mut app = app();
    let entity = spawn_hub(&mut app, AttributeSet::new().with_attribute("Mana", 10.0));
    let nova = Arc::new(AbilityDefinition::new("Nova", "Noop").with_cost("Mana", 4.0));
    app.world_mut()
        .get_mut::<AbilitySystemHub>(entity)
        .unwrap()
        .give_ability(&nova, 1);

    let outcome = app
        .world_mut()
        .run_system_once(move |mut hubs: HubMutator| {
            (hubs.try_activate(entity, "Nova"), hubs.try_activate(Entity::from_raw(999), "Nova"))
        })
        .unwrap();
    assert_eq!(outcome, (Ok(()), Err(ActivationFailure::NotGranted)));

    app.update();
    let seen = app.world().resource::<Seen>();
    assert_eq!(seen.activations, vec![AbilityActivated { entity, ability: "Nova".to_string() }]);
    assert_eq!(seen.changes.last().map(|change| change.new), Some(6.0));
}
