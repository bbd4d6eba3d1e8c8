use std::hint::black_box;
use std::sync::Arc;

use bevy::prelude::*;
use bevy_gameplay_hub::prelude::*;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn hub() -> AbilitySystemHub {
    let logic = Arc::new(AbilityActivationLogic::new(Arc::new(BehaviourRegistry::new())));
    let mut hub = AbilitySystemHub::new(logic);
    hub.init_owner(Arc::new(StaticOwner::new(Entity::from_raw(1), Vec3::ZERO)));
    hub.initialize_attribute_set(
        AttributeSet::new()
            .with_attribute("MaxHealth", 1000.0)
            .with_bounded_attribute("Health", 1000.0, AttributeBounds::capped_by("MaxHealth"))
            .with_attribute("Regen", 0.0),
    );
    hub
}

fn effects(count: usize) -> Vec<Arc<EffectDefinition>> {
    (0..count)
        .map(|i| {
            let modifier = match i % 3 {
                0 => ModifierInfo::add("MaxHealth", 10.0),
                1 => ModifierInfo::multiply("MaxHealth", 1.01),
                _ => ModifierInfo::add(
                    "Regen",
                    AttributeBasedFloat::new("MaxHealth", AttributeCapture::Target, 0.01),
                ),
            };
            Arc::new(EffectDefinition::infinite(format!("Effect{}", i)).with_modifier(modifier))
        })
        .collect()
}

fn bench_apply_and_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_and_remove");
    for count in [8usize, 64, 256] {
        let definitions = effects(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &definitions, |b, definitions| {
            b.iter(|| {
                let mut hub = hub();
                let handles: Vec<_> = definitions
                    .iter()
                    .filter_map(|definition| hub.apply_effect_to_self(definition, 1.0).handle())
                    .collect();
                for handle in handles.iter().rev() {
                    hub.remove_effect(*handle);
                }
                black_box(hub.attribute("Regen"))
            });
        });
    }
    group.finish();
}

fn bench_periodic_tick(c: &mut Criterion) {
    let poison = Arc::new(
        EffectDefinition::infinite("Poison")
            .with_period(0.1)
            .with_modifier(ModifierInfo::add("Health", -1.0))
            .stackable(None),
    );
    let mut hub = hub();
    for definition in effects(64) {
        hub.apply_effect_to_self(&definition, 1.0);
    }
    for _ in 0..5 {
        hub.apply_effect_to_self(&poison, 1.0);
    }

    c.bench_function("tick_with_live_dependencies", |b| {
        b.iter(|| {
            hub.tick(black_box(0.1));
            black_box(hub.attribute("Health"))
        });
    });
}

criterion_group!(benches, bench_apply_and_remove, bench_periodic_tick);
criterion_main!(benches);
