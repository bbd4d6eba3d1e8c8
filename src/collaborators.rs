use bevy::prelude::{Entity, Vec3};

/// Who owns a hub, as seen by behaviours.
pub trait OwnerIdentity: Send + Sync {
    fn entity(&self) -> Entity;

    fn position(&self) -> Vec3;
}

/// Minimal spatial lookup used by targeting behaviours.
pub trait SpatialQuery: Send + Sync {
    /// The closest entity within `radius` of `position`, excluding `exclude`.
    fn closest_in_range(&self, position: Vec3, radius: f32, exclude: Option<Entity>) -> Option<Entity>;
}

/// An owner fixed at one entity and position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticOwner {
    pub entity: Entity,
    pub position: Vec3,
}

impl StaticOwner {
    pub fn new(entity: Entity, position: Vec3) -> Self {
        Self { entity, position }
    }
}

impl OwnerIdentity for StaticOwner {
    fn entity(&self) -> Entity {
        self.entity
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Linear scan over a fixed list of positioned entities.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<(Entity, Vec3)>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(mut self, entity: Entity, position: Vec3) -> Self {
        self.points.push((entity, position));
        self
    }

    pub fn insert(&mut self, entity: Entity, position: Vec3) {
        self.points.retain(|(existing, _)| *existing != entity);
        self.points.push((entity, position));
    }
}

impl SpatialQuery for PointCloud {
    fn closest_in_range(&self, position: Vec3, radius: f32, exclude: Option<Entity>) -> Option<Entity> {
        let radius_squared = radius * radius;
        self.points
            .iter()
            .filter(|(entity, _)| Some(*entity) != exclude)
            .map(|(entity, point)| (*entity, point.distance_squared(position)))
            .filter(|(_, distance)| *distance <= radius_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entity, _)| entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_in_range_skips_excluded_and_far_points() {
        let me = Entity::from_raw(1);
        let near = Entity::from_raw(2);
        let far = Entity::from_raw(3);
        let cloud = PointCloud::new()
            .with_point(me, Vec3::ZERO)
            .with_point(near, Vec3::new(3.0, 0.0, 0.0))
            .with_point(far, Vec3::new(30.0, 0.0, 0.0));

        assert_eq!(cloud.closest_in_range(Vec3::ZERO, 5.0, Some(me)), Some(near));
        assert_eq!(cloud.closest_in_range(Vec3::ZERO, 2.0, Some(me)), None);
        assert_eq!(cloud.closest_in_range(Vec3::ZERO, 5.0, None), Some(me));
    }
}
