use crate::rendering::{RenderSink, VisualHandle};
use log::{debug, warn};
use shared::{Color, Position, UserId};
use std::collections::HashMap;

/// Client-side record of one connected user
#[derive(Debug)]
pub struct Entity {
    pub id: UserId,
    pub position: Position,
    pub color: Color,
    handle: VisualHandle,
}

impl Entity {
    pub fn handle(&self) -> &VisualHandle {
        &self.handle
    }
}

/// Owns every known entity and keeps the render sink in step with it
///
/// All mutations go through methods taking the sink, so a visual exists
/// exactly as long as its entity does.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<UserId, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &UserId> {
        self.entities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Creates the entity and its visual; returns false if `id` already exists
    pub fn create<S: RenderSink + ?Sized>(
        &mut self,
        sink: &mut S,
        id: UserId,
        position: Position,
        color: Color,
    ) -> bool {
        if self.entities.contains_key(&id) {
            warn!("Entity {} already exists, not creating a duplicate", id);
            return false;
        }

        let handle = sink.create_entity_visual(&id, color);
        sink.set_position(&handle, position);
        debug!(
            "Created entity {} at ({:.2}, {:.2}, {:.2}) color {:06x}",
            id,
            position.x,
            position.y,
            position.z,
            color.rgb()
        );

        self.entities.insert(
            id.clone(),
            Entity {
                id,
                position,
                color,
                handle,
            },
        );
        true
    }

    pub fn set_position<S: RenderSink + ?Sized>(
        &mut self,
        sink: &mut S,
        id: &str,
        position: Position,
    ) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.position = position;
                sink.set_position(&entity.handle, position);
                true
            }
            None => false,
        }
    }

    /// Destroys the entity and releases its visual
    pub fn remove<S: RenderSink + ?Sized>(&mut self, sink: &mut S, id: &str) -> bool {
        match self.entities.remove(id) {
            Some(entity) => {
                debug!("Removed entity {}", entity.id);
                sink.remove_entity_visual(entity.handle);
                true
            }
            None => false,
        }
    }

    /// Removes every entity for which `keep` is false, returning their ids
    pub fn retain<S, F>(&mut self, sink: &mut S, mut keep: F) -> Vec<UserId>
    where
        S: RenderSink + ?Sized,
        F: FnMut(&UserId) -> bool,
    {
        let mut doomed: Vec<UserId> = self
            .entities
            .keys()
            .filter(|id| !keep(*id))
            .cloned()
            .collect();
        doomed.sort();

        for id in &doomed {
            self.remove(sink, id.as_str());
        }

        doomed
    }

    /// Tears down every entity, returning how many were released
    pub fn clear<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let count = self.entities.len();
        for (_, entity) in self.entities.drain() {
            sink.remove_entity_visual(entity.handle);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        next: u64,
        live: Vec<u64>,
        removed: Vec<u64>,
        positions: Vec<(u64, Position)>,
    }

    impl RenderSink for CountingSink {
        fn create_entity_visual(&mut self, _id: &UserId, _color: Color) -> VisualHandle {
            self.next += 1;
            self.live.push(self.next);
            VisualHandle::new(self.next)
        }

        fn set_position(&mut self, handle: &VisualHandle, position: Position) {
            self.positions.push((handle.raw(), position));
        }

        fn remove_entity_visual(&mut self, handle: VisualHandle) {
            self.live.retain(|raw| *raw != handle.raw());
            self.removed.push(handle.raw());
        }
    }

    fn spawn(registry: &mut EntityRegistry, sink: &mut CountingSink, id: &str) {
        registry.create(sink, UserId::from(id), Position::new(0.0, 0.5, 0.0), Color::default());
    }

    #[test]
    fn test_create_registers_visual_at_position() {
        let mut registry = EntityRegistry::new();
        let mut sink = CountingSink::default();

        assert!(registry.create(
            &mut sink,
            UserId::from("u1"),
            Position::new(1.0, 0.5, 0.0),
            Color::new(0xFFFF00)
        ));

        let entity = registry.get("u1").unwrap();
        assert_eq!(entity.position, Position::new(1.0, 0.5, 0.0));
        assert_eq!(entity.color.rgb(), 0xFFFF00);
        assert_eq!(sink.live, vec![entity.handle().raw()]);
        assert_eq!(sink.positions, vec![(1, Position::new(1.0, 0.5, 0.0))]);
    }

    #[test]
    fn test_create_refuses_duplicates() {
        let mut registry = EntityRegistry::new();
        let mut sink = CountingSink::default();

        spawn(&mut registry, &mut sink, "u1");
        assert!(!registry.create(
            &mut sink,
            UserId::from("u1"),
            Position::default(),
            Color::default()
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(sink.live.len(), 1);
    }

    #[test]
    fn test_set_position_updates_entity_and_visual() {
        let mut registry = EntityRegistry::new();
        let mut sink = CountingSink::default();
        spawn(&mut registry, &mut sink, "u1");

        assert!(registry.set_position(&mut sink, "u1", Position::new(3.0, 0.5, 1.0)));
        assert!(!registry.set_position(&mut sink, "ghost", Position::default()));

        assert_eq!(registry.get("u1").unwrap().position, Position::new(3.0, 0.5, 1.0));
        assert_eq!(sink.positions.last(), Some(&(1, Position::new(3.0, 0.5, 1.0))));
    }

    #[test]
    fn test_retain_releases_each_handle_once() {
        let mut registry = EntityRegistry::new();
        let mut sink = CountingSink::default();
        for id in ["a", "b", "c"] {
            spawn(&mut registry, &mut sink, id);
        }

        let removed = registry.retain(&mut sink, |id| id.as_str() == "b");

        assert_eq!(removed, vec![UserId::from("a"), UserId::from("c")]);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![&UserId::from("b")]);
        assert_eq!(sink.removed.len(), 2);
        assert_eq!(sink.live.len(), 1);

        assert!(!registry.remove(&mut sink, "a"));
        assert_eq!(sink.removed.len(), 2);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry = EntityRegistry::new();
        let mut sink = CountingSink::default();
        spawn(&mut registry, &mut sink, "a");
        spawn(&mut registry, &mut sink, "b");

        assert_eq!(registry.clear(&mut sink), 2);
        assert!(registry.is_empty());
        assert!(sink.live.is_empty());
        assert_eq!(sink.removed.len(), 2);
    }
}
