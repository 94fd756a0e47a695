use std::collections::HashSet;

use tether_shared::EntityRef;

/// The double-buffered visible-entity set of one connection.
///
/// A recompute swaps `current` and `previous`, refills `current` from the
/// view queries, and diffs the two into `new_entities` / `removed_entities`.
/// The diff lists survive until [`post_send`](Self::post_send) so that a tick
/// without a recompute still sends the pending additions and removals.
#[derive(Default)]
pub struct ViewSet {
    current: HashSet<EntityRef>,
    previous: HashSet<EntityRef>,
    new_entities: HashSet<EntityRef>,
    removed_entities: Vec<EntityRef>,
}

impl ViewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a recompute: `previous` becomes the last computed set and
    /// `current` is emptied for the queries to refill.
    pub fn begin_recompute(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Marks `entity` visible this recompute. First sight is recorded in the
    /// new-entity list.
    pub fn insert(&mut self, entity: EntityRef) {
        if self.current.insert(entity) && !self.previous.contains(&entity) {
            self.new_entities.insert(entity);
        }
    }

    /// Finishes a recompute by recording entities that fell out of view.
    pub fn finish_recompute(&mut self) {
        for entity in &self.previous {
            if !self.current.contains(entity) {
                self.removed_entities.push(*entity);
            }
        }
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.current.contains(&entity)
    }

    /// Entities visible as of the last recompute.
    pub fn current(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.current.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Whether `entity` entered the view since the last successful send.
    pub fn is_new(&self, entity: EntityRef) -> bool {
        self.new_entities.contains(&entity)
    }

    pub fn removed_entities(&self) -> &[EntityRef] {
        &self.removed_entities
    }

    /// Clears the diff lists once their contents have gone out in a batch.
    pub fn post_send(&mut self) {
        self.new_entities.clear();
        self.removed_entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i32) -> EntityRef {
        EntityRef::new(id, 1)
    }

    #[test]
    fn diff_records_new_and_removed() {
        let mut view = ViewSet::new();
        view.begin_recompute();
        view.insert(entity(1));
        view.insert(entity(2));
        view.finish_recompute();
        assert!(view.is_new(entity(1)));
        assert!(view.is_new(entity(2)));
        assert!(view.removed_entities().is_empty());
        view.post_send();

        view.begin_recompute();
        view.insert(entity(2));
        view.insert(entity(3));
        view.finish_recompute();
        assert!(!view.is_new(entity(2)));
        assert!(view.is_new(entity(3)));
        assert_eq!(view.removed_entities(), &[entity(1)]);
    }

    #[test]
    fn diff_lists_survive_until_post_send() {
        let mut view = ViewSet::new();
        view.begin_recompute();
        view.insert(entity(7));
        view.finish_recompute();

        // a tick without recompute still sees the pending addition
        assert!(view.is_new(entity(7)));
        view.post_send();
        assert!(!view.is_new(entity(7)));
    }

    #[test]
    fn reinserting_within_one_recompute_is_counted_once() {
        let mut view = ViewSet::new();
        view.begin_recompute();
        view.insert(entity(4));
        view.insert(entity(4));
        view.finish_recompute();
        assert_eq!(view.len(), 1);
    }
}
