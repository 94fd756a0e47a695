use std::panic::{catch_unwind, AssertUnwindSafe};

use tether_shared::EntityRef;

use crate::view::view_set::ViewSet;
use crate::world::World;

/// Collects the entities one connection should observe.
///
/// Queries run on worker threads during the view phase; they read the world
/// and push entities, nothing else. A panicking query is logged and skipped —
/// the connection keeps the entities its other queries produced.
pub trait ViewQuery: Send {
    fn collect(&mut self, world: &World, out: &mut ViewSink<'_>);
}

/// Write-only access to the view set handed to a [`ViewQuery`].
pub struct ViewSink<'a> {
    set: &'a mut ViewSet,
}

impl ViewSink<'_> {
    pub fn push(&mut self, entity: EntityRef) {
        self.set.insert(entity);
    }
}

/// Runs a full view recompute for one connection.
pub fn recompute(view: &mut ViewSet, queries: &mut [Box<dyn ViewQuery>], world: &World) {
    view.begin_recompute();
    for query in queries.iter_mut() {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut sink = ViewSink { set: view };
            query.collect(world, &mut sink);
        }));
        if outcome.is_err() {
            log::error!("view query panicked in world {}; skipping it", world.id());
        }
    }
    view.finish_recompute();
}

/// Spreads view recomputes across ticks.
///
/// With step `N`, the connections at list indices congruent to the current
/// offset modulo `N` recompute this tick; the offset rotates each tick so
/// every connection recomputes once per `N` ticks.
pub struct ViewStagger {
    step: u32,
    offset: u32,
}

impl ViewStagger {
    pub fn new(step: u32) -> Self {
        Self {
            step: step.max(1),
            offset: 0,
        }
    }

    pub fn should_recompute(&self, index: usize) -> bool {
        index as u32 % self.step == self.offset
    }

    pub fn advance(&mut self) {
        self.offset = (self.offset + 1) % self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternating_subsets_with_step_two() {
        let mut stagger = ViewStagger::new(2);
        let due = |stagger: &ViewStagger| {
            (0..4).filter(|i| stagger.should_recompute(*i)).collect::<Vec<_>>()
        };
        assert_eq!(due(&stagger), vec![0, 2]);
        stagger.advance();
        assert_eq!(due(&stagger), vec![1, 3]);
        stagger.advance();
        assert_eq!(due(&stagger), vec![0, 2]);
    }

    #[test]
    fn step_one_recomputes_everything_every_tick() {
        let mut stagger = ViewStagger::new(1);
        assert!((0..5).all(|i| stagger.should_recompute(i)));
        stagger.advance();
        assert!((0..5).all(|i| stagger.should_recompute(i)));
    }
}
