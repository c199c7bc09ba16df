//! Time-budgeted wrapper around an [`AttributeSource`]
//!
//! Source calls are assumed synchronous and bounded. When a host cannot
//! guarantee that, this wrapper enforces a per-call budget on the
//! dispatch thread: the inner call runs to completion, and a result that
//! arrives over budget is discarded and surfaced as `OperationTimedOut`.
//! A discarded write may still have mutated the source; the next refresh
//! reconciles the table with whatever the source actually stored.

use super::{AttributeSource, ChangeCallback, EntityDesc, EntityId, SubscriptionId};
use crate::error::SyncError;
use crate::value::AttrValue;
use std::time::{Duration, Instant};

pub struct DeadlineSource<S> {
    inner: S,
    budget: Duration,
}

impl<S: AttributeSource> DeadlineSource<S> {
    pub fn new(inner: S, budget: Duration) -> Self {
        Self { inner, budget }
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn check_budget<T>(&self, started: Instant, result: Result<T, SyncError>) -> Result<T, SyncError> {
        let elapsed = started.elapsed();
        if elapsed > self.budget {
            log::warn!(
                "source call exceeded budget: {:?} > {:?}, result discarded",
                elapsed,
                self.budget
            );
            return Err(SyncError::OperationTimedOut { elapsed });
        }
        result
    }
}

impl<S: AttributeSource> AttributeSource for DeadlineSource<S> {
    fn list_entities(
        &self,
        predicate: &dyn Fn(&EntityDesc) -> bool,
    ) -> Result<Vec<EntityId>, SyncError> {
        let started = Instant::now();
        let result = self.inner.list_entities(predicate);
        self.check_budget(started, result)
    }

    fn describe(&self, entity: EntityId) -> Result<EntityDesc, SyncError> {
        let started = Instant::now();
        let result = self.inner.describe(entity);
        self.check_budget(started, result)
    }

    fn read(&self, entity: EntityId, key: &str) -> Result<AttrValue, SyncError> {
        let started = Instant::now();
        let result = self.inner.read(entity, key);
        self.check_budget(started, result)
    }

    fn write(
        &mut self,
        entity: EntityId,
        key: &str,
        value: AttrValue,
    ) -> Result<AttrValue, SyncError> {
        let started = Instant::now();
        let result = self.inner.write(entity, key, value);
        let elapsed = started.elapsed();
        if elapsed > self.budget {
            log::warn!(
                "write {}.{} exceeded budget: {:?} > {:?}, result discarded",
                entity,
                key,
                elapsed,
                self.budget
            );
            return Err(SyncError::OperationTimedOut { elapsed });
        }
        result
    }

    fn subscribe(&mut self, callback: ChangeCallback) -> SubscriptionId {
        self.inner.subscribe(callback)
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.inner.unsubscribe(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemoryScene;
    use std::thread;

    /// Delegates to a MemoryScene after an artificial stall
    struct SlowScene {
        inner: MemoryScene,
        stall: Duration,
    }

    impl AttributeSource for SlowScene {
        fn list_entities(
            &self,
            predicate: &dyn Fn(&EntityDesc) -> bool,
        ) -> Result<Vec<EntityId>, SyncError> {
            thread::sleep(self.stall);
            self.inner.list_entities(predicate)
        }

        fn describe(&self, entity: EntityId) -> Result<EntityDesc, SyncError> {
            thread::sleep(self.stall);
            self.inner.describe(entity)
        }

        fn read(&self, entity: EntityId, key: &str) -> Result<AttrValue, SyncError> {
            thread::sleep(self.stall);
            self.inner.read(entity, key)
        }

        fn write(
            &mut self,
            entity: EntityId,
            key: &str,
            value: AttrValue,
        ) -> Result<AttrValue, SyncError> {
            thread::sleep(self.stall);
            self.inner.write(entity, key, value)
        }

        fn subscribe(&mut self, callback: ChangeCallback) -> SubscriptionId {
            self.inner.subscribe(callback)
        }

        fn unsubscribe(&mut self, subscription: SubscriptionId) {
            self.inner.unsubscribe(subscription)
        }
    }

    fn scene_with_light(stall: Duration) -> (SlowScene, EntityId) {
        let mut inner = MemoryScene::new();
        let light = inner.add_node("key_light", "pointLight");
        inner.define_attr(light, "visible", AttrValue::Bool(true));
        (SlowScene { inner, stall }, light)
    }

    #[test]
    fn test_fast_calls_pass_through() {
        let (scene, light) = scene_with_light(Duration::ZERO);
        let source = DeadlineSource::new(scene, Duration::from_secs(5));
        assert_eq!(source.read(light, "visible").unwrap(), AttrValue::Bool(true));
    }

    #[test]
    fn test_slow_write_times_out() {
        let (scene, light) = scene_with_light(Duration::from_millis(20));
        let mut source = DeadlineSource::new(scene, Duration::from_millis(1));
        let err = source
            .write(light, "visible", AttrValue::Bool(false))
            .unwrap_err();
        assert!(matches!(err, SyncError::OperationTimedOut { .. }));
    }

    #[test]
    fn test_slow_read_times_out() {
        let (scene, light) = scene_with_light(Duration::from_millis(20));
        let source = DeadlineSource::new(scene, Duration::from_millis(1));
        let err = source.read(light, "visible").unwrap_err();
        assert!(matches!(err, SyncError::OperationTimedOut { .. }));
    }
}
