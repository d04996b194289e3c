//! Registry of abortable effect tasks.
//!
//! Tasks spawned under an [`EffectId`] are recorded so that
//! [`Effect::Cancel`](livetodo_core::effect::Effect::Cancel) can abort them.
//! Unscoped streams are recorded as detached so shutdown can release them too.

use livetodo_core::effect::EffectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

#[derive(Default)]
struct Registry {
    scoped: HashMap<EffectId, Vec<AbortHandle>>,
    detached: Vec<AbortHandle>,
}

/// Shared between all clones of a store.
#[derive(Clone, Default)]
pub(crate) struct CancellationRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl CancellationRegistry {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding this lock cannot leave the maps half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a task under `id`, or as detached when `id` is `None`.
    pub(crate) fn register(&self, id: Option<&EffectId>, handle: AbortHandle) {
        let mut registry = self.lock();
        let handles = match id {
            Some(id) => registry.scoped.entry(id.clone()).or_default(),
            None => &mut registry.detached,
        };
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Aborts every task registered under `id`, returning how many were live.
    pub(crate) fn cancel(&self, id: &EffectId) -> usize {
        let handles = self.lock().scoped.remove(id).unwrap_or_default();
        abort_all(handles)
    }

    /// Aborts everything, scoped and detached.
    pub(crate) fn cancel_all(&self) -> usize {
        let (scoped, detached) = {
            let mut registry = self.lock();
            (
                std::mem::take(&mut registry.scoped),
                std::mem::take(&mut registry.detached),
            )
        };
        scoped.into_values().map(abort_all).sum::<usize>() + abort_all(detached)
    }

    /// Number of unfinished tasks under `id`.
    pub(crate) fn in_flight(&self, id: &EffectId) -> usize {
        self.lock()
            .scoped
            .get(id)
            .map_or(0, |handles| handles.iter().filter(|h| !h.is_finished()).count())
    }
}

fn abort_all(handles: Vec<AbortHandle>) -> usize {
    handles
        .into_iter()
        .filter(|h| !h.is_finished())
        .inspect(AbortHandle::abort)
        .count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper() -> AbortHandle {
        tokio::spawn(tokio::time::sleep(Duration::from_secs(60))).abort_handle()
    }

    #[tokio::test]
    async fn test_cancel_only_touches_its_id() {
        let registry = CancellationRegistry::default();
        let a = EffectId::new("a");
        let b = EffectId::new("b");

        registry.register(Some(&a), sleeper());
        registry.register(Some(&a), sleeper());
        registry.register(Some(&b), sleeper());

        assert_eq!(registry.in_flight(&a), 2);
        assert_eq!(registry.cancel(&a), 2);
        assert_eq!(registry.in_flight(&a), 0);
        assert_eq!(registry.in_flight(&b), 1);
    }

    #[tokio::test]
    async fn test_cancel_all_includes_detached() {
        let registry = CancellationRegistry::default();
        registry.register(None, sleeper());
        registry.register(Some(&EffectId::new("x")), sleeper());

        assert_eq!(registry.cancel_all(), 2);
        assert_eq!(registry.cancel_all(), 0);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_not_counted() {
        let registry = CancellationRegistry::default();
        let id = EffectId::new("done");
        let handle = tokio::spawn(async {});
        let abort = handle.abort_handle();
        let _ = handle.await;

        registry.register(Some(&id), abort);
        assert_eq!(registry.in_flight(&id), 0);
        assert_eq!(registry.cancel(&id), 0);
    }
}
