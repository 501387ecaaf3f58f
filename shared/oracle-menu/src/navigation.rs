//! Navigation Stack
//!
//! Per-user history of visited screens. Entries live in a sharded `DashMap`,
//! so users on different shards never contend and a shard lock is held only
//! for the duration of one vector mutation.

use dashmap::DashMap;
use oracle_core::UserId;
use tracing::warn;

use crate::screen::ScreenId;

const DEFAULT_DEEP_NAVIGATION_THRESHOLD: usize = 8;

pub struct NavigationStack {
    stacks: DashMap<UserId, Vec<ScreenId>>,
    root: ScreenId,
    deep_threshold: usize,
}

impl NavigationStack {
    pub fn new(root: ScreenId) -> Self {
        Self {
            stacks: DashMap::new(),
            root,
            deep_threshold: DEFAULT_DEEP_NAVIGATION_THRESHOLD,
        }
    }

    /// Depth past which a push is logged as suspicious
    pub fn with_deep_threshold(mut self, threshold: usize) -> Self {
        self.deep_threshold = threshold.max(1);
        self
    }

    pub fn root(&self) -> &ScreenId {
        &self.root
    }

    pub fn push(&self, user: UserId, screen: ScreenId) {
        let depth = {
            let mut stack = self
                .stacks
                .entry(user)
                .or_insert_with(|| Vec::with_capacity(5));
            stack.push(screen);
            stack.len()
        };

        if depth > self.deep_threshold {
            warn!(
                user_id = %user,
                depth,
                threshold = self.deep_threshold,
                "Unexpectedly deep navigation, a screen may be missing its back element"
            );
        }
    }

    /// Remove and return the current screen; the root when history is empty
    pub fn pop(&self, user: UserId) -> ScreenId {
        self.stacks
            .get_mut(&user)
            .and_then(|mut stack| stack.pop())
            .unwrap_or_else(|| self.root.clone())
    }

    /// Current screen without removing it; the root when history is empty
    pub fn current(&self, user: UserId) -> ScreenId {
        self.stacks
            .get(&user)
            .and_then(|stack| stack.last().cloned())
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn reset(&self, user: UserId) {
        self.stacks.remove(&user);
    }

    pub fn depth(&self, user: UserId) -> usize {
        self.stacks.get(&user).map(|stack| stack.len()).unwrap_or(0)
    }

    /// Copy of the user's history, oldest first
    pub fn path(&self, user: UserId) -> Vec<ScreenId> {
        self.stacks
            .get(&user)
            .map(|stack| stack.value().clone())
            .unwrap_or_default()
    }

    /// Users with a history entry (possibly empty)
    pub fn tracked_users(&self) -> usize {
        self.stacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MAIN: ScreenId = ScreenId::from_static("main");

    fn screen(id: &str) -> ScreenId {
        ScreenId::new(id)
    }

    #[test]
    fn test_empty_stack_defaults_to_root() {
        let nav = NavigationStack::new(MAIN);
        let user = UserId(1);

        assert_eq!(nav.current(user), MAIN);
        assert_eq!(nav.pop(user), MAIN);
        assert_eq!(nav.depth(user), 0);
        assert!(nav.path(user).is_empty());
    }

    #[test]
    fn test_push_pop_order() {
        let nav = NavigationStack::new(MAIN);
        let user = UserId(1);

        nav.push(user, screen("main"));
        nav.push(user, screen("profile"));
        nav.push(user, screen("stats"));

        assert_eq!(nav.depth(user), 3);
        assert_eq!(nav.current(user), screen("stats"));
        assert_eq!(nav.pop(user), screen("stats"));
        assert_eq!(nav.current(user), screen("profile"));
        assert_eq!(nav.path(user), vec![screen("main"), screen("profile")]);
    }

    #[test]
    fn test_reset_discards_history() {
        let nav = NavigationStack::new(MAIN);
        let user = UserId(9);

        nav.push(user, screen("tasks"));
        nav.reset(user);

        assert_eq!(nav.depth(user), 0);
        assert_eq!(nav.current(user), MAIN);
        assert_eq!(nav.tracked_users(), 0);
    }

    #[test]
    fn test_threshold_is_at_least_one() {
        let nav = NavigationStack::new(MAIN).with_deep_threshold(0);
        assert_eq!(nav.deep_threshold, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_taps_same_user_keep_stack_consistent() {
        let nav = Arc::new(NavigationStack::new(MAIN));
        let user = UserId(42);

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let nav = nav.clone();
                tokio::spawn(async move {
                    nav.push(user, ScreenId::new(format!("s{}", i)));
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(nav.depth(user), 64);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let nav = nav.clone();
                tokio::spawn(async move { nav.pop(user) })
            })
            .collect();
        for handle in handles {
            assert_ne!(handle.await.unwrap(), MAIN);
        }
        assert_eq!(nav.depth(user), 0);
        assert_eq!(nav.current(user), MAIN);
    }
}
