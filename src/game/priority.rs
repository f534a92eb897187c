//! Priority cursor

use crate::core::PlayerId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassResult {
    pub all_passed: bool,
    /// Holder of priority after the pass
    pub next: Option<PlayerId>,
}

/// Cyclic priority order with a pass count since the last stack change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityManager {
    order: Vec<PlayerId>,
    cursor: usize,
    passed: SmallVec<[PlayerId; 4]>,
    last_passed: Option<PlayerId>,
}

impl PriorityManager {
    pub fn new(order: Vec<PlayerId>) -> Self {
        PriorityManager {
            order,
            cursor: 0,
            passed: SmallVec::new(),
            last_passed: None,
        }
    }

    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn current(&self) -> Option<PlayerId> {
        self.order.get(self.cursor).copied()
    }

    pub fn pass_count(&self) -> usize {
        self.passed.len()
    }

    pub fn last_passed(&self) -> Option<PlayerId> {
        self.last_passed
    }

    /// Give priority to `active` and forget all passes
    pub fn reset(&mut self, active: PlayerId) {
        self.cursor = self.order.iter().position(|p| *p == active).unwrap_or(0);
        self.clear_passes();
    }

    fn clear_passes(&mut self) {
        self.passed.clear();
        self.last_passed = None;
    }

    fn advance(&mut self) {
        if !self.order.is_empty() {
            self.cursor = (self.cursor + 1) % self.order.len();
        }
    }

    pub fn pass_priority(&mut self) -> PassResult {
        let Some(current) = self.current() else {
            return PassResult {
                all_passed: true,
                next: None,
            };
        };
        if self.passed.contains(&current) {
            return PassResult {
                all_passed: true,
                next: Some(current),
            };
        }
        self.passed.push(current);
        self.last_passed = Some(current);
        self.advance();
        PassResult {
            all_passed: self.passed.len() >= self.order.len(),
            next: self.current(),
        }
    }

    /// A non-pass action ends everyone's pass intent and moves the cursor on
    pub fn after_player_action(&mut self) {
        self.advance();
        self.clear_passes();
    }

    /// Replace the order when players leave. Priority stays with `current`
    /// if it remains, otherwise moves to the next remaining player.
    pub fn update_order(&mut self, new_order: Vec<PlayerId>, current: PlayerId) {
        let successor = self
            .order
            .iter()
            .position(|p| *p == current)
            .map(|start| {
                (0..self.order.len())
                    .map(|offset| self.order[(start + offset) % self.order.len()])
                    .find(|p| new_order.contains(p))
            })
            .unwrap_or(None);

        self.passed.retain(|p| new_order.contains(p));
        if self.last_passed.is_some_and(|p| !new_order.contains(&p)) {
            self.last_passed = None;
        }
        self.cursor = successor
            .and_then(|p| new_order.iter().position(|q| *q == p))
            .unwrap_or(0);
        self.order = new_order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: u32) -> Vec<PlayerId> {
        (0..n).map(PlayerId::new).collect()
    }

    #[test]
    fn test_all_players_pass() {
        let p = players(2);
        let mut priority = PriorityManager::new(p.clone());
        priority.reset(p[0]);

        let first = priority.pass_priority();
        assert!(!first.all_passed);
        assert_eq!(first.next, Some(p[1]));

        let second = priority.pass_priority();
        assert!(second.all_passed);
    }

    #[test]
    fn test_action_clears_passes() {
        let p = players(3);
        let mut priority = PriorityManager::new(p.clone());
        priority.reset(p[0]);
        priority.pass_priority();
        assert_eq!(priority.current(), Some(p[1]));

        priority.after_player_action();
        assert_eq!(priority.current(), Some(p[2]));
        assert_eq!(priority.pass_count(), 0);
        assert!(priority.last_passed().is_none());
    }

    #[test]
    fn test_double_pass_reports_all_passed() {
        let p = players(1);
        let mut priority = PriorityManager::new(p.clone());
        priority.reset(p[0]);
        assert!(priority.pass_priority().all_passed);
        assert!(priority.pass_priority().all_passed);
    }

    #[test]
    fn test_update_order_skips_departed_player() {
        let p = players(3);
        let mut priority = PriorityManager::new(p.clone());
        priority.reset(p[1]);
        priority.update_order(vec![p[0], p[2]], p[1]);
        assert_eq!(priority.current(), Some(p[2]));
        assert_eq!(priority.order(), &[p[0], p[2]]);
    }
}
