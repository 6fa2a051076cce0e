//! Per-operation failure injection and call counting.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use listing_portal_core::StoreError;
use listing_portal_core::stores::StoreResult;

#[derive(Debug)]
struct FaultState<Op> {
    /// `None` fails every call; `Some(n)` fails the next `n` calls.
    failing: HashMap<Op, Option<u32>>,
    calls: HashMap<Op, u32>,
}

impl<Op> Default for FaultState<Op> {
    fn default() -> Self {
        Self {
            failing: HashMap::new(),
            calls: HashMap::new(),
        }
    }
}

/// Failure switches and call counters for one store.
#[derive(Debug)]
pub struct Faults<Op> {
    state: Mutex<FaultState<Op>>,
}

impl<Op> Default for Faults<Op> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FaultState::default()),
        }
    }
}

impl<Op: Copy + Eq + Hash> Faults<Op> {
    /// Make every call of `op` fail with `StoreError::Unavailable`.
    pub fn fail_always(&self, op: Op) {
        self.lock().failing.insert(op, None);
    }

    /// Make the next `times` calls of `op` fail.
    pub fn fail_times(&self, op: Op, times: u32) {
        self.lock().failing.insert(op, Some(times));
    }

    /// Stop failing `op`.
    pub fn heal(&self, op: Op) {
        self.lock().failing.remove(&op);
    }

    /// Calls of `op` so far, failed ones included.
    pub fn calls(&self, op: Op) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Count a call and decide whether it fails.
    pub(crate) fn check(&self, op: Op) -> StoreResult<()> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;

        let fail = match state.failing.get_mut(&op) {
            None => false,
            Some(None) => true,
            Some(Some(0)) => false,
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        };
        if fail {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, FaultState<Op>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
