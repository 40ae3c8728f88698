// src/converter/claims.rs

//! Generation claims shared by the worker pool
//!
//! A worker claims a source atom before generating it. A worker that needs
//! an atom claimed by someone else blocks until the claimant finishes:
//!
//! - on success the claim stays settled and the waiter references it
//! - on failure the claim is dropped and the waiter generates the atom
//!   itself, meeting the same failure on its own chain
//!
//! Waits form a graph (worker -> awaited atom -> owning worker). A wait
//! that would close a loop in that graph is refused with [`Claim::Cycle`],
//! so a dependency cycle split across workers fails like one found on a
//! single chain instead of hanging the pool.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use tracing::debug;

/// Outcome of [`ClaimTable::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The caller owns the atom and must [`ClaimTable::release`] it
    Acquired,
    /// The atom was already handled successfully this run
    Settled,
    /// The owner is (transitively) waiting on the caller
    Cycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending { owner: usize },
    Settled,
}

#[derive(Debug, Default)]
struct Table {
    states: HashMap<String, State>,
    /// Worker id -> atom it is blocked on
    waiting: HashMap<usize, String>,
}

impl Table {
    /// Whether `worker` waiting on `atom` would close a wait loop
    ///
    /// Every worker waits on at most one atom and no loop exists yet, so
    /// the walk ends at a running owner or back at `worker`.
    fn closes_loop(&self, worker: usize, atom: &str) -> bool {
        let mut current = atom;
        loop {
            let Some(State::Pending { owner }) = self.states.get(current) else {
                return false;
            };
            if *owner == worker {
                return true;
            }
            match self.waiting.get(owner) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClaimTable {
    table: Mutex<Table>,
    changed: Condvar,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `atom` for `worker`, waiting while another worker holds it
    pub fn acquire(&self, atom: &str, worker: usize) -> Claim {
        let mut table = self.table.lock();
        loop {
            match table.states.get(atom).copied() {
                None => {
                    table
                        .states
                        .insert(atom.to_string(), State::Pending { owner: worker });
                    return Claim::Acquired;
                }
                Some(State::Settled) => return Claim::Settled,
                Some(State::Pending { owner }) => {
                    if table.closes_loop(worker, atom) {
                        return Claim::Cycle;
                    }
                    debug!("Worker {} waiting for {} (held by worker {})", worker, atom, owner);
                    table.waiting.insert(worker, atom.to_string());
                    self.changed.wait(&mut table);
                    table.waiting.remove(&worker);
                }
            }
        }
    }

    /// Finish a claim taken with [`acquire`](Self::acquire)
    pub fn release(&self, atom: &str, succeeded: bool) {
        let mut table = self.table.lock();
        if succeeded {
            table.states.insert(atom.to_string(), State::Settled);
        } else {
            table.states.remove(atom);
        }
        drop(table);
        self.changed.notify_all();
    }

    #[cfg(test)]
    fn is_waiting(&self, worker: usize) -> bool {
        self.table.lock().waiting.contains_key(&worker)
    }
}
