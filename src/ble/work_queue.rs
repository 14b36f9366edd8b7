//! Deferred work.
//!
//! Stack callbacks never call back into the radio.  They record an intent on
//! the owning central and schedule a [`WorkKey`] here; the host executes due
//! keys later from its work context.  Each key is pending at most once:
//! scheduling it again moves its deadline instead of queuing a duplicate.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::ble::central::CentralId;
use crate::error::Error;

/// Kind of deferred action a central can have pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkKind {
    /// Start or stop the central's scanner, per its recorded intent.
    Scan,
    /// Attempt the recorded connection intent.
    Connect,
}

/// Owner and kind of a deferred action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WorkKey {
    pub central: CentralId,
    pub kind: WorkKind,
}

impl WorkKey {
    pub const fn scan(central: CentralId) -> Self {
        Self {
            central,
            kind: WorkKind::Scan,
        }
    }

    pub const fn connect(central: CentralId) -> Self {
        Self {
            central,
            kind: WorkKind::Connect,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    key: WorkKey,
    deadline: Instant,
    seq: u32,
}

pub struct WorkQueue<const N: usize> {
    entries: Vec<Entry, N>,
    next_seq: u32,
}

impl<const N: usize> Default for WorkQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> WorkQueue<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `key` to run `delay` after `now`, replacing any pending
    /// schedule for the same key.  Returns the new deadline.
    pub fn schedule(&mut self, key: WorkKey, now: Instant, delay: Duration) -> Result<Instant, Error> {
        let deadline = now + delay;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.deadline = deadline;
            entry.seq = seq;
            return Ok(deadline);
        }

        self.entries
            .push(Entry { key, deadline, seq })
            .map_err(|_| Error::QueueFull)?;
        Ok(deadline)
    }

    pub fn is_pending(&self, key: WorkKey) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn deadline(&self, key: WorkKey) -> Option<Instant> {
        self.entries.iter().find(|e| e.key == key).map(|e| e.deadline)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Remove and return the earliest due key, ties broken by scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<WorkKey> {
        let (index, _) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by_key(|(_, e)| (e.deadline, e.seq))?;
        Some(self.entries.swap_remove(index).key)
    }

    /// Drop everything pending for `central`.
    pub(crate) fn purge(&mut self, central: CentralId) {
        self.entries.retain(|e| e.key.central != central);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
