use seqatlas_core::{FilterSet, Query, Viewport};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub seq: u64,
    pub query: Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Viewport not settled and nothing else changed.
    Idle,
    /// Same as the last dispatched query; any pending candidate was dropped.
    Redundant,
    /// Same as the pending candidate; its timer keeps running.
    Unchanged,
    /// New candidate; debounce timer (re)started.
    Armed,
}

#[derive(Debug, Clone)]
struct Pending {
    query: Query,
    due: Instant,
}

/// Turns (viewport, filters) into at most one outgoing query per quiet period.
#[derive(Debug)]
pub struct QueryCoalescer {
    debounce: Duration,
    pending: Option<Pending>,
    last_dispatched: Option<Query>,
    seq: u64,
}

impl QueryCoalescer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: None,
            last_dispatched: None,
            seq: 0,
        }
    }

    pub fn offer(
        &mut self,
        now: Instant,
        viewport: Viewport,
        filters: &FilterSet,
        settled: bool,
    ) -> Offer {
        let baseline = self
            .pending
            .as_ref()
            .map(|p| &p.query)
            .or(self.last_dispatched.as_ref());
        let filters_changed = baseline.map_or(true, |q| q.filters != *filters);
        if !settled && !filters_changed {
            return Offer::Idle;
        }

        let candidate = Query {
            viewport,
            filters: filters.clone(),
        };
        if self.last_dispatched.as_ref() == Some(&candidate) {
            self.pending = None;
            return Offer::Redundant;
        }
        if self.pending.as_ref().is_some_and(|p| p.query == candidate) {
            return Offer::Unchanged;
        }
        self.pending = Some(Pending {
            query: candidate,
            due: now + self.debounce,
        });
        Offer::Armed
    }

    /// Releases the pending query once its debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Dispatch> {
        if self.pending.as_ref()?.due > now {
            return None;
        }
        let pending = self.pending.take()?;
        self.seq += 1;
        self.last_dispatched = Some(pending.query.clone());
        Some(Dispatch {
            seq: self.seq,
            query: pending.query,
        })
    }

    /// Drops the pending candidate without dispatching it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn latest_seq(&self) -> u64 {
        self.seq
    }
}
