//! Counters for the admission queue.
//!
//! Totals are kept inside the queue's critical section so a snapshot always
//! satisfies `enqueued = delivered + evicted + drained + remaining`.

use std::time::Duration;

use serde::Serialize;

use crate::queue::DeliveryPolicy;

/// Running totals, mutated only under the queue lock
#[derive(Debug, Default, Clone)]
pub(crate) struct QueueTotals {
    pub enqueued: u64,
    pub delivered_fifo: u64,
    pub delivered_lifo: u64,
    pub evicted: u64,
    pub drained: u64,
    pub max_depth: u64,
    pub total_wait_ms: u64,
}

impl QueueTotals {
    pub fn record_enqueued(&mut self, depth: usize) {
        self.enqueued += 1;
        self.max_depth = self.max_depth.max(depth as u64);
    }

    pub fn record_delivered(&mut self, policy: DeliveryPolicy, waited: Duration) {
        match policy {
            DeliveryPolicy::Fifo => self.delivered_fifo += 1,
            DeliveryPolicy::Lifo => self.delivered_lifo += 1,
        }
        self.total_wait_ms += waited.as_millis() as u64;
    }

    pub fn record_evicted(&mut self, count: usize) {
        self.evicted += count as u64;
    }

    pub fn record_drained(&mut self, count: usize) {
        self.drained += count as u64;
    }

    pub fn snapshot(&self, remaining: usize, close_failures: u64) -> QueueStats {
        let delivered = self.delivered_fifo + self.delivered_lifo;
        QueueStats {
            enqueued_total: self.enqueued,
            delivered_fifo: self.delivered_fifo,
            delivered_lifo: self.delivered_lifo,
            evicted_total: self.evicted,
            drained_total: self.drained,
            close_failures,
            remaining: remaining as u64,
            max_depth: self.max_depth,
            total_wait_ms: self.total_wait_ms,
            avg_wait_ms: if delivered == 0 {
                0.0
            } else {
                self.total_wait_ms as f64 / delivered as f64
            },
        }
    }
}

/// Consistent snapshot of queue activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub enqueued_total: u64,
    pub delivered_fifo: u64,
    pub delivered_lifo: u64,
    pub evicted_total: u64,
    pub drained_total: u64,
    pub close_failures: u64,
    pub remaining: u64,
    pub max_depth: u64,
    /// Summed queue wait of every delivered connection
    pub total_wait_ms: u64,
    pub avg_wait_ms: f64,
}

impl QueueStats {
    /// Connections handed to workers under either policy
    pub fn delivered_total(&self) -> u64 {
        self.delivered_fifo + self.delivered_lifo
    }

    /// Every admitted connection is delivered, evicted, drained or still queued
    pub fn is_conserved(&self) -> bool {
        self.enqueued_total
            == self.delivered_total() + self.evicted_total + self.drained_total + self.remaining
    }

    /// Share of deliveries made newest-first
    pub fn lifo_ratio(&self) -> f64 {
        let delivered = self.delivered_total();
        if delivered == 0 {
            return 0.0;
        }
        self.delivered_lifo as f64 / delivered as f64
    }
}
