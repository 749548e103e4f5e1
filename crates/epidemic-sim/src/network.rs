//! The simulated, lossy, delaying network that algorithms send messages over.

use epidemic_core::model::{Operation, Record, Timestamp};
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// Whether a receiver had already applied an operation's effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    New,
    Seen,
}

/// Every message shape an algorithm can put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// A gossiped write.
    Op(Operation),
    /// Reply to an `Op`, telling the sender whether it was new.
    Ack { op_id: String, status: AckStatus },
    /// Anti-entropy pull request: "here is what I have for these keys".
    Digest { items: Vec<(String, Timestamp)> },
    /// Anti-entropy reply: records the digest sender was missing or stale on.
    Records { items: Vec<(String, Record)> },
}

#[derive(Debug, Clone, PartialEq)]
struct InFlightMessage {
    deliver_at: u64,
    src: String,
    dst: String,
    payload: Message,
}

/// A delivered message, with its sender attached for the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub src: String,
    pub dst: String,
    pub payload: Message,
}

/// A lossy, delaying, insertion-order-preserving message queue.
///
/// Every send either drops the message (per `drop_rate`) or enqueues it
/// with a delivery tick uniformly chosen from `[min_delay, max_delay]`
/// relative to `now`. A `(0, 0)` delay range (the default) delivers in the
/// same tick it was sent.
#[derive(Debug, Clone)]
pub struct Network {
    rng: DeterministicRng,
    drop_rate: f64,
    min_delay: u64,
    max_delay: u64,
    queue: Vec<InFlightMessage>,
    pub msgs_sent: u64,
    pub msgs_dropped: u64,
}

impl Network {
    #[must_use]
    pub fn new(seed: u64, drop_rate: f64, min_delay: u64, max_delay: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            drop_rate,
            min_delay,
            max_delay,
            queue: Vec::new(),
            msgs_sent: 0,
            msgs_dropped: 0,
        }
    }

    /// Enqueue `payload` from `src` to `dst`, dropping it with probability
    /// `drop_rate`. Counts toward `msgs_sent` regardless of outcome.
    pub fn send(&mut self, now: u64, src: &str, dst: &str, payload: Message) {
        self.msgs_sent += 1;
        if self.roll_drop() {
            self.msgs_dropped += 1;
            return;
        }
        let delay = self.roll_delay();
        self.queue.push(InFlightMessage {
            deliver_at: now.saturating_add(delay),
            src: src.to_string(),
            dst: dst.to_string(),
            payload,
        });
    }

    fn roll_drop(&mut self) -> bool {
        if self.drop_rate <= 0.0 {
            return false;
        }
        if self.drop_rate >= 1.0 {
            return true;
        }
        let percent = (self.drop_rate * 100.0).round() as u8;
        self.rng.hit_rate_percent(percent)
    }

    fn roll_delay(&mut self) -> u64 {
        if self.min_delay >= self.max_delay {
            return self.min_delay;
        }
        let span = self.max_delay - self.min_delay + 1;
        self.min_delay + self.rng.next_bounded(span)
    }

    /// Remove and return every message whose delivery tick has arrived,
    /// in the order they were originally enqueued.
    pub fn deliver_ready(&mut self, now: u64) -> Vec<Delivery> {
        let mut ready = Vec::new();
        let mut future = Vec::with_capacity(self.queue.len());
        for msg in self.queue.drain(..) {
            if msg.deliver_at <= now {
                ready.push(Delivery {
                    src: msg.src,
                    dst: msg.dst,
                    payload: msg.payload,
                });
            } else {
                future.push(msg);
            }
        }
        self.queue = future;
        ready
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }
}
