// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Monotonic event queue driving all simulated time advance.

use crate::common::units::EventTime;
use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Callback fired when its scheduled time is reached. Payload state is
/// captured by the closure; the queue itself owns no domain state.
pub type EventCallback = Box<dyn FnOnce()>;

struct ScheduledEvent {
    time: EventTime,
    /// Insertion sequence, breaking ties FIFO among same-time events.
    seq: u64,
    callback: EventCallback,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
    }
}

/// Min-heap of scheduled events keyed by time with FIFO tie-breaking.
///
/// `current_time` is monotonically non-decreasing: it only advances when
/// the earliest event is popped, and scheduling into the past panics.
#[derive(Default)]
pub struct EventQueue {
    current_time: EventTime,
    next_seq: u64,
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            current_time: 0,
            next_seq: 0,
            heap: BinaryHeap::new(),
        }
    }

    /// Schedule `callback` to fire at `time`.
    pub fn schedule(&mut self, time: EventTime, callback: EventCallback) {
        assert!(
            time >= self.current_time,
            "cannot schedule event at {} ns, current time is {} ns",
            time,
            self.current_time
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledEvent {
            time,
            seq,
            callback,
        }));
    }

    /// Pop the earliest event, advancing `current_time` to its timestamp.
    ///
    /// The callback is returned rather than invoked so that the caller can
    /// release any borrow of the queue first; callbacks routinely schedule
    /// follow-up events.
    pub fn pop_earliest(&mut self) -> Option<EventCallback> {
        self.heap.pop().map(|Reverse(event)| {
            debug_assert!(event.time >= self.current_time);
            self.current_time = event.time;
            event.callback
        })
    }

    /// True when no events remain pending.
    pub fn finished(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn current_time(&self) -> EventTime {
        self.current_time
    }
}
