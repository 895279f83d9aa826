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

//! Unidirectional link with serialization and queueing.
//!
//! A link serializes one chunk at a time. Accepting a chunk schedules two
//! events: the chunk's arrival at the next device after the communication
//! delay, and the link freeing up after the serialization delay alone.
//! Freeing before arrival is what lets consecutive links of a path
//! pipeline. Chunks offered to a busy link wait in the pending queue.

use crate::common::units::{bw_gbps_to_bpns, Bandwidth, ChunkSize, EventTime, Latency};
use crate::congestion_aware::chunk::Chunk;
use crate::congestion_aware::simulator::{QueueDiscipline, Simulator};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug)]
pub struct Link {
    bandwidth_bpns: Bandwidth,
    latency: Latency,
    busy: bool,
    pending: VecDeque<Chunk>,
    /// How many chunks ever entered the pending queue; congestion metric.
    queued_count: u64,
    sim: Rc<Simulator>,
}

impl Link {
    pub(crate) fn new(bandwidth: Bandwidth, latency: Latency, sim: Rc<Simulator>) -> Self {
        Self {
            bandwidth_bpns: bw_gbps_to_bpns(bandwidth),
            latency,
            busy: false,
            pending: VecDeque::new(),
            queued_count: 0,
            sim,
        }
    }

    /// Time the link is occupied transmitting `size` bytes.
    pub fn serialization_delay(&self, size: ChunkSize) -> EventTime {
        assert!(size > 0, "chunk size must be positive");
        (size as f64 / self.bandwidth_bpns) as EventTime
    }

    /// End-to-end time from send to arrival on a free link.
    pub fn communication_delay(&self, size: ChunkSize) -> EventTime {
        assert!(size > 0, "chunk size must be positive");
        (self.latency as f64 + size as f64 / self.bandwidth_bpns) as EventTime
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn queued_count(&self) -> u64 {
        self.queued_count
    }

    /// Accept a chunk: transmit immediately when free, queue otherwise.
    pub(crate) fn transmit(link: Rc<RefCell<Link>>, chunk: Chunk) {
        let mut guard = link.borrow_mut();
        if guard.busy {
            guard.queued_count += 1;
            log::debug!(
                "t={} link {}->{} busy, queueing chunk of {} bytes ({} pending)",
                guard.sim.current_time(),
                chunk.current_device().borrow().id(),
                chunk.next_device().borrow().id(),
                chunk.size(),
                guard.pending.len()
            );
            guard.pending.push_back(chunk);
            return;
        }
        drop(guard);
        Self::schedule_transmission(link, chunk);
    }

    fn schedule_transmission(link: Rc<RefCell<Link>>, chunk: Chunk) {
        let (sim, arrival_time, free_time) = {
            let mut guard = link.borrow_mut();
            assert!(!guard.busy, "transmission scheduled on a busy link");
            guard.busy = true;

            let now = guard.sim.current_time();
            (
                Rc::clone(&guard.sim),
                now + guard.communication_delay(chunk.size()),
                now + guard.serialization_delay(chunk.size()),
            )
        };

        // Arrival is scheduled first: with zero latency both events share
        // a timestamp and the chunk must reach the next device before the
        // link hands itself to a queued successor.
        sim.schedule(arrival_time, Box::new(move || chunk.arrived_next_device()));
        let free_link = Rc::clone(&link);
        sim.schedule(free_time, Box::new(move || Self::become_free(free_link)));
    }

    /// Link-free event body: release the link and start the next pending
    /// chunk, chosen per the queue discipline.
    fn become_free(link: Rc<RefCell<Link>>) {
        let next = {
            let mut guard = link.borrow_mut();
            assert!(guard.busy, "link-free event for a link that is not busy");
            guard.busy = false;

            if guard.pending.is_empty() {
                None
            } else {
                let index = match guard.sim.queue_discipline() {
                    QueueDiscipline::Fifo => 0,
                    QueueDiscipline::Random => guard.sim.random_index(guard.pending.len()),
                };
                guard.pending.remove(index)
            }
        };
        if let Some(chunk) = next {
            Self::schedule_transmission(link, chunk);
        }
    }
}
