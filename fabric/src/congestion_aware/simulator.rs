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

//! Simulation driver shared by every link of a congestion-aware network.

use crate::common::event_queue::{EventCallback, EventQueue};
use crate::common::units::EventTime;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::cell::{Cell, RefCell};

/// Head-of-line selection applied when a link frees up with chunks queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueDiscipline {
    /// Depart in arrival order.
    #[default]
    Fifo,
    /// Depart in uniformly random order.
    Random,
}

/// Owns the event queue, the queue discipline and the simulation RNG.
///
/// Every link holds a shared handle to its simulator; scheduling and time
/// queries go through here. The discipline must be chosen before the first
/// chunk is sent and stays fixed for the whole run.
pub struct Simulator {
    event_queue: RefCell<EventQueue>,
    discipline: Cell<QueueDiscipline>,
    rng: RefCell<Xoshiro256StarStar>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("discipline", &self.discipline.get())
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// A simulator with the default seed; runs are reproducible.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            event_queue: RefCell::new(EventQueue::new()),
            discipline: Cell::new(QueueDiscipline::Fifo),
            rng: RefCell::new(Xoshiro256StarStar::seed_from_u64(seed)),
        }
    }

    pub fn set_queue_discipline(&self, discipline: QueueDiscipline) {
        if discipline == QueueDiscipline::Random {
            log::debug!("link queue discipline: random head-of-line selection");
        }
        self.discipline.set(discipline);
    }

    pub fn queue_discipline(&self) -> QueueDiscipline {
        self.discipline.get()
    }

    pub fn schedule(&self, time: EventTime, callback: EventCallback) {
        self.event_queue.borrow_mut().schedule(time, callback);
    }

    pub fn current_time(&self) -> EventTime {
        self.event_queue.borrow().current_time()
    }

    pub fn finished(&self) -> bool {
        self.event_queue.borrow().finished()
    }

    /// Fire the earliest pending event, advancing the current time.
    ///
    /// The queue borrow is dropped before the callback runs so that the
    /// callback can schedule follow-up events.
    pub fn proceed(&self) {
        let callback = self.event_queue.borrow_mut().pop_earliest();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Run events to exhaustion.
    pub fn run(&self) {
        while !self.finished() {
            self.proceed();
        }
    }

    pub(crate) fn random_index(&self, len: usize) -> usize {
        self.rng.borrow_mut().gen_range(0..len)
    }

    pub(crate) fn random_fraction(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod simulator_tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_callbacks_can_schedule_followups() {
        let sim = Rc::new(Simulator::new());
        let fired = Rc::new(Cell::new(0u32));

        let sim_handle = Rc::clone(&sim);
        let fired_handle = Rc::clone(&fired);
        sim.schedule(
            10,
            Box::new(move || {
                fired_handle.set(fired_handle.get() + 1);
                let fired_inner = Rc::clone(&fired_handle);
                sim_handle.schedule(20, Box::new(move || fired_inner.set(fired_inner.get() + 1)));
            }),
        );

        sim.run();
        assert_eq!(fired.get(), 2);
        assert_eq!(sim.current_time(), 20);
        assert!(sim.finished());
    }

    #[test]
    fn test_default_discipline_is_fifo() {
        let sim = Simulator::new();
        assert_eq!(sim.queue_discipline(), QueueDiscipline::Fifo);
        sim.set_queue_discipline(QueueDiscipline::Random);
        assert_eq!(sim.queue_discipline(), QueueDiscipline::Random);
    }
}
