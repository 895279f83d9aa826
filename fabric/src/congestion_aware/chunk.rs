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

use crate::common::units::ChunkSize;
use crate::congestion_aware::device::Device;
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered devices a chunk travels through, source first.
pub type Route = Vec<Rc<RefCell<Device>>>;

/// Invoked once when the chunk reaches its destination; captures whatever
/// completion state the workload needs.
pub type ChunkCallback = Box<dyn FnOnce()>;

/// In-flight unit of work: an immutable payload size and route, plus a
/// cursor marking the device currently holding the chunk.
pub struct Chunk {
    size: ChunkSize,
    route: Route,
    cursor: usize,
    callback: Option<ChunkCallback>,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("size", &self.size)
            .field("route", &self.route)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Chunk {
    pub fn new(size: ChunkSize, route: Route, callback: ChunkCallback) -> Self {
        assert!(!route.is_empty(), "chunk route must not be empty");
        Self {
            size,
            route,
            cursor: 0,
            callback: Some(callback),
        }
    }

    pub fn size(&self) -> ChunkSize {
        self.size
    }

    /// The device currently holding the chunk.
    pub fn current_device(&self) -> &Rc<RefCell<Device>> {
        &self.route[self.cursor]
    }

    /// The next hop; the chunk must not already be at its destination.
    pub fn next_device(&self) -> &Rc<RefCell<Device>> {
        assert!(
            !self.at_destination(),
            "chunk at destination has no next device"
        );
        &self.route[self.cursor + 1]
    }

    pub fn at_destination(&self) -> bool {
        self.cursor == self.route.len() - 1
    }

    pub(crate) fn advance(&mut self) {
        assert!(!self.at_destination(), "cannot advance past destination");
        self.cursor += 1;
    }

    /// Fire the completion callback, consuming the chunk.
    pub(crate) fn complete(mut self) {
        let callback = self
            .callback
            .take()
            .expect("chunk completion callback already taken");
        callback();
    }

    /// Arrival-event body: step the cursor and hand the chunk to the
    /// device it just reached, which forwards or completes it.
    pub(crate) fn arrived_next_device(mut self) {
        self.advance();
        let device = Rc::clone(self.current_device());
        let device = device.borrow();
        device.send(self);
    }
}
