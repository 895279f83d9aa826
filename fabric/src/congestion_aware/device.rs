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

use crate::common::units::DeviceId;
use crate::congestion_aware::chunk::Chunk;
use crate::congestion_aware::link::Link;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Endpoint or switch node presenting a local forwarding view: a map from
/// neighbor id to the outbound link reaching it.
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    links: HashMap<DeviceId, Rc<RefCell<Link>>>,
}

impl Device {
    pub(crate) fn new(id: DeviceId) -> Self {
        Self {
            id,
            links: HashMap::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Register the outbound link towards `to`. Re-connecting an existing
    /// neighbor is a no-op.
    pub(crate) fn connect(&mut self, to: DeviceId, link: Rc<RefCell<Link>>) {
        if self.links.contains_key(&to) {
            log::warn!(
                "device {}: already connected to device {}, ignoring re-connect",
                self.id,
                to
            );
            return;
        }
        self.links.insert(to, link);
    }

    pub fn connected(&self, to: DeviceId) -> bool {
        self.links.contains_key(&to)
    }

    /// Forward a chunk along its route, or complete it if this device is
    /// the destination.
    pub fn send(&self, chunk: Chunk) {
        assert_eq!(
            chunk.current_device().borrow().id(),
            self.id,
            "chunk sent through a device not holding it"
        );
        if chunk.at_destination() {
            chunk.complete();
            return;
        }
        let next = chunk.next_device().borrow().id();
        let link = self
            .links
            .get(&next)
            .unwrap_or_else(|| {
                panic!("device {}: no link to next-hop device {}", self.id, next)
            });
        Link::transmit(Rc::clone(link), chunk);
    }

    pub(crate) fn outbound_links(
        &self,
    ) -> impl Iterator<Item = (DeviceId, &Rc<RefCell<Link>>)> {
        self.links.iter().map(|(&to, link)| (to, link))
    }
}

#[cfg(test)]
mod device_tests {
    use super::*;
    use crate::congestion_aware::simulator::Simulator;

    #[test]
    fn test_reconnect_is_a_noop() {
        let _logger = env_logger::builder().try_init();
        let sim = Rc::new(Simulator::new());
        let mut device = Device::new(0);
        let first = Rc::new(RefCell::new(Link::new(50.0, 500, Rc::clone(&sim))));
        let second = Rc::new(RefCell::new(Link::new(100.0, 100, Rc::clone(&sim))));

        device.connect(1, Rc::clone(&first));
        device.connect(1, second);
        assert!(device.connected(1));
        assert!(!device.connected(2));
        // The original link stays registered.
        let (_, link) = device.outbound_links().next().unwrap();
        assert!(Rc::ptr_eq(link, &first));
    }

    #[test]
    fn test_destination_completes_chunk() {
        let completed = Rc::new(std::cell::Cell::new(false));
        let device = Rc::new(RefCell::new(Device::new(7)));
        let flag = Rc::clone(&completed);
        let chunk = Chunk::new(
            1,
            vec![Rc::clone(&device)],
            Box::new(move || flag.set(true)),
        );
        device.borrow().send(chunk);
        assert!(completed.get());
    }
}
