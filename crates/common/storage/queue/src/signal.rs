// Copyright 2025 Crrow
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

use crossbeam::channel::{Receiver, Sender, bounded};

/// Single-slot wake-up signal between producers and the consumer.
///
/// Raising never blocks. Raises that happen while a wake is already pending
/// coalesce into that one wake, so a waiter sees at least one wake per burst
/// of publishes, not one per publish.
#[derive(Debug)]
pub(crate) struct WakeSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub(crate) fn raise(&self) {
        // Full means a wake is already pending. Disconnection is impossible
        // while `self` holds the receiver.
        let _ = self.tx.try_send(());
    }

    /// Receiver to select on; each received message consumes the pending wake.
    pub(crate) const fn receiver(&self) -> &Receiver<()> { &self.rx }
}
