//! Patch bay: the connection fabric between component ports.
//!
//! Every input has at most one incoming connection. An output may fan out to
//! any number of inputs.

use crate::component::Component;
use crate::machine::Slot;

/// Address of a port inside a machine: component slot plus port index.
///
/// Whether the index refers to an input or an output is implied by which end
/// of a connection the address sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddr {
    pub slot: usize,
    pub port: usize,
}

impl PortAddr {
    pub fn new(slot: usize, port: usize) -> Self {
        Self { slot, port }
    }
}

/// A directed edge from an output to an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: PortAddr,
    pub dest: PortAddr,
    /// Subcircuit instance whose template created this edge
    pub owner: Option<String>,
}

/// The set of live connections
#[derive(Debug, Clone, Default)]
pub struct PatchBay {
    connections: Vec<Connection>,
}

impl PatchBay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source currently driving `dest`, if any
    pub fn driver_of(&self, dest: PortAddr) -> Option<PortAddr> {
        self.connections
            .iter()
            .find(|c| c.dest == dest)
            .map(|c| c.source)
    }

    /// Add an edge. Returns the existing driver and changes nothing if
    /// `dest` is already driven.
    pub fn connect(
        &mut self,
        source: PortAddr,
        dest: PortAddr,
        owner: Option<String>,
    ) -> Result<(), PortAddr> {
        if let Some(existing) = self.driver_of(dest) {
            return Err(existing);
        }
        self.connections.push(Connection {
            source,
            dest,
            owner,
        });
        Ok(())
    }

    /// Remove one edge; false if it did not exist
    pub fn disconnect(&mut self, source: PortAddr, dest: PortAddr) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.source == source && c.dest == dest));
        self.connections.len() != before
    }

    /// Remove every edge
    pub fn disconnect_all(&mut self) {
        self.connections.clear();
    }

    /// Remove every edge touching `slot`
    pub fn remove_slot(&mut self, slot: usize) {
        self.connections
            .retain(|c| c.source.slot != slot && c.dest.slot != slot);
    }

    /// Copy each source output into its destination input
    pub(crate) fn propagate(&self, slots: &mut [Option<Slot>]) {
        for c in &self.connections {
            let value = match &slots[c.source.slot] {
                Some(slot) => slot.component.get_output(c.source.port),
                None => continue,
            };
            if let Some(slot) = &mut slots[c.dest.slot] {
                slot.component.set_input(c.dest.port, value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
