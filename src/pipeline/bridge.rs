//! Thread boundary between the controller and the host transport.
//!
//! `HostLink` is the host-side view of the two hand-off queues the controller
//! owns: commands go in through the inbound queue, data and responses come
//! out of the outbound queue. A transport (pipe, socket, test harness) holds
//! a `HostLink` and does its own framing.

use crate::pipeline::packet::{CommandCode, Packet};
use crate::pipeline::queue::HandoffQueue;
use std::sync::Arc;

/// Host-side handle for talking to a running controller.
#[derive(Clone)]
pub struct HostLink {
    inbound: Arc<dyn HandoffQueue<Packet>>,
    outbound: Arc<dyn HandoffQueue<Packet>>,
}

impl HostLink {
    pub fn new(
        inbound: Arc<dyn HandoffQueue<Packet>>,
        outbound: Arc<dyn HandoffQueue<Packet>>,
    ) -> Self {
        Self { inbound, outbound }
    }

    // --- Commands ---

    /// Queue a command packet for dispatch.
    pub fn send_command(&self, packet: Packet) {
        self.inbound.push(packet);
    }

    /// Queue a payload-less command.
    pub fn send(&self, code: CommandCode, packet_id: u8) {
        self.send_command(Packet::command(code, packet_id));
    }

    pub fn request_data(&self, packet_id: u8) {
        self.send(CommandCode::GetData, packet_id);
    }

    pub fn request_ramp_demo(&self, packet_id: u8) {
        self.send(CommandCode::RampDemo, packet_id);
    }

    // --- Responses ---

    /// Try to receive a single packet without blocking.
    pub fn try_recv(&self) -> Option<Packet> {
        self.outbound.pop()
    }

    /// Drain all pending packets.
    pub fn drain(&self) -> Vec<Packet> {
        std::iter::from_fn(|| self.outbound.pop()).collect()
    }

    /// Packets waiting for the host.
    pub fn pending_responses(&self) -> usize {
        self.outbound.len()
    }

    /// Commands not yet picked up by the dispatcher.
    pub fn pending_commands(&self) -> usize {
        self.inbound.len()
    }
}

impl std::fmt::Debug for HostLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLink")
            .field("pending_commands", &self.inbound.len())
            .field("pending_responses", &self.outbound.len())
            .finish()
    }
}
