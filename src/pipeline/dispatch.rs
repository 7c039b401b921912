//! Command dispatch: decodes host command packets.
//!
//! Dispatch is stateless apart from the precomputed self-test payload and
//! never touches stage state, so it cannot block on a paused pipeline.
//! Rejected commands are logged and produce no response; the host treats a
//! missing response as an error.

use crate::config::SyntheticConfig;
use crate::pipeline::packet::{CommandCode, Packet, DATA_PACKET_ID};
use crate::pipeline::queue::HandoffQueue;
use crate::pipeline::synthetic::ramp_pattern;

/// What happened to one command packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Recognized; nothing to send back.
    Handled,
    /// Recognized; this many packets pushed to the outbound queue.
    Responded(usize),
    /// Reserved code, rejected.
    Reserved(u8),
    /// Unrecognized code, rejected.
    Unknown(u8),
}

impl DispatchOutcome {
    pub fn is_rejected(self) -> bool {
        matches!(self, DispatchOutcome::Reserved(_) | DispatchOutcome::Unknown(_))
    }
}

pub struct CommandDispatcher {
    /// Ramp payload, present only when the synthetic source is enabled.
    ramp: Option<Vec<u8>>,
}

impl CommandDispatcher {
    pub fn new(synthetic: &SyntheticConfig) -> Self {
        let ramp = synthetic.enabled.then(|| {
            ramp_pattern(
                synthetic.channel_count as usize,
                synthetic.samples_per_channel,
            )
        });
        Self { ramp }
    }

    pub fn demo_enabled(&self) -> bool {
        self.ramp.is_some()
    }

    /// Handle one command, pushing any responses to `outbound`.
    pub fn dispatch(&self, packet: Packet, outbound: &dyn HandoffQueue<Packet>) -> DispatchOutcome {
        tracing::debug!("Dispatching {:?}", packet);

        match packet.code() {
            CommandCode::GetData => {
                tracing::info!("Packet command 0x01: GetData");
                DispatchOutcome::Handled
            }
            CommandCode::Reserved(code) => {
                tracing::error!("Packet command 0x{:02X}: Reserved", code);
                DispatchOutcome::Reserved(code)
            }
            CommandCode::RampDemo => match &self.ramp {
                Some(ramp) => {
                    tracing::info!("Packet command 0x1F: RampDemo");
                    outbound.push(Packet::new(
                        CommandCode::RAMP_DEMO,
                        ramp.clone(),
                        DATA_PACKET_ID,
                    ));
                    DispatchOutcome::Responded(1)
                }
                None => {
                    tracing::error!("Unknown packet command 0x1F (synthetic source disabled)");
                    DispatchOutcome::Unknown(CommandCode::RAMP_DEMO)
                }
            },
            CommandCode::Unknown(code) => {
                tracing::error!("Unknown packet command 0x{:02X}", code);
                DispatchOutcome::Unknown(code)
            }
        }
    }
}
