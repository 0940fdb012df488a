//! Contract between the control core and whatever moves bytes to the simulator.
//!
//! A transport hands out two connections: an inbound one that delivers FDM
//! samples and an outbound one that asks for control-surface commands. Each
//! connection runs its own worker; the core only supplies the callbacks.

use std::sync::Arc;

use crate::{control::ControlSurfaceCommand, control::FdmSample, error::TransportError};

/// Out/In UDP-style port pair of one simulator channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub port_out: u16,
    pub port_in: u16,
}

impl Port {
    pub const fn new(port_out: u16, port_in: u16) -> Self {
        Port { port_out, port_in }
    }
}

/// Invoked by the inbound worker for every received telemetry sample.
pub type SampleHandler = Box<dyn FnMut(&FdmSample) + Send>;

/// Invoked by the outbound worker whenever it needs a command.
///
/// Receives the command the simulator currently holds. `None` means "no fresh
/// command", and the worker keeps sending the previous one.
pub type CommandHandler =
    Box<dyn FnMut(ControlSurfaceCommand) -> Option<ControlSurfaceCommand> + Send>;

/// Called with `true` when the remote side stops answering.
pub type DisconnectCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub trait Connection: Send {
    fn set_disconnect_callback(&mut self, callback: DisconnectCallback);

    /// Start the connection's own RX/TX worker.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Stop the worker. Must unblock any pending socket read.
    fn stop(&mut self);
}

pub trait Connector {
    fn connect_inbound(
        &mut self,
        host: &str,
        port: Port,
        on_sample: SampleHandler,
    ) -> Result<Box<dyn Connection>, TransportError>;

    fn connect_outbound(
        &mut self,
        host: &str,
        port: Port,
        on_command: CommandHandler,
    ) -> Result<Box<dyn Connection>, TransportError>;
}
