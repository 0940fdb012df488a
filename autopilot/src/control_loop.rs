use std::{
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    attitude::Attitude,
    brain::{Brain, BrainType},
    control::{ControlSurfaceCommand, FdmSample},
    error::ControlLoopError,
    mailbox::Mailbox,
    setpoint::SetpointBundle,
    transport::{Connection, Connector, DisconnectCallback, Port},
};

/// Nominal control tick. Not wall-clock corrected.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

pub enum LoopCommand {
    Stop,
}

/// Values each mailbox dropped because they were replaced before being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxOverwrites {
    pub telemetry: u64,
    pub commands: u64,
}

/// Bridges the simulator's two telemetry workers through one [`Brain`].
///
/// Lifecycle: [`connect`](Self::connect) starts the transport workers,
/// [`start`](Self::start) launches the fixed-tick control thread and
/// [`stop`](Self::stop) tears everything down. Disconnects are reported through
/// the callback given to `connect`; nothing here reconnects on its own.
pub struct ControlLoop {
    brain: Arc<Brain>,
    telemetry: Arc<Mailbox<Attitude>>,
    commands: Arc<Mailbox<SetpointBundle>>,
    fdm_connection: Option<Box<dyn Connection>>,
    ctrls_connection: Option<Box<dyn Connection>>,
    to_worker_tx: Option<mpsc::Sender<LoopCommand>>,
    worker_thread: Option<JoinHandle<()>>,
    tick_interval: Duration,
}

impl ControlLoop {
    pub fn new(brain: Arc<Brain>) -> Self {
        Self {
            brain,
            telemetry: Arc::new(Mailbox::new()),
            commands: Arc::new(Mailbox::new()),
            fdm_connection: None,
            ctrls_connection: None,
            to_worker_tx: None,
            worker_thread: None,
            tick_interval: TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn brain(&self) -> Arc<Brain> {
        self.brain.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.fdm_connection.is_some() || self.ctrls_connection.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.worker_thread.is_some()
    }

    pub fn mailbox_overwrites(&self) -> MailboxOverwrites {
        MailboxOverwrites {
            telemetry: self.telemetry.overwritten(),
            commands: self.commands.overwritten(),
        }
    }

    /// Swap in a freshly built brain. All controller state of the old one is dropped.
    pub fn set_brain(&mut self, kind: BrainType) -> Result<Arc<Brain>, ControlLoopError> {
        if self.is_connected() || self.is_running() {
            return Err(ControlLoopError::Busy);
        }
        self.brain = Arc::new(Brain::new(kind));
        self.telemetry.clear();
        self.commands.clear();
        log::info!("Brain switched to {}", kind);
        Ok(self.brain.clone())
    }

    pub fn connect(
        &mut self,
        connector: &mut dyn Connector,
        host: &str,
        fdm_port: Port,
        ctrls_port: Port,
        on_disconnect: DisconnectCallback,
    ) -> Result<(), ControlLoopError> {
        if self.is_connected() {
            return Err(ControlLoopError::AlreadyConnected);
        }
        self.telemetry.clear();
        self.commands.clear();

        let on_disconnect: DisconnectCallback = Arc::new(move |disconnected| {
            if disconnected {
                log::info!("Simulator connection lost");
            } else {
                log::info!("Simulator connection restored");
            }
            on_disconnect(disconnected);
        });

        let brain = self.brain.clone();
        let telemetry = self.telemetry.clone();
        let on_sample = Box::new(move |sample: &FdmSample| brain.on_telemetry(sample, &telemetry));

        let mut fdm = connector.connect_inbound(host, fdm_port, on_sample)?;
        fdm.set_disconnect_callback(on_disconnect.clone());
        fdm.start()?;

        let brain = self.brain.clone();
        let commands = self.commands.clone();
        let on_command = Box::new(move |buffer: ControlSurfaceCommand| {
            brain.on_command_request(buffer, &commands)
        });

        let ctrls = connector
            .connect_outbound(host, ctrls_port, on_command)
            .and_then(|mut ctrls| {
                ctrls.set_disconnect_callback(on_disconnect);
                ctrls.start()?;
                Ok(ctrls)
            });
        let ctrls = match ctrls {
            Ok(ctrls) => ctrls,
            Err(err) => {
                fdm.stop();
                return Err(err.into());
            }
        };

        self.fdm_connection = Some(fdm);
        self.ctrls_connection = Some(ctrls);
        log::info!(
            "Connected to {host} (FDM {}/{}, Ctrls {}/{}) with {} brain",
            fdm_port.port_out,
            fdm_port.port_in,
            ctrls_port.port_out,
            ctrls_port.port_in,
            self.brain.kind()
        );
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), ControlLoopError> {
        if self.is_running() {
            return Err(ControlLoopError::AlreadyStarted);
        }
        if !self.is_connected() {
            return Err(ControlLoopError::NotConnected);
        }

        let (to_worker_tx, to_worker_rx) = mpsc::channel();
        let brain = self.brain.clone();
        let telemetry = self.telemetry.clone();
        let commands = self.commands.clone();
        let tick_interval = self.tick_interval;

        let handle = thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || run(brain, telemetry, commands, to_worker_rx, tick_interval))
            .map_err(ControlLoopError::Spawn)?;

        self.worker_thread = Some(handle);
        self.to_worker_tx = Some(to_worker_tx);
        log::info!("Control loop started ({:?} tick)", tick_interval);
        Ok(())
    }

    /// Stop the tick thread and both connections.
    ///
    /// Connections are stopped before the join so their workers are already
    /// unblocked when the tick thread exits.
    pub fn stop(&mut self) -> Result<(), ControlLoopError> {
        let Some(handle) = self.worker_thread.take() else {
            return Err(ControlLoopError::NotStarted);
        };

        if let Some(tx) = self.to_worker_tx.take() {
            let _ = tx.send(LoopCommand::Stop);
        }
        self.stop_connections();

        handle.join().map_err(|_| ControlLoopError::ThreadPanicked)?;
        let overwrites = self.mailbox_overwrites();
        log::info!(
            "Control loop stopped ({} telemetry, {} command values overwritten unread)",
            overwrites.telemetry,
            overwrites.commands
        );
        Ok(())
    }

    /// Stop both connections without touching the tick thread.
    pub fn disconnect(&mut self) -> Result<(), ControlLoopError> {
        if self.is_running() {
            return Err(ControlLoopError::AlreadyStarted);
        }
        if !self.is_connected() {
            return Err(ControlLoopError::NotConnected);
        }
        self.stop_connections();
        Ok(())
    }

    fn stop_connections(&mut self) {
        if let Some(mut fdm) = self.fdm_connection.take() {
            fdm.stop();
        }
        if let Some(mut ctrls) = self.ctrls_connection.take() {
            ctrls.stop();
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.stop() {
                log::error!("Failed to stop control loop: {err}");
            }
        } else {
            self.stop_connections();
        }
    }
}

fn run(
    brain: Arc<Brain>,
    telemetry: Arc<Mailbox<Attitude>>,
    commands: Arc<Mailbox<SetpointBundle>>,
    to_worker_rx: mpsc::Receiver<LoopCommand>,
    tick_interval: Duration,
) {
    loop {
        brain.on_tick(&telemetry, &commands);

        match to_worker_rx.recv_timeout(tick_interval) {
            Ok(LoopCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }
}
