mod attitude;
mod brain;
mod control;
mod control_loop;
mod error;
mod mailbox;
mod setpoint;
mod tracking_session;
mod transport;
mod util;

pub use attitude::Attitude;
pub use brain::{AxisStates, Brain, BrainType, RollGainSource, UnknownBrainType};
pub use control::{ControlSurfaceCommand, FdmSample, ENGINE_COUNT};
pub use control_loop::{ControlLoop, MailboxOverwrites, TICK_INTERVAL};
pub use error::{ControlLoopError, TransportError};
pub use mailbox::Mailbox;
pub use setpoint::{
    AutopilotBundle, AutopilotSetpoint, AxisCoefficients, Rect, SetpointBundle, TrackingBundle,
    TrackingSetpoint,
};
pub use tracking_session::{TrackingSession, TRACKING_CONFIDENCE_THRESHOLD};
pub use transport::{
    CommandHandler, Connection, Connector, DisconnectCallback, Port, SampleHandler,
};

pub use pid::{ControllerState, PIDCoefficients};
