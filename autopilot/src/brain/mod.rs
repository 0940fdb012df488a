//! Control strategies.
//!
//! A [`Brain`] is shared by three threads: the inbound worker calls
//! [`Brain::on_telemetry`], the control thread calls [`Brain::on_tick`] and the
//! outbound worker calls [`Brain::on_command_request`]. The tick side and the
//! command side keep their state behind separate locks and only exchange data
//! through the two mailboxes.

mod autopilot;
mod tracking;

use std::{fmt, str::FromStr, sync::Mutex};

use pid::{ControllerState, PIDCoefficients, DEFAULT_DT, PID};
use thiserror::Error;

use crate::{
    attitude::Attitude,
    control::{ControlSurfaceCommand, FdmSample},
    mailbox::Mailbox,
    setpoint::{AxisCoefficients, Rect, SetpointBundle},
    util::lock,
};

use autopilot::AutopilotBrain;
use tracking::TrackingBrain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrainType {
    Manual,
    Autopilot,
    Tracking,
}

impl BrainType {
    pub const ALL: [BrainType; 3] = [BrainType::Manual, BrainType::Autopilot, BrainType::Tracking];

    pub fn name(&self) -> &'static str {
        match self {
            BrainType::Manual => "Manual",
            BrainType::Autopilot => "Autopilot",
            BrainType::Tracking => "Tracking",
        }
    }
}

impl fmt::Display for BrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown brain type: {0}")]
pub struct UnknownBrainType(pub String);

impl FromStr for BrainType {
    type Err = UnknownBrainType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BrainType::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBrainType(s.to_string()))
    }
}

/// Which coefficients drive the roll controller.
///
/// Both autopilot brains historically fed the roll PID with the yaw gains, so
/// that is the default. `RollAxis` uses the roll gains instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollGainSource {
    #[default]
    YawAxis,
    RollAxis,
}

impl RollGainSource {
    pub(crate) fn select<'a>(
        &self,
        yaw: &'a PIDCoefficients,
        roll: &'a PIDCoefficients,
    ) -> &'a PIDCoefficients {
        match self {
            RollGainSource::YawAxis => yaw,
            RollGainSource::RollAxis => roll,
        }
    }
}

/// Snapshot of the per-axis controller state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisStates {
    pub pitch: ControllerState,
    pub yaw: ControllerState,
    pub roll: ControllerState,
    pub throttle: Option<f64>,
}

enum BrainMode {
    Manual,
    Autopilot(AutopilotBrain),
    Tracking(TrackingBrain),
}

pub struct Brain {
    attitude: Mutex<Attitude>,
    mode: BrainMode,
}

impl Brain {
    /// Build a brain with fresh controller state.
    pub fn new(kind: BrainType) -> Self {
        let mode = match kind {
            BrainType::Manual => BrainMode::Manual,
            BrainType::Autopilot => BrainMode::Autopilot(AutopilotBrain::new()),
            BrainType::Tracking => BrainMode::Tracking(TrackingBrain::new()),
        };
        Brain {
            attitude: Mutex::new(Attitude::default()),
            mode,
        }
    }

    pub fn kind(&self) -> BrainType {
        match self.mode {
            BrainMode::Manual => BrainType::Manual,
            BrainMode::Autopilot(_) => BrainType::Autopilot,
            BrainMode::Tracking(_) => BrainType::Tracking,
        }
    }

    /// Last attitude consumed by the control thread.
    pub fn attitude(&self) -> Attitude {
        *lock(&self.attitude)
    }

    // -- Thread entry points --

    /// Control thread: pick up fresh telemetry and hand setpoints to the command worker.
    pub fn on_tick(&self, telemetry: &Mailbox<Attitude>, commands: &Mailbox<SetpointBundle>) {
        let Some(attitude) = telemetry.take() else {
            return;
        };
        *lock(&self.attitude) = attitude;
        log::trace!(
            "attitude pitch={:.2} yaw={:.2} roll={:.2}",
            attitude.pitch,
            attitude.yaw,
            attitude.roll
        );

        match &self.mode {
            BrainMode::Manual => {}
            BrainMode::Autopilot(brain) => {
                commands.publish(SetpointBundle::Autopilot(brain.bundle(&attitude)))
            }
            BrainMode::Tracking(brain) => {
                commands.publish(SetpointBundle::Tracking(brain.bundle(&attitude)))
            }
        }
    }

    /// Inbound worker: convert the sample and publish it for the control thread.
    pub fn on_telemetry(&self, sample: &FdmSample, telemetry: &Mailbox<Attitude>) {
        telemetry.publish(Attitude::from_fdm(sample));
    }

    /// Outbound worker: produce the command to send, or `None` to keep the previous one.
    pub fn on_command_request(
        &self,
        buffer: ControlSurfaceCommand,
        commands: &Mailbox<SetpointBundle>,
    ) -> Option<ControlSurfaceCommand> {
        match &self.mode {
            BrainMode::Manual => Some(buffer),
            BrainMode::Autopilot(brain) => Some(brain.command(buffer, commands)),
            BrainMode::Tracking(brain) => brain.command(buffer, commands),
        }
    }

    // -- Setters used by the UI and the tracker --
    //
    // Each returns whether the active mode owns the value.

    pub fn set_target_pitch(&self, pitch: f64) -> bool {
        self.with_autopilot(|brain| brain.setpoint_mut(|sp| sp.target_pitch = pitch))
    }

    pub fn set_target_yaw(&self, yaw: f64) -> bool {
        self.with_autopilot(|brain| brain.setpoint_mut(|sp| sp.target_yaw = yaw))
    }

    pub fn set_target_roll(&self, roll: f64) -> bool {
        self.with_autopilot(|brain| brain.setpoint_mut(|sp| sp.target_roll = roll))
    }

    pub fn set_target_throttle(&self, throttle: f64) -> bool {
        self.with_autopilot(|brain| brain.setpoint_mut(|sp| sp.target_throttle = throttle))
    }

    pub fn set_target_location(&self, location: (f64, f64)) -> bool {
        match &self.mode {
            BrainMode::Tracking(brain) => {
                brain.set_target_location(location);
                true
            }
            _ => false,
        }
    }

    pub fn set_object_bbox(&self, bbox: Option<Rect>) -> bool {
        match &self.mode {
            BrainMode::Tracking(brain) => {
                brain.set_object_bbox(bbox);
                true
            }
            _ => false,
        }
    }

    pub fn set_pitch_pid_c(&self, coefficients: PIDCoefficients) -> bool {
        self.update_coefficients(|c| c.pitch = coefficients)
    }

    pub fn set_yaw_pid_c(&self, coefficients: PIDCoefficients) -> bool {
        self.update_coefficients(|c| c.yaw = coefficients)
    }

    pub fn set_roll_pid_c(&self, coefficients: PIDCoefficients) -> bool {
        self.update_coefficients(|c| c.roll = coefficients)
    }

    pub fn set_roll_gain_source(&self, source: RollGainSource) -> bool {
        match &self.mode {
            BrainMode::Manual => false,
            BrainMode::Autopilot(brain) => {
                brain.set_roll_gain_source(source);
                true
            }
            BrainMode::Tracking(brain) => {
                brain.set_roll_gain_source(source);
                true
            }
        }
    }

    // -- Inspection --

    pub fn coefficients(&self) -> Option<AxisCoefficients> {
        match &self.mode {
            BrainMode::Manual => None,
            BrainMode::Autopilot(brain) => Some(brain.coefficients()),
            BrainMode::Tracking(brain) => Some(brain.coefficients()),
        }
    }

    pub fn controller_states(&self) -> Option<AxisStates> {
        match &self.mode {
            BrainMode::Manual => None,
            BrainMode::Autopilot(brain) => Some(brain.states()),
            BrainMode::Tracking(brain) => Some(brain.states()),
        }
    }

    fn with_autopilot(&self, f: impl FnOnce(&AutopilotBrain)) -> bool {
        match &self.mode {
            BrainMode::Autopilot(brain) => {
                f(brain);
                true
            }
            _ => false,
        }
    }

    fn update_coefficients(&self, f: impl FnOnce(&mut AxisCoefficients)) -> bool {
        match &self.mode {
            BrainMode::Manual => false,
            BrainMode::Autopilot(brain) => {
                brain.coefficients_mut(f);
                true
            }
            BrainMode::Tracking(brain) => {
                brain.coefficients_mut(f);
                true
            }
        }
    }
}

impl fmt::Debug for Brain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Brain")
            .field("kind", &self.kind())
            .field("attitude", &self.attitude())
            .finish()
    }
}

/// Step one PID axis, holding its previous output if the update is rejected.
fn step_axis(
    pid: &mut PID,
    axis: &'static str,
    setpoint: f64,
    measured: f64,
    coefficients: &PIDCoefficients,
) {
    if let Err(err) = pid.update(setpoint, measured, coefficients, DEFAULT_DT) {
        log::error!("{axis} controller update rejected, holding output: {err}");
    }
}
