use std::sync::Mutex;

use pid::{Controller, Lerp, PIDCoefficients, PID};

use super::{step_axis, AxisStates, RollGainSource};
use crate::{
    attitude::Attitude,
    control::{ControlSurfaceCommand, ENGINE_COUNT},
    mailbox::Mailbox,
    setpoint::{AutopilotBundle, AutopilotSetpoint, AxisCoefficients, SetpointBundle},
    util::lock,
};

/// Fraction of the throttle gap closed on every command request.
pub const THROTTLE_BLEND: f64 = 0.1;

pub const DEFAULT_COEFFICIENTS: AxisCoefficients = AxisCoefficients {
    pitch: PIDCoefficients::new(0.1, 0.005, 0.001),
    yaw: PIDCoefficients::new(0.1, 0.0, 0.0),
    roll: PIDCoefficients::new(0.05, 0.005, 0.001),
};

/// Tick-side state: what the pilot asked for.
struct Pilot {
    setpoint: AutopilotSetpoint,
    coefficients: AxisCoefficients,
}

/// Command-side state: the control laws.
#[derive(Default)]
struct Laws {
    pitch: PID,
    yaw: PID,
    roll: PID,
    throttle: Lerp,
    roll_gains: RollGainSource,
}

/// Holds attitude targets with three PID axes and an eased throttle.
pub(super) struct AutopilotBrain {
    pilot: Mutex<Pilot>,
    laws: Mutex<Laws>,
}

impl AutopilotBrain {
    pub fn new() -> Self {
        Self {
            pilot: Mutex::new(Pilot {
                setpoint: AutopilotSetpoint::default(),
                coefficients: DEFAULT_COEFFICIENTS,
            }),
            laws: Mutex::new(Laws::default()),
        }
    }

    pub fn setpoint_mut(&self, f: impl FnOnce(&mut AutopilotSetpoint)) {
        f(&mut lock(&self.pilot).setpoint);
    }

    pub fn coefficients_mut(&self, f: impl FnOnce(&mut AxisCoefficients)) {
        f(&mut lock(&self.pilot).coefficients);
    }

    pub fn coefficients(&self) -> AxisCoefficients {
        lock(&self.pilot).coefficients
    }

    pub fn set_roll_gain_source(&self, source: RollGainSource) {
        lock(&self.laws).roll_gains = source;
    }

    pub fn bundle(&self, attitude: &Attitude) -> AutopilotBundle {
        let pilot = lock(&self.pilot);
        AutopilotBundle {
            target_throttle: pilot.setpoint.target_throttle,
            target_pitch: pilot.setpoint.target_pitch,
            target_yaw: pilot.setpoint.target_yaw,
            target_roll: pilot.setpoint.target_roll,
            pitch: attitude.pitch,
            yaw: attitude.yaw,
            roll: attitude.roll,
            pitch_pid: pilot.coefficients.pitch,
            yaw_pid: pilot.coefficients.yaw,
            roll_pid: pilot.coefficients.roll,
        }
    }

    pub fn command(
        &self,
        mut buffer: ControlSurfaceCommand,
        commands: &Mailbox<SetpointBundle>,
    ) -> ControlSurfaceCommand {
        let mut laws = lock(&self.laws);

        // Without a fresh bundle the surfaces hold and the throttle eases to zero.
        let mut target_throttle = 0.0;

        match commands.take() {
            Some(SetpointBundle::Autopilot(bundle)) => {
                target_throttle = bundle.target_throttle;

                step_axis(&mut laws.pitch, "pitch", bundle.target_pitch, bundle.pitch, &bundle.pitch_pid);
                step_axis(&mut laws.yaw, "yaw", bundle.target_yaw, bundle.yaw, &bundle.yaw_pid);
                let roll_pid = *laws.roll_gains.select(&bundle.yaw_pid, &bundle.roll_pid);
                step_axis(&mut laws.roll, "roll", bundle.target_roll, bundle.roll, &roll_pid);
            }
            Some(other) => log::debug!("Autopilot brain ignoring foreign bundle {:?}", other),
            None => {}
        }

        buffer.elevator = -laws.pitch.last_output();
        buffer.rudder = laws.yaw.last_output();
        buffer.aileron = laws.roll.last_output();

        let current_throttle = laws.throttle.last_output();
        let throttle = laws
            .throttle
            .update(target_throttle, current_throttle, THROTTLE_BLEND);
        buffer.throttle = [throttle; ENGINE_COUNT];

        buffer
    }

    pub fn states(&self) -> AxisStates {
        let laws = lock(&self.laws);
        AxisStates {
            pitch: laws.pitch.state(),
            yaw: laws.yaw.state(),
            roll: laws.roll.state(),
            throttle: Some(laws.throttle.last_output()),
        }
    }
}
