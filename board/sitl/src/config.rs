use std::{env, str::FromStr};

use anyhow::{bail, Context};
use autopilot::{BrainType, Port};

use crate::flight_axis::DEFAULT_FLIGHT_AXIS_PORT;

/// Connection and autopilot settings of one bridge run.
#[derive(Debug, Clone, PartialEq)]
pub struct SitlConfig {
    pub host: String,
    pub fdm_port: Port,
    pub ctrls_port: Port,
    pub flight_axis_port: u16,
    pub brain: BrainType,
    pub target_pitch: f64,
    pub target_yaw: f64,
    pub target_roll: f64,
    pub target_throttle: f64,
}

impl Default for SitlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            fdm_port: Port::new(5501, 5502),
            ctrls_port: Port::new(5503, 5504),
            flight_axis_port: DEFAULT_FLIGHT_AXIS_PORT,
            brain: BrainType::Manual,
            target_pitch: 20.0,
            target_yaw: 180.0,
            target_roll: 0.0,
            target_throttle: 0.6,
        }
    }
}

impl SitlConfig {
    /// Defaults overridden by the `SITL_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("SITL_HOST") {
            let host = host.trim();
            if host.is_empty() {
                bail!("SITL_HOST must not be empty");
            }
            config.host = host.to_string();
        }
        if let Some(ports) = lookup("SITL_FDM_PORTS") {
            config.fdm_port = parse_port_pair(&ports).context("Invalid SITL_FDM_PORTS")?;
        }
        if let Some(ports) = lookup("SITL_CTRLS_PORTS") {
            config.ctrls_port = parse_port_pair(&ports).context("Invalid SITL_CTRLS_PORTS")?;
        }
        if let Some(port) = lookup("SITL_FLIGHT_AXIS_PORT") {
            config.flight_axis_port = parse(&port, "SITL_FLIGHT_AXIS_PORT")?;
        }
        if let Some(brain) = lookup("SITL_BRAIN") {
            config.brain = brain.parse().context("Invalid SITL_BRAIN")?;
        }
        if let Some(value) = lookup("SITL_TARGET_PITCH") {
            config.target_pitch = parse(&value, "SITL_TARGET_PITCH")?;
        }
        if let Some(value) = lookup("SITL_TARGET_YAW") {
            config.target_yaw = parse(&value, "SITL_TARGET_YAW")?;
        }
        if let Some(value) = lookup("SITL_TARGET_ROLL") {
            config.target_roll = parse(&value, "SITL_TARGET_ROLL")?;
        }
        if let Some(value) = lookup("SITL_TARGET_THROTTLE") {
            config.target_throttle = parse(&value, "SITL_TARGET_THROTTLE")?;
        }

        Ok(config)
    }
}

fn parse<T>(value: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {key}: {value:?}"))
}

/// `out:in`
fn parse_port_pair(value: &str) -> anyhow::Result<Port> {
    let Some((port_out, port_in)) = value.split_once(':') else {
        bail!("Expected `out:in`, got {value:?}");
    };
    Ok(Port::new(
        parse(port_out, "out port")?,
        parse(port_in, "in port")?,
    ))
}
