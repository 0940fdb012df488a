//! RealFlight FlightAxis link exposed through the autopilot transport contract.
//!
//! FlightAxis is a single SOAP endpoint: every `ExchangeData` request carries
//! the RC channels to apply and returns the aircraft state. The inbound
//! connection owns that exchange loop. The outbound connection asks the brain
//! for commands and hands them to the exchange loop through a mailbox, so
//! neither worker ever waits on the other.

use std::{
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use autopilot::{
    CommandHandler, Connection, Connector, ControlSurfaceCommand, DisconnectCallback, FdmSample,
    Mailbox, Port, SampleHandler, TransportError,
};
use quick_xml::{events::Event, name::QName, Reader};

use crate::util::{channel_to_surface, quaternion_to_euler, surface_to_channel};

pub const DEFAULT_FLIGHT_AXIS_PORT: u16 = 18083;

pub const CHANNEL_COUNT: usize = 12;
const AILERON_CHANNEL: usize = 0;
const ELEVATOR_CHANNEL: usize = 1;
const THROTTLE_CHANNEL: usize = 2;
const RUDDER_CHANNEL: usize = 3;

const EXCHANGE_INTERVAL: Duration = Duration::from_millis(1000 / 200); // 200 Hz
const COMMAND_INTERVAL: Duration = Duration::from_millis(1000 / 100); // 100 Hz
const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
const MAX_FAILED_EXCHANGES: u32 = 3;

macro_rules! soap_payload {
    ($body:expr) => {
        format!(
            r#"<?xml version='1.0' encoding='UTF-8'?>
            <soap:Envelope
                xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
                xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
                    <soap:Body>{}</soap:Body>
            </soap:Envelope>"#,
            $body
        )
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightAxisState {
    /// RC transmitter channels, 0..1.
    pub rc_channels: [f64; CHANNEL_COUNT],
    /// Orientation quaternion `(w, x, y, z)`.
    pub orientation: (f64, f64, f64, f64),
    pub airspeed: f64,
    pub altitude: f64,
    pub controller_is_active: bool,
    pub reset_button_has_been_pressed: bool,
}

impl Default for FlightAxisState {
    fn default() -> Self {
        let mut rc_channels = [0.5; CHANNEL_COUNT];
        rc_channels[THROTTLE_CHANNEL] = 0.0;
        Self {
            rc_channels,
            orientation: (1.0, 0.0, 0.0, 0.0),
            airspeed: 0.0,
            altitude: 0.0,
            controller_is_active: false,
            reset_button_has_been_pressed: false,
        }
    }
}

impl FlightAxisState {
    pub fn fdm_sample(&self) -> FdmSample {
        let (roll, pitch, yaw) = quaternion_to_euler(self.orientation);
        FdmSample {
            phi_rad: roll,
            theta_rad: pitch,
            psi_rad: yaw,
        }
    }

    /// The pilot's sticks as a control-surface command.
    pub fn rc_command(&self) -> ControlSurfaceCommand {
        let ch = &self.rc_channels;
        ControlSurfaceCommand::new(
            channel_to_surface(ch[ELEVATOR_CHANNEL]),
            channel_to_surface(ch[RUDDER_CHANNEL]),
            channel_to_surface(ch[AILERON_CHANNEL]),
            ch[THROTTLE_CHANNEL],
        )
    }
}

/// Overlay a command on top of the pilot's channels.
pub fn command_channels(
    base: &[f64; CHANNEL_COUNT],
    command: &ControlSurfaceCommand,
) -> [f64; CHANNEL_COUNT] {
    let mut channels = *base;
    channels[AILERON_CHANNEL] = surface_to_channel(command.aileron);
    channels[ELEVATOR_CHANNEL] = surface_to_channel(command.elevator);
    channels[RUDDER_CHANNEL] = surface_to_channel(command.rudder);
    channels[THROTTLE_CHANNEL] = command.throttle[0].clamp(0.0, 1.0);
    channels
}

pub enum FlightAxisCommand {
    Stop,
}

/// State shared by the two halves of one FlightAxis link.
#[derive(Default)]
struct Link {
    rc_input: Mailbox<ControlSurfaceCommand>,
    output: Mailbox<ControlSurfaceCommand>,
}

struct FlightAxisClient {
    client: reqwest::blocking::Client,
    url: String,
    controller_started: bool,
}

impl FlightAxisClient {
    fn new(url: String) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url,
            controller_started: false,
        })
    }

    fn exchange(
        &mut self,
        channels: &[f64; CHANNEL_COUNT],
        previous: &FlightAxisState,
    ) -> Result<FlightAxisState, TransportError> {
        self.exchange_raw(channels, previous)
            .map_err(|e| TransportError::ConnectionFailed(format!("{e:#}")))
            .and_then(|response| decode_exchange(&response))
    }

    fn exchange_raw(
        &mut self,
        channels: &[f64; CHANNEL_COUNT],
        previous: &FlightAxisState,
    ) -> anyhow::Result<String> {
        if !self.controller_started
            || !previous.controller_is_active
            || previous.reset_button_has_been_pressed
        {
            log::info!("Restoring original controller device, resetting aircraft, and injecting UAV control");

            // call a restore first. This allows us to connect after the aircraft is changed in RealFlight
            self.soap_restore_original_controller_device()?;

            // call a reset to ensure the aircraft is in a known state
            self.soap_reset_aircraft()?;

            // call a inject to start the controller
            self.soap_inject_uav_control()?;

            self.controller_started = true;
        }

        self.soap_exchange_data(channels)
    }

    fn soap_restore_original_controller_device(&self) -> anyhow::Result<()> {
        self.send_soap_action(
            "RestoreOriginalControllerDevice",
            soap_payload!("<RestoreOriginalControllerDevice><a>1</a><b>2</b></RestoreOriginalControllerDevice>"),
        )?;
        Ok(())
    }

    fn soap_reset_aircraft(&self) -> anyhow::Result<()> {
        self.send_soap_action(
            "ResetAircraft",
            soap_payload!("<ResetAircraft><a>1</a><b>2</b></ResetAircraft>"),
        )?;
        Ok(())
    }

    fn soap_inject_uav_control(&self) -> anyhow::Result<()> {
        self.send_soap_action(
            "InjectUAVControllerInterface",
            soap_payload!(
                "<InjectUAVControllerInterface><a>1</a><b>2</b></InjectUAVControllerInterface>"
            ),
        )?;
        Ok(())
    }

    fn soap_exchange_data(&self, channels: &[f64; CHANNEL_COUNT]) -> anyhow::Result<String> {
        let payload = soap_payload!(format!(
            r#"<ExchangeData>
                        <pControlInputs>
                            <m-selectedChannels>4095</m-selectedChannels>
                            <m-channelValues-0to1>
                            {}
                            </m-channelValues-0to1>
                        </pControlInputs>
                    </ExchangeData>"#,
            channels
                .iter()
                .map(|x| format!("<item>{}</item>", x))
                .collect::<Vec<String>>()
                .join("")
        ));
        self.send_soap_action("ExchangeData", payload)
    }

    fn send_soap_action(&self, soap_action: &str, payload: String) -> anyhow::Result<String> {
        let res = self
            .client
            .post(&self.url)
            .header("content-type", "text/xml;charset='UTF-8'")
            .header("soapaction", soap_action)
            .header("connection", "Keep-Alive")
            .body(payload)
            .send()
            .with_context(|| format!("{soap_action} request to {} failed", self.url))?;

        if res.status().is_success() {
            Ok(res.text()?)
        } else {
            bail!("Failed to send SOAP action {soap_action}: {:?}", res.status())
        }
    }
}

/// Parse an `ExchangeData` response, reporting malformed ones as protocol errors.
pub fn decode_exchange(response: &str) -> Result<FlightAxisState, TransportError> {
    parse_response(response).map_err(|e| TransportError::Protocol(format!("{e:#}")))
}

/// Parse an `ExchangeData` response.
pub fn parse_response(response: &str) -> anyhow::Result<FlightAxisState> {
    let mut reader = Reader::from_str(response);
    reader.trim_text(true);

    let mut state = FlightAxisState::default();
    let mut parsed_input = false;
    let mut parsed_orientation = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match name {
                    QName(b"m-channelValues-0to1") => {
                        state.rc_channels = parse_rc_input(&mut reader)?;
                        parsed_input = true;
                    }
                    QName(b"m-orientationQuaternion-W") => {
                        state.orientation.0 = read_f64(&mut reader, name)?;
                        parsed_orientation += 1;
                    }
                    QName(b"m-orientationQuaternion-X") => {
                        state.orientation.1 = read_f64(&mut reader, name)?;
                        parsed_orientation += 1;
                    }
                    QName(b"m-orientationQuaternion-Y") => {
                        state.orientation.2 = read_f64(&mut reader, name)?;
                        parsed_orientation += 1;
                    }
                    QName(b"m-orientationQuaternion-Z") => {
                        state.orientation.3 = read_f64(&mut reader, name)?;
                        parsed_orientation += 1;
                    }
                    QName(b"m-airspeed-MPS") => state.airspeed = read_f64(&mut reader, name)?,
                    QName(b"m-altitudeAGL-MTR") => state.altitude = read_f64(&mut reader, name)?,
                    QName(b"m-flightAxisControllerIsActive") => {
                        state.controller_is_active = read_bool(&mut reader, name)?;
                    }
                    QName(b"m-resetButtonHasBeenPressed") => {
                        state.reset_button_has_been_pressed = read_bool(&mut reader, name)?;
                        if state.reset_button_has_been_pressed {
                            log::info!("Reset button has been pressed");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("Error at position {}: {:?}", reader.buffer_position(), e),
            _ => {}
        }
    }

    if !parsed_input || parsed_orientation != 4 {
        bail!("Failed to parse input or aircraft state");
    }
    Ok(state)
}

fn parse_rc_input(reader: &mut Reader<&[u8]>) -> anyhow::Result<[f64; CHANNEL_COUNT]> {
    let mut channels = [0.0; CHANNEL_COUNT];
    let mut count = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name() {
                QName(b"item") => {
                    if count == CHANNEL_COUNT {
                        bail!("More than {CHANNEL_COUNT} channel values");
                    }
                    channels[count] = read_f64(reader, QName(b"item"))?;
                    count += 1;
                }
                name => bail!("Unexpected tag {:?}", name),
            },
            Ok(Event::End(e)) if e.name() == QName(b"m-channelValues-0to1") => break,
            Ok(Event::Eof) => bail!("Unexpected EOF"),
            Err(e) => bail!("Error while parsing input: {:?}", e),
            Ok(_) => {}
        }
    }
    if count != CHANNEL_COUNT {
        bail!("Expected {CHANNEL_COUNT} channel values, got {count}");
    }
    Ok(channels)
}

fn read_f64(reader: &mut Reader<&[u8]>, name: QName) -> anyhow::Result<f64> {
    let text = reader.read_text(name)?;
    text.trim()
        .parse::<f64>()
        .with_context(|| format!("Failed to parse {:?} value {:?}", name, text))
}

fn read_bool(reader: &mut Reader<&[u8]>, name: QName) -> anyhow::Result<bool> {
    Ok(reader.read_text(name)?.trim() == "true")
}

fn notify(callback: &Option<DisconnectCallback>, disconnected: bool) {
    if let Some(callback) = callback {
        callback(disconnected);
    }
}

/// Stop requested (or the owning connection went away).
fn should_stop(result: Result<FlightAxisCommand, mpsc::RecvTimeoutError>) -> bool {
    !matches!(result, Err(mpsc::RecvTimeoutError::Timeout))
}

fn run_exchange(
    mut client: FlightAxisClient,
    link: Arc<Link>,
    mut on_sample: SampleHandler,
    disconnect: Option<DisconnectCallback>,
    to_worker_rx: mpsc::Receiver<FlightAxisCommand>,
    retry_delay: Duration,
) {
    let mut state = FlightAxisState::default();
    let mut command = None;
    let mut failed_exchanges = 0;
    let mut last_loop_time = Instant::now();

    loop {
        match to_worker_rx.try_recv() {
            Ok(FlightAxisCommand::Stop) | Err(mpsc::TryRecvError::Disconnected) => return,
            Err(mpsc::TryRecvError::Empty) => {}
        }
        let dt = last_loop_time.elapsed();
        if dt < EXCHANGE_INTERVAL {
            thread::sleep(EXCHANGE_INTERVAL - dt);
            continue;
        }
        last_loop_time = Instant::now();

        if let Some(latest) = link.output.take() {
            command = Some(latest);
        }
        let channels = match &command {
            Some(command) => command_channels(&state.rc_channels, command),
            None => state.rc_channels,
        };

        match client.exchange(&channels, &state) {
            Ok(next) => {
                if failed_exchanges >= MAX_FAILED_EXCHANGES {
                    log::info!("FlightAxis link restored");
                    notify(&disconnect, false);
                }
                failed_exchanges = 0;
                state = next;
                log::trace!(
                    "airspeed {:.1} m/s, altitude {:.1} m",
                    state.airspeed,
                    state.altitude
                );
                link.rc_input.publish(state.rc_command());
                on_sample(&state.fdm_sample());
            }
            Err(e) => {
                failed_exchanges += 1;
                client.controller_started = false;
                log::error!("FlightAxis exchange failed: {e}");
                if failed_exchanges == MAX_FAILED_EXCHANGES {
                    notify(&disconnect, true);
                }
                if should_stop(to_worker_rx.recv_timeout(retry_delay)) {
                    return;
                }
            }
        }
    }
}

fn run_commands(
    link: Arc<Link>,
    mut on_command: CommandHandler,
    to_worker_rx: mpsc::Receiver<FlightAxisCommand>,
) {
    let mut buffer = ControlSurfaceCommand::default();
    loop {
        if let Some(rc) = link.rc_input.take() {
            buffer = rc;
        }
        if let Some(command) = on_command(buffer) {
            link.output.publish(command);
        }
        if should_stop(to_worker_rx.recv_timeout(COMMAND_INTERVAL)) {
            return;
        }
    }
}

type Worker = Box<dyn FnOnce(mpsc::Receiver<FlightAxisCommand>, Option<DisconnectCallback>) + Send>;

pub struct FlightAxisConnection {
    name: &'static str,
    worker: Option<Worker>,
    disconnect: Option<DisconnectCallback>,
    to_worker_tx: Option<mpsc::Sender<FlightAxisCommand>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl FlightAxisConnection {
    fn new(name: &'static str, worker: Worker) -> Self {
        Self {
            name,
            worker: Some(worker),
            disconnect: None,
            to_worker_tx: None,
            worker_thread: None,
        }
    }
}

impl Connection for FlightAxisConnection {
    fn set_disconnect_callback(&mut self, callback: DisconnectCallback) {
        self.disconnect = Some(callback);
    }

    fn start(&mut self) -> Result<(), TransportError> {
        let worker = self.worker.take().ok_or_else(|| {
            TransportError::ConnectionFailed(format!("{} was already started", self.name))
        })?;
        let (to_worker_tx, to_worker_rx) = mpsc::channel();
        let disconnect = self.disconnect.clone();
        let handle = thread::Builder::new()
            .name(self.name.to_string())
            .spawn(move || worker(to_worker_rx, disconnect))?;
        self.worker_thread = Some(handle);
        self.to_worker_tx = Some(to_worker_tx);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.to_worker_tx.take() {
            let _ = tx.send(FlightAxisCommand::Stop);
        }
        if let Some(handle) = self.worker_thread.take() {
            if handle.join().is_err() {
                log::error!("{} worker panicked", self.name);
            }
        }
    }
}

/// Hands out the two halves of a FlightAxis link on `host:port`.
pub struct FlightAxisConnector {
    port: u16,
    link: Arc<Link>,
    retry_delay: Duration,
}

impl FlightAxisConnector {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            link: Arc::new(Link::default()),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Pause between exchanges after one failed.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl Connector for FlightAxisConnector {
    fn connect_inbound(
        &mut self,
        host: &str,
        port: Port,
        on_sample: SampleHandler,
    ) -> Result<Box<dyn Connection>, TransportError> {
        log::debug!("FlightAxis exchanges state on port {}, FDM ports {:?} unused", self.port, port);
        let url = format!("http://{host}:{}", self.port);
        let client = FlightAxisClient::new(url)
            .map_err(|e| TransportError::ConnectionFailed(format!("{e:#}")))?;

        self.link.rc_input.clear();
        self.link.output.clear();
        let link = self.link.clone();
        let retry_delay = self.retry_delay;
        let worker: Worker = Box::new(move |rx, disconnect| {
            run_exchange(client, link, on_sample, disconnect, rx, retry_delay)
        });
        Ok(Box::new(FlightAxisConnection::new("flight-axis-fdm", worker)))
    }

    fn connect_outbound(
        &mut self,
        _host: &str,
        port: Port,
        on_command: CommandHandler,
    ) -> Result<Box<dyn Connection>, TransportError> {
        log::debug!("FlightAxis commands ride on the state exchange, Ctrls ports {:?} unused", port);
        let link = self.link.clone();
        let worker: Worker = Box::new(move |rx, _disconnect| run_commands(link, on_command, rx));
        Ok(Box::new(FlightAxisConnection::new("flight-axis-ctrls", worker)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::{TcpListener, TcpStream},
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    const FDM_PORT: Port = Port::new(5501, 5502);

    fn response(channels: &str, state: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Body>
                <ReturnData>
                  <m-previousInputsState>
                    <m-selectedChannels>-1</m-selectedChannels>
                    <m-channelValues-0to1>{channels}</m-channelValues-0to1>
                  </m-previousInputsState>
                  <m-aircraftState>{state}</m-aircraftState>
                  <m-notifications>
                    <m-resetButtonHasBeenPressed>false</m-resetButtonHasBeenPressed>
                  </m-notifications>
                </ReturnData>
              </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>"#
        )
    }

    fn items(values: &[f64]) -> String {
        values.iter().map(|v| format!("<item>{v}</item>")).collect()
    }

    const LEVEL_STATE: &str = r#"
        <m-airspeed-MPS>21.5</m-airspeed-MPS>
        <m-altitudeAGL-MTR>120.25</m-altitudeAGL-MTR>
        <m-orientationQuaternion-X>0</m-orientationQuaternion-X>
        <m-orientationQuaternion-Y>0</m-orientationQuaternion-Y>
        <m-orientationQuaternion-Z>0</m-orientationQuaternion-Z>
        <m-orientationQuaternion-W>1</m-orientationQuaternion-W>
        <m-flightAxisControllerIsActive>true</m-flightAxisControllerIsActive>
    "#;

    #[test]
    fn test_parse_response() {
        let channels = [0.25, 0.75, 0.6, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let state = parse_response(&response(&items(&channels), LEVEL_STATE)).unwrap();

        assert_eq!(state.rc_channels, channels);
        assert_eq!(state.orientation, (1.0, 0.0, 0.0, 0.0));
        assert_eq!(state.airspeed, 21.5);
        assert_eq!(state.altitude, 120.25);
        assert!(state.controller_is_active);
        assert!(!state.reset_button_has_been_pressed);

        let sample = state.fdm_sample();
        assert_eq!(sample, FdmSample::default());

        let rc = state.rc_command();
        assert_eq!(rc.aileron, -0.5);
        assert_eq!(rc.elevator, 0.5);
        assert_eq!(rc.rudder, 0.0);
        assert_eq!(rc.throttle[0], 0.6);
    }

    #[test]
    fn test_parse_response_requires_aircraft_state() {
        let channels = [0.5; CHANNEL_COUNT];
        let err = parse_response(&response(&items(&channels), "")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse input or aircraft state"));
    }

    #[test]
    fn test_parse_response_rejects_short_channel_list() {
        let err = parse_response(&response(&items(&[0.5; 4]), LEVEL_STATE)).unwrap_err();
        assert!(err.to_string().contains("Expected 12 channel values"));
    }

    #[test]
    fn test_command_overlays_pilot_channels() {
        let base = FlightAxisState::default().rc_channels;
        let command = ControlSurfaceCommand::new(-0.5, 0.5, 2.0, 0.6);
        let channels = command_channels(&base, &command);
        assert_eq!(channels[AILERON_CHANNEL], 1.0);
        assert_eq!(channels[ELEVATOR_CHANNEL], 0.25);
        assert_eq!(channels[RUDDER_CHANNEL], 0.75);
        assert_eq!(channels[THROTTLE_CHANNEL], 0.6);
        assert_eq!(channels[4..], base[4..]);
    }

    #[test]
    fn test_outbound_connection_publishes_commands() {
        let mut connector = FlightAxisConnector::new(DEFAULT_FLIGHT_AXIS_PORT);
        let on_command: CommandHandler = Box::new(|mut buffer| {
            buffer.elevator = 0.25;
            Some(buffer)
        });
        let mut ctrls = connector
            .connect_outbound("localhost", Port::new(5503, 5504), on_command)
            .unwrap();
        connector.link.rc_input.publish(ControlSurfaceCommand::new(0.0, 0.0, 0.0, 0.4));
        ctrls.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let command = loop {
            if let Some(command) = connector.link.output.take() {
                break command;
            }
            assert!(Instant::now() < deadline, "no command published");
            thread::sleep(Duration::from_millis(5));
        };
        ctrls.stop();

        assert_eq!(command.elevator, 0.25);
        assert_eq!(command.throttle[0], 0.4);
    }

    #[test]
    fn test_malformed_exchange_is_a_protocol_error() {
        let err = decode_exchange("<ReturnData><m-aircraftState/></ReturnData>").unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)), "got {err:?}");

        let channels = [0.5; CHANNEL_COUNT];
        assert!(decode_exchange(&response(&items(&channels), LEVEL_STATE)).is_ok());
    }

    fn disconnect_counter() -> (DisconnectCallback, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let lost = Arc::new(AtomicUsize::new(0));
        let restored = Arc::new(AtomicUsize::new(0));
        let (on_lost, on_restored) = (lost.clone(), restored.clone());
        let callback: DisconnectCallback = Arc::new(move |disconnected| {
            if disconnected {
                on_lost.fetch_add(1, Ordering::SeqCst);
            } else {
                on_restored.fetch_add(1, Ordering::SeqCst);
            }
        });
        (callback, lost, restored)
    }

    fn wait_for(counter: &AtomicUsize, at_least: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < at_least {
            assert!(Instant::now() < deadline, "timed out waiting for {at_least}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Answers SOAP actions on a keep-alive connection, `reply` for `ExchangeData`.
    fn serve(stream: TcpStream, reply: &str) {
        let Ok(read_half) = stream.try_clone() else {
            return;
        };
        let mut reader = BufReader::new(read_half);
        let mut writer = stream;
        loop {
            let mut content_length = 0;
            let mut soap_action = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    match name.trim().to_ascii_lowercase().as_str() {
                        "content-length" => content_length = value.trim().parse().unwrap_or(0),
                        "soapaction" => soap_action = value.trim().to_string(),
                        _ => {}
                    }
                }
            }
            let mut body = vec![0; content_length];
            if reader.read_exact(&mut body).is_err() {
                return;
            }
            let payload = if soap_action == "ExchangeData" { reply } else { "<ok/>" };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
                payload.len(),
                payload
            );
            if writer.write_all(response.as_bytes()).is_err() {
                return;
            }
        }
    }

    /// Local FlightAxis stand-in that hangs up on every client until `serving` is set.
    fn spawn_simulator(serving: Arc<AtomicBool>, reply: String) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    break;
                };
                if serving.load(Ordering::SeqCst) {
                    let reply = reply.clone();
                    thread::spawn(move || serve(stream, &reply));
                }
            }
        });
        port
    }

    #[test]
    fn test_failed_exchanges_report_one_disconnect() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let (on_disconnect, lost, restored) = disconnect_counter();

        let mut connector =
            FlightAxisConnector::new(port).with_retry_delay(Duration::from_millis(10));
        let mut fdm = connector
            .connect_inbound("127.0.0.1", FDM_PORT, Box::new(|_: &FdmSample| {}))
            .unwrap();
        fdm.set_disconnect_callback(on_disconnect);
        fdm.start().unwrap();

        wait_for(&lost, 1);
        // Keep failing well past the threshold.
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        fdm.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(lost.load(Ordering::SeqCst), 1);
        assert_eq!(restored.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_link_recovers_after_disconnect() {
        let serving = Arc::new(AtomicBool::new(false));
        let channels = [0.5; CHANNEL_COUNT];
        let port = spawn_simulator(serving.clone(), response(&items(&channels), LEVEL_STATE));
        let (on_disconnect, lost, restored) = disconnect_counter();

        let samples = Arc::new(AtomicUsize::new(0));
        let counter = samples.clone();
        let on_sample: SampleHandler = Box::new(move |_: &FdmSample| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut connector =
            FlightAxisConnector::new(port).with_retry_delay(Duration::from_millis(10));
        let mut fdm = connector
            .connect_inbound("127.0.0.1", FDM_PORT, on_sample)
            .unwrap();
        fdm.set_disconnect_callback(on_disconnect);
        fdm.start().unwrap();

        wait_for(&lost, 1);
        assert_eq!(samples.load(Ordering::SeqCst), 0);

        serving.store(true, Ordering::SeqCst);
        wait_for(&restored, 1);
        wait_for(&samples, 1);
        fdm.stop();

        assert_eq!(lost.load(Ordering::SeqCst), 1);
        assert_eq!(restored.load(Ordering::SeqCst), 1);
        assert_eq!(connector.link.rc_input.take().map(|rc| rc.elevator), Some(0.0));
    }
}
