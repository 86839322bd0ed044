use std::fmt::Display;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use semivibe_device::{check_access, resolve, DeviceState, RegisterError, Snapshot};
use semivibe_frame::{
    decode_frame, encode_response, ErrorCode, FrameConfig, FrameError, FrameReader, FrameWriter,
    Inbound, FRAME_LEN,
};
use semivibe_transport::{DeviceStream, TcpEndpoint};
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::greeting::send_greeting;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Device server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often the accept loop polls and how long a connection read waits
    /// before checking for a stop request.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Override the poll interval. Clamped to `1ms..=1s`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self
    }
}

/// Closure-based access to the live device state, for tests and tooling.
#[derive(Clone)]
pub struct DirectAccess {
    state: Arc<Mutex<DeviceState>>,
}

impl DirectAccess {
    /// Run `f` with exclusive access to the device state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> ServerResult<R> {
        let mut guard = lock(&self.state)?;
        Ok(f(&mut guard))
    }

    /// Copy of every register value.
    pub fn snapshot(&self) -> ServerResult<Snapshot> {
        self.with_state(|state| state.snapshot())
    }
}

/// Cloneable stop switch for a running server.
#[derive(Clone, Default)]
pub struct ServerControl {
    stopped: Arc<AtomicBool>,
    active: Arc<Mutex<Option<DeviceStream>>>,
}

impl ServerControl {
    /// Request the server to stop and close the active connection.
    ///
    /// Idempotent. The accept loop notices within one poll interval.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("device server stop requested");
        }
        if let Ok(active) = self.active.lock() {
            if let Some(stream) = active.as_ref() {
                if let Err(err) = stream.shutdown() {
                    warn!(error = %err, "failed to shut down active connection");
                }
            }
        }
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn set_active(&self, stream: Option<DeviceStream>) {
        if let Ok(mut active) = self.active.lock() {
            *active = stream;
        }
    }
}

/// Single-connection TCP server for one simulated device.
pub struct DeviceServer {
    endpoint: TcpEndpoint,
    state: Arc<Mutex<DeviceState>>,
    config: ServerConfig,
    control: ServerControl,
}

impl DeviceServer {
    /// Bind with default configuration and a default device.
    pub fn bind(addr: impl ToSocketAddrs + Display) -> ServerResult<Self> {
        Self::bind_with_config(addr, ServerConfig::default())
    }

    /// Bind with explicit configuration and a default device.
    pub fn bind_with_config(
        addr: impl ToSocketAddrs + Display,
        config: ServerConfig,
    ) -> ServerResult<Self> {
        let endpoint = TcpEndpoint::bind(addr)?;
        Ok(Self {
            endpoint,
            state: Arc::new(Mutex::new(DeviceState::new())),
            config,
            control: ServerControl::default(),
        })
    }

    /// Replace the device state served by this server.
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = Arc::new(Mutex::new(state));
        self
    }

    /// Bound address. Reports the real port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Handle to the live device state.
    pub fn direct_access(&self) -> DirectAccess {
        DirectAccess {
            state: Arc::clone(&self.state),
        }
    }

    /// Stop switch usable from another thread or a signal handler.
    pub fn control(&self) -> ServerControl {
        self.control.clone()
    }

    /// Request a stop. Same as `self.control().stop()`.
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Current configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the accept loop on a worker thread.
    pub fn start(self) -> ServerResult<ServerHandle> {
        let local_addr = self.local_addr();
        let access = self.direct_access();
        let control = self.control();
        let thread = thread::Builder::new()
            .name("semivibe-server".to_string())
            .spawn(move || self.run())
            .map_err(|err| ServerError::Transport(err.into()))?;

        Ok(ServerHandle {
            local_addr,
            access,
            control,
            thread: Some(thread),
        })
    }

    /// Run the accept loop on the calling thread until stopped.
    ///
    /// Connections are served one at a time. A failing connection is logged
    /// and closed; the server keeps listening.
    pub fn run(&self) -> ServerResult<()> {
        info!(addr = %self.local_addr(), "device server listening");

        while !self.control.is_stopped() {
            let stream = match self.endpoint.try_accept() {
                Ok(Some(stream)) => stream,
                Ok(None) => {
                    thread::sleep(self.config.poll_interval);
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(self.config.poll_interval);
                    continue;
                }
            };

            let peer = stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            info!(%peer, "client connected");

            match self.serve_connection(stream) {
                Ok(()) => info!(%peer, "client connection closed"),
                Err(err) => warn!(%peer, error = %err, "client connection failed"),
            }
            self.control.set_active(None);
        }

        info!("device server stopped");
        Ok(())
    }

    fn serve_connection(&self, stream: DeviceStream) -> ServerResult<()> {
        self.control.set_active(Some(stream.try_clone()?));
        // A stop that raced the accept would have missed this stream.
        if self.control.is_stopped() {
            stream.shutdown()?;
            return Ok(());
        }

        let frame_config = FrameConfig {
            read_timeout: Some(self.config.poll_interval),
            write_timeout: Some(WRITE_TIMEOUT),
        };
        let reader_stream = stream.try_clone()?;
        let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

        send_greeting(&mut writer)?;

        loop {
            if self.control.is_stopped() {
                break;
            }

            match reader.read_frame() {
                Ok(Inbound::Exit) => {
                    info!("client sent exit");
                    break;
                }
                Ok(Inbound::Frame(raw)) => match lock(&self.state) {
                    Ok(mut state) => {
                        let response = dispatch(&mut state, &raw);
                        drop(state);
                        writer.write_raw(&response)?;
                    }
                    Err(err) => {
                        warn!(error = %err, "answering general error");
                        writer.write_error(ErrorCode::General)?;
                    }
                },
                Err(FrameError::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(FrameError::ConnectionClosed) => {
                    debug!("client closed the stream");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        writer.get_ref().shutdown()?;
        Ok(())
    }
}

/// Handle to a server running on a worker thread. Stops the server on drop.
pub struct ServerHandle {
    local_addr: SocketAddr,
    access: DirectAccess,
    control: ServerControl,
    thread: Option<JoinHandle<ServerResult<()>>>,
}

impl ServerHandle {
    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the live device state.
    pub fn direct_access(&self) -> DirectAccess {
        self.access.clone()
    }

    /// Stop switch for this server.
    pub fn control(&self) -> ServerControl {
        self.control.clone()
    }

    /// Stop the server and wait for the worker thread. Idempotent.
    pub fn stop(&mut self) -> ServerResult<()> {
        self.control.stop();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ServerError::ThreadPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "device server stopped with error");
        }
    }
}

/// Answer one received frame against `state`.
///
/// Never fails: bytes that are not hex or do not resolve to a register yield
/// `2FFFFF`, a wrong direction yields `1FFFFF` and a runtime refusal yields
/// `3FFFFF`.
pub fn dispatch(state: &mut DeviceState, raw: &[u8]) -> [u8; FRAME_LEN] {
    let frame = match decode_frame(raw) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(error = %err, "undecodable frame");
            return *ErrorCode::Invalid.frame();
        }
    };

    let outcome = resolve(frame.region, frame.offset, frame.rw).and_then(|(register, operation)| {
        check_access(register, operation)?;
        state.apply(register, operation, frame.data)
    });

    match outcome {
        Ok(value) => {
            debug!(command = %frame, value, "frame applied");
            encode_response(frame.region, frame.offset, value)
        }
        Err(err) => {
            debug!(command = %frame, error = %err, "frame rejected");
            *error_code(&err).frame()
        }
    }
}

fn error_code(err: &RegisterError) -> ErrorCode {
    match err {
        RegisterError::Invalid { .. } => ErrorCode::Invalid,
        RegisterError::Forbidden { .. } => ErrorCode::Forbidden,
        RegisterError::General { .. } => ErrorCode::General,
    }
}

fn lock(state: &Mutex<DeviceState>) -> ServerResult<MutexGuard<'_, DeviceState>> {
    state.lock().map_err(|_| ServerError::StatePoisoned)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    use semivibe_device::{Component, Sensor};

    use super::*;

    fn exchange(state: &mut DeviceState, command: &[u8]) -> String {
        String::from_utf8(dispatch(state, command).to_vec()).expect("response should be ascii")
    }

    #[test]
    fn dispatch_read_write() {
        let mut state = DeviceState::new();
        assert_eq!(exchange(&mut state, b"310180"), "310080");
        assert_eq!(exchange(&mut state, b"310000"), "310080");
        assert_eq!(exchange(&mut state, b"211000"), "211016");
    }

    #[test]
    fn dispatch_maps_errors_to_frames() {
        let mut state = DeviceState::new();
        assert_eq!(exchange(&mut state, b"100101"), "1FFFFF");
        assert_eq!(exchange(&mut state, b"500000"), "2FFFFF");
        assert_eq!(exchange(&mut state, b"3102AA"), "2FFFFF");
        assert_eq!(exchange(&mut state, b"hello!"), "2FFFFF");
        assert_eq!(exchange(&mut state, b"3"), "2FFFFF");
    }

    #[test]
    fn dispatch_powered_off_actuator_is_general() {
        let mut state = DeviceState::new();
        assert_eq!(exchange(&mut state, b"4FC100"), "4FC000");
        assert_eq!(exchange(&mut state, b"310101"), "3FFFFF");
        assert_eq!(exchange(&mut state, b"310000"), "310000");
    }

    #[test]
    fn dispatch_lowercase_command_echoes_uppercase() {
        let mut state = DeviceState::new();
        assert_eq!(exchange(&mut state, b"4fe0ff"), "4FE000");
    }

    #[test]
    fn config_clamps_poll_interval() {
        let config = ServerConfig::default().with_poll_interval(Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        let config = ServerConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(ServerConfig::default().poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn start_greets_and_serves() {
        let server = DeviceServer::bind("127.0.0.1:0").expect("server should bind");
        let mut handle = server.start().expect("server should start");

        let mut client = TcpStream::connect(handle.local_addr()).expect("client should connect");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout should apply");

        let mut ack = [0u8; 3];
        client.read_exact(&mut ack).expect("greeting should arrive");
        assert_eq!(&ack, b"ACK");

        client.write_all(b"330120").expect("command should send");
        let mut response = [0u8; 6];
        client.read_exact(&mut response).expect("response should arrive");
        assert_eq!(&response, b"330000");

        handle.stop().expect("server should stop");
        handle.stop().expect("second stop should be a no-op");
    }

    #[test]
    fn direct_access_injects_state() {
        let server = DeviceServer::bind("127.0.0.1:0").expect("server should bind");
        let access = server.direct_access();
        access
            .with_state(|state| {
                state.set_sensor_reading(Sensor::A, 0x30);
                state.set_error(Component::Fan, true);
            })
            .expect("state should be reachable");

        let snapshot = access.snapshot().expect("snapshot should succeed");
        assert_eq!(snapshot.sensor_a_reading, 0x30);
        assert_eq!(snapshot.error_state, Component::Fan.bit());
    }

    #[test]
    fn stop_wakes_idle_connection() {
        let server = DeviceServer::bind_with_config(
            "127.0.0.1:0",
            ServerConfig::default().with_poll_interval(Duration::from_millis(20)),
        )
        .expect("server should bind");
        let mut handle = server.start().expect("server should start");

        let mut client = TcpStream::connect(handle.local_addr()).expect("client should connect");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout should apply");
        let mut ack = [0u8; 3];
        client.read_exact(&mut ack).expect("greeting should arrive");

        handle.stop().expect("server should stop");

        let mut buf = [0u8; 1];
        let read = client.read(&mut buf).unwrap_or(0);
        assert_eq!(read, 0);
    }

    #[test]
    fn poisoned_state_answers_general_and_keeps_connection() {
        let server = DeviceServer::bind_with_config(
            "127.0.0.1:0",
            ServerConfig::default().with_poll_interval(Duration::from_millis(20)),
        )
        .expect("server should bind");
        let access = server.direct_access();
        let handle = server.start().expect("server should start");

        let poisoner = thread::spawn(move || {
            let _ = access.with_state(|_| panic!("poison the device state"));
        });
        assert!(poisoner.join().is_err());
        assert!(matches!(
            handle.direct_access().snapshot(),
            Err(ServerError::StatePoisoned)
        ));

        let mut client = TcpStream::connect(handle.local_addr()).expect("client should connect");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout should apply");
        let mut ack = [0u8; 3];
        client.read_exact(&mut ack).expect("greeting should arrive");

        for _ in 0..2 {
            client.write_all(b"310000").expect("command should send");
            let mut response = [0u8; 6];
            client
                .read_exact(&mut response)
                .expect("general error should arrive");
            assert_eq!(&response, b"3FFFFF");
        }
    }
}
