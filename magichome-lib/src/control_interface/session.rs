use std::io;

use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::config::SessionConfig;
use crate::control_interface::{DeviceAddress, DeviceState};
use crate::error::{Error, Result};
use crate::protocol::preset::PresetPattern;
use crate::protocol::timer::{TimerBlock, TimerSlot, TimerUpload};
use crate::protocol::{
    self, percent_to_byte, speed_to_delay, Command, StateResponse, Transition,
    CLOCK_RESPONSE_LEN, CUSTOM_PATTERN_SLOTS, RGB, STATE_RESPONSE_LEN, TIMERS_RESPONSE_LEN,
};

/// Where a session's TCP link currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// One TCP connection to one controller, plus the last known state of that
/// controller.
///
/// The link to these controllers is unreliable. A failed connect is a state,
/// not an error; a failed send is retried once over a fresh connection and
/// then reported. Calls must be serialized by the owner, which the `&mut self`
/// receivers enforce.
#[derive(Debug)]
pub struct DeviceSession {
    address: DeviceAddress,
    config: SessionConfig,
    stream: Option<TcpStream>,
    link: LinkState,
    state: DeviceState,
}

impl DeviceSession {
    /// Creates a disconnected session. The first write connects on demand.
    pub fn new(address: DeviceAddress, config: SessionConfig) -> Self {
        DeviceSession {
            address,
            config,
            stream: None,
            link: LinkState::Disconnected,
            state: DeviceState::default(),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    /// Opens a fresh connection, dropping any existing one. Returns whether
    /// the session ended up connected.
    pub async fn connect(&mut self) -> bool {
        match self.reconnect().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to connect to {}: {}", self.address, e);
                false
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Error shutting down connection to {}: {}", self.address, e);
            }
            info!("Disconnected from {}", self.address);
        }
        self.link = LinkState::Disconnected;
    }

    async fn reconnect(&mut self) -> io::Result<()> {
        self.mark_disconnected();
        self.link = LinkState::Connecting;
        let target = self.address.socket_addr();
        let connecting = TcpStream::connect(target);
        let opened = match timeout(self.config.connect_timeout(), connecting).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        };
        match opened {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle on {}: {}", self.address, e);
                }
                self.stream = Some(stream);
                self.link = LinkState::Connected;
                info!("Connected to {}", self.address);
                Ok(())
            }
            Err(e) => {
                self.link = LinkState::Disconnected;
                Err(e)
            }
        }
    }

    fn mark_disconnected(&mut self) {
        self.stream = None;
        self.link = LinkState::Disconnected;
    }

    /// Appends the checksum to `payload` and sends it. On failure the frame is
    /// resent once over a new connection; if that fails too, the frame is
    /// dropped and `ConnectionFailed` is returned.
    pub async fn write(&mut self, payload: &[u8]) -> Result<()> {
        let frame = protocol::frame(payload);
        debug!("{} <- {}", self.address, hex::encode(&frame));

        let first_error = match self.send_raw(&frame).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        debug!(
            "Send to {} failed ({}), reconnecting once",
            self.address, first_error
        );

        let retried = match self.reconnect().await {
            Ok(()) => self.send_raw(&frame).await,
            Err(e) => Err(e),
        };
        retried.map_err(|source| {
            warn!("Dropping frame for {}: {}", self.address, source);
            Error::ConnectionFailed {
                address: self.address.to_string(),
                source,
            }
        })
    }

    async fn send_raw(&mut self, frame: &[u8]) -> io::Result<()> {
        let write_timeout = self.config.write_timeout();
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        };
        let result = match timeout(write_timeout, stream.write_all(frame)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        };
        if result.is_err() {
            self.mark_disconnected();
        }
        result
    }

    /// Reads until `expected` bytes have arrived, the read timeout elapses or
    /// the stream fails. Whatever arrived is returned, so the result may be
    /// shorter than requested. A short read drops the connection, since the
    /// rest of the reply could otherwise arrive in front of the next one.
    pub async fn read_exact(&mut self, expected: usize) -> Vec<u8> {
        let deadline = Instant::now() + self.config.read_timeout();
        let mut rx = vec![0u8; expected];
        let mut filled = 0;

        if let Some(stream) = self.stream.as_mut() {
            while filled < expected {
                let wait = deadline.saturating_duration_since(Instant::now());
                match timeout(wait, stream.read(&mut rx[filled..])).await {
                    Ok(Ok(0)) => {
                        debug!("{} closed the connection", self.address);
                        break;
                    }
                    Ok(Ok(count)) => filled += count,
                    Ok(Err(e)) => {
                        debug!("Read from {} failed: {}", self.address, e);
                        break;
                    }
                    Err(_) => {
                        debug!("Read from {} timed out", self.address);
                        break;
                    }
                }
            }
        }

        rx.truncate(filled);
        if filled < expected {
            self.mark_disconnected();
        }
        rx
    }

    async fn read_response(&mut self, expected: usize) -> Result<Vec<u8>> {
        let rx = self.read_exact(expected).await;
        if rx.len() < expected {
            warn!(
                "Short read from {}: expected {} bytes, received {}",
                self.address,
                expected,
                rx.len()
            );
            return Err(Error::ShortRead {
                expected,
                received: rx.len(),
            });
        }
        debug!("{} -> {}", self.address, hex::encode(&rx));
        Ok(rx)
    }

    async fn send(&mut self, command: &Command) -> Result<()> {
        self.write(&command.payload()).await
    }

    /// Queries the controller and updates the local state. On any failure the
    /// previous state is kept.
    pub async fn refresh_state(&mut self) -> Result<&DeviceState> {
        self.send(&Command::QueryState).await?;
        let rx = self.read_response(STATE_RESPONSE_LEN).await?;
        let response = StateResponse::parse(&rx)?;
        self.state.apply(&response);
        Ok(&self.state)
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.send(&Command::TurnOn).await?;
        self.state.set_power(true);
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.send(&Command::TurnOff).await?;
        self.state.set_power(false);
        Ok(())
    }

    pub async fn set_rgb(&mut self, color: RGB, persist: bool) -> Result<()> {
        self.send(&Command::SetRgb { color, persist }).await?;
        self.state.show_color(color, persist);
        Ok(())
    }

    /// `percent` is clamped to `0..=100`.
    pub async fn set_warm_white(&mut self, percent: i32, persist: bool) -> Result<()> {
        let level = percent_to_byte(percent);
        self.send(&Command::SetWarmWhite { level, persist }).await?;
        self.state.show_warm_white(level, persist);
        Ok(())
    }

    /// Rejects ids outside the preset range before anything is sent.
    pub async fn set_preset_pattern(&mut self, pattern: u8, speed: i32) -> Result<()> {
        let pattern = PresetPattern::new(pattern)?;
        let delay = speed_to_delay(speed);
        self.send(&Command::SetPresetPattern { pattern, delay }).await?;
        self.state.show_preset(pattern, delay);
        Ok(())
    }

    /// Only the first sixteen colors are used. An empty list sends nothing.
    pub async fn set_custom_pattern(
        &mut self,
        colors: &[RGB],
        speed: i32,
        transition: Transition,
    ) -> Result<()> {
        if colors.is_empty() {
            warn!("No colors for custom pattern on {}, aborting", self.address);
            return Err(Error::EmptyCustomPattern);
        }
        if colors.len() > CUSTOM_PATTERN_SLOTS {
            warn!(
                "Too many colors for custom pattern ({}), truncating list to {}",
                colors.len(),
                CUSTOM_PATTERN_SLOTS
            );
        }
        let delay = speed_to_delay(speed);
        let command = Command::SetCustomPattern {
            colors: colors.iter().take(CUSTOM_PATTERN_SLOTS).copied().collect(),
            delay,
            transition,
        };
        self.send(&command).await?;
        self.state.show_custom(delay);
        Ok(())
    }

    pub async fn get_timers(&mut self) -> Result<TimerBlock> {
        self.send(&Command::QueryTimers).await?;
        let rx = self.read_response(TIMERS_RESPONSE_LEN).await?;
        protocol::parse_timers(&rx)
    }

    /// Replaces the controller's six timers, judging expiry against the local
    /// clock.
    pub async fn send_timers(&mut self, slots: &[TimerSlot]) -> Result<TimerUpload> {
        self.send_timers_at(slots, Local::now().naive_local()).await
    }

    pub async fn send_timers_at(
        &mut self,
        slots: &[TimerSlot],
        now: NaiveDateTime,
    ) -> Result<TimerUpload> {
        let upload = TimerBlock::prepare(slots, now);
        self.send(&Command::SendTimers(upload.block)).await?;
        // acknowledgement, contents unknown
        self.read_response(1).await?;
        self.read_response(3).await?;
        Ok(upload)
    }

    /// Reads the controller's clock. A reply that is not a valid date yields
    /// `Ok(None)`.
    pub async fn get_clock(&mut self) -> Result<Option<NaiveDateTime>> {
        self.send(&Command::QueryClock).await?;
        let rx = self.read_response(CLOCK_RESPONSE_LEN).await?;
        match protocol::parse_clock(&rx) {
            Ok(clock) => Ok(Some(clock)),
            Err(e @ Error::InvalidClockDate { .. }) => {
                debug!("{}: {}", self.address, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Sets the controller's clock to the local wall-clock time and returns
    /// the time that was sent.
    pub async fn set_clock(&mut self) -> Result<NaiveDateTime> {
        let now = Local::now().naive_local();
        self.set_clock_to(now).await?;
        Ok(now)
    }

    pub async fn set_clock_to(&mut self, now: NaiveDateTime) -> Result<()> {
        self.send(&Command::SetClock(now)).await
    }
}
