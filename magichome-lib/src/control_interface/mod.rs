use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{info, warn};
use serde::Serialize;

use crate::config::{DiscoveryConfig, SessionConfig, DEFAULT_PORT};
use crate::error::Result;
use crate::protocol::preset::PresetPattern;
use crate::protocol::timer::{TimerBlock, TimerSlot, TimerUpload};
use crate::protocol::{
    byte_to_percent, delay_to_speed, level_to_power, StateResponse, Transition, PATTERN_COLOR,
    PATTERN_COLOR_TEMPORARY, PATTERN_CUSTOM,
};
use crate::util::discovery::{DiscoveredDevice, Discovery};

pub use crate::protocol::{DeviceMode, RGB};

pub mod session;

pub use session::{DeviceSession, LinkState};

/// How to reach one controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
    /// Usually the controller's MAC address without separators.
    pub id: String,
    pub model: String,
}

impl DeviceAddress {
    pub fn new(ip: Ipv4Addr, port: u16, id: &str, model: &str) -> Self {
        DeviceAddress {
            ip,
            port,
            id: id.to_string(),
            model: model.to_string(),
        }
    }

    /// An address on the default control port with no known id or model.
    pub fn from_ip(ip: Ipv4Addr) -> Self {
        DeviceAddress::new(ip, DEFAULT_PORT, "", "")
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}:{}", self.ip, self.port)
        } else {
            write!(f, "{}:{} ({})", self.ip, self.port, self.id)
        }
    }
}

/// The last known state of a controller.
///
/// Updated from state replies and, optimistically, after every successful
/// write. The controller never confirms a write, so the two can drift until
/// the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceState {
    pub is_on: bool,
    /// Meaningful in color mode, black otherwise.
    pub color: RGB,
    pub mode: DeviceMode,
    /// Set only in preset mode.
    pub preset_pattern: Option<PresetPattern>,
    /// Animation speed in percent, set in preset and custom mode.
    pub speed: Option<u8>,
    pub warm_white_level: u8,
    /// The color was set without persisting it.
    pub temporary: bool,
    /// Raw pattern byte from the last state reply or write.
    pub pattern_code: u8,
}

impl DeviceState {
    /// Brightness in percent, zero while off. Outside warm white mode this is
    /// `round(max(r, g, b) / 255 * 100)`.
    ///
    /// In warm white mode the color reads black, so the value comes from the
    /// warm white level instead and does not follow the channel formula.
    pub fn power(&self) -> u8 {
        if !self.is_on {
            return 0;
        }
        match self.mode {
            DeviceMode::WarmWhite => level_to_power(self.warm_white_level),
            _ => level_to_power(self.color.max_channel()),
        }
    }

    pub(crate) fn apply(&mut self, response: &StateResponse) {
        // an unrecognized power byte leaves the power flag alone
        if let Some(is_on) = response.is_on {
            self.is_on = is_on;
        }
        self.mode = response.mode();
        self.pattern_code = response.pattern_code;
        self.warm_white_level = response.warm_white_level;
        self.temporary = response.is_temporary();
        self.preset_pattern = None;
        self.speed = None;

        match self.mode {
            DeviceMode::Color => self.color = response.color,
            DeviceMode::WarmWhite => self.color = RGB::BLACK,
            DeviceMode::Preset => {
                self.preset_pattern = PresetPattern::new(response.pattern_code).ok();
                self.speed = Some(delay_to_speed(response.delay));
            }
            DeviceMode::Custom => self.speed = Some(delay_to_speed(response.delay)),
            DeviceMode::Unknown => {}
        }
    }

    pub(crate) fn set_power(&mut self, is_on: bool) {
        self.is_on = is_on;
    }

    pub(crate) fn show_color(&mut self, color: RGB, persist: bool) {
        self.set_static(persist);
        self.mode = DeviceMode::Color;
        self.color = color;
        self.warm_white_level = 0;
    }

    pub(crate) fn show_warm_white(&mut self, level: u8, persist: bool) {
        self.set_static(persist);
        self.mode = DeviceMode::WarmWhite;
        self.color = RGB::BLACK;
        self.warm_white_level = level;
    }

    pub(crate) fn show_preset(&mut self, pattern: PresetPattern, delay: u8) {
        self.mode = DeviceMode::Preset;
        self.pattern_code = pattern.id();
        self.preset_pattern = Some(pattern);
        self.speed = Some(delay_to_speed(delay));
        self.temporary = false;
    }

    pub(crate) fn show_custom(&mut self, delay: u8) {
        self.mode = DeviceMode::Custom;
        self.pattern_code = PATTERN_CUSTOM;
        self.preset_pattern = None;
        self.speed = Some(delay_to_speed(delay));
        self.temporary = false;
    }

    fn set_static(&mut self, persist: bool) {
        self.pattern_code = if persist {
            PATTERN_COLOR
        } else {
            PATTERN_COLOR_TEMPORARY
        };
        self.temporary = !persist;
        self.preset_pattern = None;
        self.speed = None;
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let power_str = if self.is_on { "ON " } else { "OFF" };
        let speed = self.speed.unwrap_or(0);
        let mode_str = match self.mode {
            DeviceMode::Color => format!("Color: {}", self.color),
            DeviceMode::WarmWhite => {
                format!("Warm White: {}%", byte_to_percent(self.warm_white_level))
            }
            DeviceMode::Preset => match self.preset_pattern {
                Some(pattern) => format!("Pattern: {} (Speed {}%)", pattern, speed),
                None => format!("Pattern: 0x{:02x} (Speed {}%)", self.pattern_code, speed),
            },
            DeviceMode::Custom => format!("Custom pattern (Speed {}%)", speed),
            DeviceMode::Unknown => format!("Unknown mode 0x{:x}", self.pattern_code),
        };
        write!(f, "{} [{}]", power_str, mode_str)?;
        if self.temporary {
            write!(f, " (tmp)")?;
        }
        Ok(())
    }
}

/// Summary handed to a polling host after each refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub connected: bool,
    pub color: RGB,
    pub power: u8,
}

/// High level handle on one controller.
///
/// Wraps a [`DeviceSession`] and adds construction from discovery results
/// and a state report for hosts that poll.
#[derive(Debug)]
pub struct ControlInterface {
    session: DeviceSession,
}

impl ControlInterface {
    /// Creates a handle without touching the network.
    pub fn new(address: DeviceAddress, config: SessionConfig) -> Self {
        ControlInterface {
            session: DeviceSession::new(address, config),
        }
    }

    /// Connects and reads the initial state. Failures are logged; the handle
    /// is returned either way and reconnects on the next write.
    pub async fn open(address: DeviceAddress, config: SessionConfig) -> Self {
        let mut control = ControlInterface::new(address, config);
        if control.session.connect().await {
            if let Err(e) = control.session.refresh_state().await {
                warn!(
                    "Initial state query for {} failed: {}",
                    control.session.address(),
                    e
                );
            }
        }
        control
    }

    pub async fn from_discovered(device: DiscoveredDevice, config: SessionConfig) -> Self {
        let address = device.into_address(config.port);
        info!("Opening discovered device {}", address);
        ControlInterface::open(address, config).await
    }

    /// Scans the local network. See [`Discovery::scan`].
    pub async fn discover(
        config: &DiscoveryConfig,
        given_timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>> {
        Discovery::scan(config, given_timeout).await
    }

    pub fn address(&self) -> &DeviceAddress {
        self.session.address()
    }

    pub fn state(&self) -> &DeviceState {
        self.session.state()
    }

    pub fn session(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub async fn connect(&mut self) -> bool {
        self.session.connect().await
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await
    }

    pub async fn refresh_state(&mut self) -> Result<&DeviceState> {
        self.session.refresh_state().await
    }

    /// The last known state in the shape a polling host reports.
    pub fn report(&self) -> StateReport {
        let state = self.session.state();
        StateReport {
            connected: self.session.is_connected(),
            color: state.color,
            power: state.power(),
        }
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.session.turn_on().await
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.session.turn_off().await
    }

    pub async fn set_color(&mut self, color: RGB, persist: bool) -> Result<()> {
        self.session.set_rgb(color, persist).await
    }

    pub async fn set_warm_white(&mut self, percent: i32, persist: bool) -> Result<()> {
        self.session.set_warm_white(percent, persist).await
    }

    pub async fn set_preset_pattern(&mut self, pattern: u8, speed: i32) -> Result<()> {
        self.session.set_preset_pattern(pattern, speed).await
    }

    pub async fn set_custom_pattern(
        &mut self,
        colors: &[RGB],
        speed: i32,
        transition: Transition,
    ) -> Result<()> {
        self.session
            .set_custom_pattern(colors, speed, transition)
            .await
    }

    pub async fn get_timers(&mut self) -> Result<TimerBlock> {
        self.session.get_timers().await
    }

    pub async fn send_timers(&mut self, slots: &[TimerSlot]) -> Result<TimerUpload> {
        self.session.send_timers(slots).await
    }

    pub async fn get_clock(&mut self) -> Result<Option<NaiveDateTime>> {
        self.session.get_clock().await
    }

    pub async fn set_clock(&mut self) -> Result<NaiveDateTime> {
        self.session.set_clock().await
    }
}

impl fmt::Display for ControlInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.session.address();
        if address.model.is_empty() {
            write!(f, "{}: {}", address, self.session.state())
        } else {
            write!(f, "{} [{}]: {}", address, address.model, self.session.state())
        }
    }
}
