//! Byte-level codec for the controller's TCP protocol.
//!
//! Every outbound frame is a command payload followed by a one byte checksum,
//! the sum of all preceding bytes modulo 256. Responses carry no length
//! prefix; their size is implied by the command that was sent.
//!
//! Nothing in this module performs I/O.

use std::fmt;

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod preset;
pub mod timer;

use preset::PresetPattern;
use timer::{TimerBlock, TimerSlot, TIMER_RECORD_LEN, TIMER_SLOT_COUNT};

/// Length of the reply to [`Command::QueryState`].
pub const STATE_RESPONSE_LEN: usize = 14;
/// Length of the reply to [`Command::QueryClock`].
pub const CLOCK_RESPONSE_LEN: usize = 12;
/// Length of the reply to [`Command::QueryTimers`].
pub const TIMERS_RESPONSE_LEN: usize = 88;
/// Offset of the first timer record inside the timers reply.
const TIMERS_RESPONSE_OFFSET: usize = 2;

/// Number of color slots in a custom pattern frame.
pub const CUSTOM_PATTERN_SLOTS: usize = 16;

/// Delay bytes run from 1 (fastest) to this value (slowest).
pub const MAX_DELAY: u8 = 0x1f;

pub const POWER_ON: u8 = 0x23;
pub const POWER_OFF: u8 = 0x24;

pub(crate) const PATTERN_CUSTOM: u8 = 0x60;
pub(crate) const PATTERN_COLOR: u8 = 0x61;
pub(crate) const PATTERN_COLOR_TEMPORARY: u8 = 0x62;

const TERMINATOR: u8 = 0x0f;
const PERSIST: u8 = 0x31;
const NO_PERSIST: u8 = 0x41;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {
    pub const BLACK: RGB = RGB {
        red: 0,
        green: 0,
        blue: 0,
    };

    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB { red, green, blue }
    }

    /// The brightest of the three channels.
    pub fn max_channel(&self) -> u8 {
        self.red.max(self.green).max(self.blue)
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB {
            red: tuple.0,
            green: tuple.1,
            blue: tuple.2,
        }
    }
}

impl From<RGB> for (u8, u8, u8) {
    fn from(rgb: RGB) -> Self {
        (rgb.red, rgb.green, rgb.blue)
    }
}

impl fmt::Display for RGB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// What the controller is currently displaying, inferred from a state reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    Color,
    WarmWhite,
    Preset,
    Custom,
    #[default]
    Unknown,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode_str = match self {
            DeviceMode::Color => "color",
            DeviceMode::WarmWhite => "ww",
            DeviceMode::Preset => "preset",
            DeviceMode::Custom => "custom",
            DeviceMode::Unknown => "unknown",
        };
        write!(f, "{}", mode_str)
    }
}

/// How a custom pattern moves from one color to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Gradual,
    Jump,
    Strobe,
}

impl Transition {
    /// Parses a transition name. Anything unrecognized is treated as gradual.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "jump" => Transition::Jump,
            "strobe" => Transition::Strobe,
            "gradual" => Transition::Gradual,
            other => {
                warn!("Unknown transition type {:?}, using gradual", other);
                Transition::Gradual
            }
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Transition::Gradual => 0x3a,
            Transition::Jump => 0x3b,
            Transition::Strobe => 0x3c,
        }
    }
}

/// Clamps a percentage to `0..=100` and scales it to `0..=255`, rounding down.
pub fn percent_to_byte(percent: i32) -> u8 {
    let percent = percent.clamp(0, 100);
    (percent * 255 / 100) as u8
}

/// Scales a byte to `0..=100`, rounding down.
pub fn byte_to_percent(byte: u8) -> u8 {
    (u32::from(byte) * 100 / 255) as u8
}

/// Converts an animation speed in percent to a delay byte in `1..=31`.
/// Faster speeds give smaller delays.
pub fn speed_to_delay(speed: i32) -> u8 {
    let inv_speed = 100 - speed.clamp(0, 100);
    (inv_speed * i32::from(MAX_DELAY - 1) / 100 + 1) as u8
}

/// Converts a delay byte back to a speed in percent. Not an exact inverse of
/// [`speed_to_delay`].
pub fn delay_to_speed(delay: u8) -> u8 {
    let delay = (i32::from(delay) - 1).clamp(0, i32::from(MAX_DELAY - 1));
    let inv_speed = delay * 100 / i32::from(MAX_DELAY - 1);
    (100 - inv_speed) as u8
}

/// Brightness in percent for a channel level, rounded to the nearest integer.
pub fn level_to_power(level: u8) -> u8 {
    ((f64::from(level) / 255.0) * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Appends the checksum byte to a command payload.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.extend_from_slice(payload);
    framed.push(checksum(payload));
    framed
}

/// A request the controller understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    QueryState,
    QueryClock,
    SetClock(NaiveDateTime),
    TurnOn,
    TurnOff,
    SetRgb {
        color: RGB,
        persist: bool,
    },
    /// `level` is the raw warm white byte.
    SetWarmWhite {
        level: u8,
        persist: bool,
    },
    SetPresetPattern {
        pattern: PresetPattern,
        delay: u8,
    },
    QueryTimers,
    SendTimers(TimerBlock),
    /// Colors beyond the sixteenth are ignored.
    SetCustomPattern {
        colors: Vec<RGB>,
        delay: u8,
        transition: Transition,
    },
}

impl Command {
    /// The command bytes, without the checksum.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = BytesMut::new();
        match self {
            Command::QueryState => payload.put_slice(&[0x81, 0x8a, 0x8b]),
            Command::QueryClock => payload.put_slice(&[0x11, 0x1a, 0x1b, TERMINATOR]),
            Command::SetClock(now) => {
                payload.put_slice(&[0x10, 0x14]);
                payload.put_u8((now.year() - 2000).clamp(0, 255) as u8);
                payload.put_u8(now.month() as u8);
                payload.put_u8(now.day() as u8);
                payload.put_u8(now.hour() as u8);
                payload.put_u8(now.minute() as u8);
                payload.put_u8(now.second() as u8);
                payload.put_u8(now.weekday().number_from_monday() as u8);
                payload.put_slice(&[0x00, TERMINATOR]);
            }
            Command::TurnOn => payload.put_slice(&[0x71, POWER_ON, TERMINATOR]),
            Command::TurnOff => payload.put_slice(&[0x71, POWER_OFF, TERMINATOR]),
            Command::SetRgb { color, persist } => {
                payload.put_u8(persist_byte(*persist));
                payload.put_slice(&[color.red, color.green, color.blue]);
                // warm white, cool white, "white channels unused"
                payload.put_slice(&[0x00, 0x00, TERMINATOR]);
            }
            Command::SetWarmWhite { level, persist } => {
                payload.put_u8(persist_byte(*persist));
                payload.put_slice(&[0x00, 0x00, 0x00, *level, TERMINATOR, TERMINATOR]);
            }
            Command::SetPresetPattern { pattern, delay } => {
                payload.put_slice(&[0x61, pattern.id(), *delay, TERMINATOR]);
            }
            Command::QueryTimers => payload.put_slice(&[0x22, 0x2a, 0x2b, TERMINATOR]),
            Command::SendTimers(block) => {
                payload.put_u8(0x21);
                for slot in block.iter() {
                    payload.put_slice(&slot.to_bytes());
                }
                payload.put_slice(&[0x00, 0xf0]);
            }
            Command::SetCustomPattern {
                colors,
                delay,
                transition,
            } => {
                let used = colors.len().min(CUSTOM_PATTERN_SLOTS);
                for (index, color) in colors.iter().take(used).enumerate() {
                    let lead = if index == 0 { 0x51 } else { 0x00 };
                    payload.put_slice(&[lead, color.red, color.green, color.blue]);
                }
                for _ in used..CUSTOM_PATTERN_SLOTS {
                    payload.put_slice(&[0x00, 0x01, 0x02, 0x03]);
                }
                payload.put_slice(&[0x00, *delay, transition.to_byte(), 0xff, TERMINATOR]);
            }
        }
        payload.to_vec()
    }

    /// The complete frame, checksum included.
    pub fn to_frame(&self) -> Vec<u8> {
        frame(&self.payload())
    }

    /// Number of reply bytes the controller sends for this command, if any
    /// are interpreted.
    pub fn response_len(&self) -> Option<usize> {
        match self {
            Command::QueryState => Some(STATE_RESPONSE_LEN),
            Command::QueryClock => Some(CLOCK_RESPONSE_LEN),
            Command::QueryTimers => Some(TIMERS_RESPONSE_LEN),
            _ => None,
        }
    }
}

fn persist_byte(persist: bool) -> u8 {
    if persist {
        PERSIST
    } else {
        NO_PERSIST
    }
}

/// Infers the display mode from a state reply's pattern code and warm white
/// level.
pub fn infer_mode(pattern_code: u8, warm_white_level: u8) -> DeviceMode {
    match pattern_code {
        PATTERN_COLOR | PATTERN_COLOR_TEMPORARY if warm_white_level != 0 => DeviceMode::WarmWhite,
        PATTERN_COLOR | PATTERN_COLOR_TEMPORARY => DeviceMode::Color,
        PATTERN_CUSTOM => DeviceMode::Custom,
        code if PresetPattern::is_valid(code) => DeviceMode::Preset,
        _ => DeviceMode::Unknown,
    }
}

/// Decoded reply to [`Command::QueryState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateResponse {
    /// `Some(true)` for 0x23, `Some(false)` for 0x24, `None` otherwise.
    pub is_on: Option<bool>,
    pub pattern_code: u8,
    pub delay: u8,
    pub color: RGB,
    pub warm_white_level: u8,
}

impl StateResponse {
    pub fn parse(rx: &[u8]) -> Result<Self> {
        if rx.len() != STATE_RESPONSE_LEN {
            return Err(Error::InvalidResponse {
                kind: "state",
                expected: STATE_RESPONSE_LEN,
                actual: rx.len(),
            });
        }
        let expected = checksum(&rx[..STATE_RESPONSE_LEN - 1]);
        if rx[STATE_RESPONSE_LEN - 1] != expected {
            warn!(
                "State response checksum mismatch: got 0x{:02x}, expected 0x{:02x}",
                rx[STATE_RESPONSE_LEN - 1],
                expected
            );
        }
        let is_on = match rx[2] {
            POWER_ON => Some(true),
            POWER_OFF => Some(false),
            _ => None,
        };
        Ok(StateResponse {
            is_on,
            pattern_code: rx[3],
            delay: rx[5],
            color: RGB::new(rx[6], rx[7], rx[8]),
            warm_white_level: rx[9],
        })
    }

    pub fn mode(&self) -> DeviceMode {
        infer_mode(self.pattern_code, self.warm_white_level)
    }

    /// Pattern code 0x62 marks a color that was set without persisting.
    pub fn is_temporary(&self) -> bool {
        self.pattern_code == PATTERN_COLOR_TEMPORARY
    }
}

/// Decodes the reply to [`Command::QueryClock`].
pub fn parse_clock(rx: &[u8]) -> Result<NaiveDateTime> {
    if rx.len() != CLOCK_RESPONSE_LEN {
        return Err(Error::InvalidResponse {
            kind: "clock",
            expected: CLOCK_RESPONSE_LEN,
            actual: rx.len(),
        });
    }
    let year = i32::from(rx[3]) + 2000;
    let (month, day, hour, minute, second) = (rx[4], rx[5], rx[6], rx[7], rx[8]);
    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
        .and_then(|date| {
            date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        })
        .ok_or(Error::InvalidClockDate {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
}

/// Decodes the reply to [`Command::QueryTimers`] into its six slots.
pub fn parse_timers(rx: &[u8]) -> Result<TimerBlock> {
    if rx.len() != TIMERS_RESPONSE_LEN {
        return Err(Error::InvalidResponse {
            kind: "timers",
            expected: TIMERS_RESPONSE_LEN,
            actual: rx.len(),
        });
    }
    let mut slots = [TimerSlot::Inactive; TIMER_SLOT_COUNT];
    let records = rx[TIMERS_RESPONSE_OFFSET..].chunks_exact(TIMER_RECORD_LEN);
    for (slot, record) in slots.iter_mut().zip(records) {
        *slot = TimerSlot::from_bytes(record)?;
    }
    Ok(TimerBlock::new(slots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_to_delay_bounds() {
        assert_eq!(speed_to_delay(0), 31);
        assert_eq!(speed_to_delay(100), 1);
        assert_eq!(speed_to_delay(-20), 31);
        assert_eq!(speed_to_delay(250), 1);
        assert_eq!(speed_to_delay(50), 16);
    }

    #[test]
    fn test_speed_to_delay_is_non_increasing() {
        let mut previous = speed_to_delay(0);
        for speed in 1..=100 {
            let delay = speed_to_delay(speed);
            assert!((1..=31).contains(&delay));
            assert!(delay <= previous, "delay rose at speed {}", speed);
            previous = delay;
        }
    }

    #[test]
    fn test_delay_to_speed_bounds() {
        assert_eq!(delay_to_speed(1), 100);
        assert_eq!(delay_to_speed(31), 0);
        assert_eq!(delay_to_speed(0), 100);
        assert_eq!(delay_to_speed(200), 0);
    }

    #[test]
    fn test_delay_to_speed_is_non_increasing() {
        let mut previous = delay_to_speed(1);
        for delay in 2..=31 {
            let speed = delay_to_speed(delay);
            assert!(speed <= 100);
            assert!(speed <= previous, "speed rose at delay {}", delay);
            previous = speed;
        }
    }

    #[test]
    fn test_percent_conversions() {
        assert_eq!(percent_to_byte(0), 0);
        assert_eq!(percent_to_byte(100), 255);
        assert_eq!(percent_to_byte(50), 127);
        assert_eq!(percent_to_byte(-5), 0);
        assert_eq!(percent_to_byte(140), 255);
        assert_eq!(percent_to_byte(i32::from(byte_to_percent(255))), 255);
        for byte in 0..=255u8 {
            assert_eq!(u32::from(byte_to_percent(byte)), u32::from(byte) * 100 / 255);
        }
    }

    #[test]
    fn test_level_to_power_rounds() {
        assert_eq!(level_to_power(0), 0);
        assert_eq!(level_to_power(255), 100);
        // 128 / 255 * 100 = 50.196
        assert_eq!(level_to_power(128), 50);
        // 1 / 255 * 100 = 0.39
        assert_eq!(level_to_power(1), 0);
        // 2 / 255 * 100 = 0.78
        assert_eq!(level_to_power(2), 1);
    }

    #[test]
    fn test_frame_appends_checksum() {
        assert_eq!(frame(&[0x81, 0x8a, 0x8b]), vec![0x81, 0x8a, 0x8b, 0x96]);
        assert_eq!(frame(&[]), vec![0x00]);
    }

    #[test]
    fn test_fixed_command_frames() {
        assert_eq!(Command::TurnOn.to_frame(), vec![0x71, 0x23, 0x0f, 0xa3]);
        assert_eq!(Command::TurnOff.to_frame(), vec![0x71, 0x24, 0x0f, 0xa4]);
        assert_eq!(Command::QueryClock.payload(), vec![0x11, 0x1a, 0x1b, 0x0f]);
        assert_eq!(Command::QueryTimers.payload(), vec![0x22, 0x2a, 0x2b, 0x0f]);
    }

    #[test]
    fn test_set_rgb_frame() {
        let command = Command::SetRgb {
            color: RGB::new(255, 0, 0),
            persist: true,
        };
        assert_eq!(
            command.to_frame(),
            vec![0x31, 0xff, 0x00, 0x00, 0x00, 0x00, 0x0f, 0x3f]
        );

        let temporary = Command::SetRgb {
            color: RGB::new(1, 2, 3),
            persist: false,
        };
        assert_eq!(temporary.payload(), vec![0x41, 1, 2, 3, 0x00, 0x00, 0x0f]);
    }

    #[test]
    fn test_set_warm_white_frame() {
        let command = Command::SetWarmWhite {
            level: 0x80,
            persist: true,
        };
        assert_eq!(command.payload(), vec![0x31, 0, 0, 0, 0x80, 0x0f, 0x0f]);
    }

    #[test]
    fn test_set_preset_frame() {
        let command = Command::SetPresetPattern {
            pattern: PresetPattern::RED_GRADUAL_CHANGE,
            delay: speed_to_delay(50),
        };
        assert_eq!(command.payload(), vec![0x61, 0x26, 0x10, 0x0f]);
    }

    #[test]
    fn test_set_clock_frame() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 17)
            .and_then(|d| d.and_hms_opt(21, 5, 9))
            .unwrap();
        // 2024-03-17 is a Sunday
        assert_eq!(
            Command::SetClock(now).payload(),
            vec![0x10, 0x14, 24, 3, 17, 21, 5, 9, 7, 0x00, 0x0f]
        );
    }

    #[test]
    fn test_custom_pattern_frame_layout() {
        let command = Command::SetCustomPattern {
            colors: vec![RGB::new(255, 0, 0), RGB::new(0, 0, 255)],
            delay: 5,
            transition: Transition::Jump,
        };
        let payload = command.payload();
        assert_eq!(payload.len(), CUSTOM_PATTERN_SLOTS * 4 + 5);
        assert_eq!(&payload[0..4], &[0x51, 255, 0, 0]);
        assert_eq!(&payload[4..8], &[0x00, 0, 0, 255]);
        for padding in payload[8..64].chunks(4) {
            assert_eq!(padding, &[0x00, 0x01, 0x02, 0x03]);
        }
        assert_eq!(&payload[64..], &[0x00, 5, 0x3b, 0xff, 0x0f]);
    }

    #[test]
    fn test_custom_pattern_ignores_extra_colors() {
        let command = Command::SetCustomPattern {
            colors: vec![RGB::new(9, 9, 9); 20],
            delay: 1,
            transition: Transition::Strobe,
        };
        let payload = command.payload();
        assert_eq!(payload.len(), CUSTOM_PATTERN_SLOTS * 4 + 5);
        assert_eq!(&payload[60..64], &[0x00, 9, 9, 9]);
        assert_eq!(payload[66], 0x3c);
    }

    #[test]
    fn test_transition_names() {
        assert_eq!(Transition::from_name("gradual"), Transition::Gradual);
        assert_eq!(Transition::from_name("JUMP"), Transition::Jump);
        assert_eq!(Transition::from_name("strobe"), Transition::Strobe);
        assert_eq!(Transition::from_name("sparkle"), Transition::Gradual);
    }

    #[test]
    fn test_mode_inference() {
        assert_eq!(infer_mode(0x61, 0), DeviceMode::Color);
        assert_eq!(infer_mode(0x61, 50), DeviceMode::WarmWhite);
        assert_eq!(infer_mode(0x62, 0), DeviceMode::Color);
        assert_eq!(infer_mode(0x62, 1), DeviceMode::WarmWhite);
        assert_eq!(infer_mode(0x60, 0), DeviceMode::Custom);
        assert_eq!(infer_mode(0x60, 77), DeviceMode::Custom);
        assert_eq!(infer_mode(0x30, 0), DeviceMode::Preset);
        assert_eq!(infer_mode(0x25, 10), DeviceMode::Preset);
        assert_eq!(infer_mode(0x38, 0), DeviceMode::Preset);
        assert_eq!(infer_mode(0x99, 0), DeviceMode::Unknown);
        assert_eq!(infer_mode(0x24, 0), DeviceMode::Unknown);
    }

    fn state_reply(power: u8, pattern: u8, delay: u8, rgb: (u8, u8, u8), ww: u8) -> Vec<u8> {
        let mut rx = vec![
            0x81, 0x04, power, pattern, 0x21, delay, rgb.0, rgb.1, rgb.2, ww, 0x03, 0x00, 0x00,
        ];
        rx.push(checksum(&rx));
        rx
    }

    #[test]
    fn test_parse_state_response() {
        let rx = state_reply(0x23, 0x62, 0x10, (10, 20, 30), 0);
        let state = StateResponse::parse(&rx).unwrap();
        assert_eq!(state.is_on, Some(true));
        assert_eq!(state.color, RGB::new(10, 20, 30));
        assert_eq!(state.delay, 0x10);
        assert_eq!(state.mode(), DeviceMode::Color);
        assert!(state.is_temporary());

        let rx = state_reply(0x24, 0x2b, 0x05, (0, 0, 0), 0);
        let state = StateResponse::parse(&rx).unwrap();
        assert_eq!(state.is_on, Some(false));
        assert_eq!(state.mode(), DeviceMode::Preset);
        assert!(!state.is_temporary());
    }

    #[test]
    fn test_parse_state_response_rejects_wrong_length() {
        assert!(matches!(
            StateResponse::parse(&[0x81, 0x04, 0x23]),
            Err(Error::InvalidResponse { expected: 14, actual: 3, .. })
        ));
    }

    #[test]
    fn test_parse_state_response_tolerates_bad_checksum() {
        let mut rx = state_reply(0x23, 0x61, 0x01, (1, 2, 3), 0);
        rx[13] = rx[13].wrapping_add(1);
        assert!(StateResponse::parse(&rx).is_ok());
    }

    #[test]
    fn test_parse_clock() {
        let rx = [0x0f, 0x11, 0x14, 24, 2, 29, 13, 45, 30, 4, 0x00, 0x00];
        let clock = parse_clock(&rx).unwrap();
        assert_eq!(
            clock,
            NaiveDate::from_ymd_opt(2024, 2, 29)
                .and_then(|d| d.and_hms_opt(13, 45, 30))
                .unwrap()
        );
    }

    #[test]
    fn test_parse_clock_invalid_date() {
        let rx = [0x0f, 0x11, 0x14, 23, 2, 30, 13, 45, 30, 4, 0x00, 0x00];
        assert!(matches!(
            parse_clock(&rx),
            Err(Error::InvalidClockDate { year: 2023, month: 2, day: 30, .. })
        ));
        let rx = [0u8; CLOCK_RESPONSE_LEN];
        assert!(matches!(parse_clock(&rx), Err(Error::InvalidClockDate { .. })));
    }

    #[test]
    fn test_parse_timers() {
        let mut rx = vec![0x0f, 0x22];
        let recurring = [0xf0, 0, 0, 0, 7, 30, 0, 0x3e, 0x61, 255, 128, 0, 0, 0xf0];
        rx.extend_from_slice(&recurring);
        for _ in 1..TIMER_SLOT_COUNT {
            let mut inactive = [0u8; TIMER_RECORD_LEN];
            inactive[0] = 0x0f;
            rx.extend_from_slice(&inactive);
        }
        rx.extend_from_slice(&[0x00, 0x00]);

        let block = parse_timers(&rx).unwrap();
        assert!(block.slots()[0].is_active());
        assert!(block.slots()[1..].iter().all(|slot| !slot.is_active()));
        assert_eq!(block.slots()[0].to_bytes(), recurring);
    }

    #[test]
    fn test_parse_timers_rejects_short_reply() {
        assert!(matches!(
            parse_timers(&[0u8; 40]),
            Err(Error::InvalidResponse { kind: "timers", .. })
        ));
    }
}
