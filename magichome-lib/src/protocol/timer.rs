//! The controller's on-board timers.
//!
//! A controller holds exactly six timer slots, always read and written as one
//! block. Each slot is a 14 byte record:
//!
//! ```text
//!  0: 0xf0 active / 0x0f inactive
//!  1: year - 2000 (one-shot only)
//!  2: month       (one-shot only)
//!  3: day         (one-shot only)
//!  4: hour
//!  5: minute
//!  6: reserved
//!  7: repeat mask (Mo=0x02 .. Su=0x80), zero for one-shot
//!  8: 0x61 color / warm white, 0x00 default, otherwise preset pattern id
//!  9: red, or the delay byte for a preset
//! 10: green
//! 11: blue
//! 12: warm white level
//! 13: 0xf0 run the action / 0x0f turn off
//! ```

use std::fmt;
use std::num::NonZeroU8;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::preset::{self, PresetPattern};
use crate::protocol::{byte_to_percent, delay_to_speed, percent_to_byte, speed_to_delay, RGB};

pub const TIMER_RECORD_LEN: usize = 14;
pub const TIMER_SLOT_COUNT: usize = 6;

const ACTIVE: u8 = 0xf0;
const INACTIVE: u8 = 0x0f;
const ACTION_RUN: u8 = 0xf0;
const ACTION_OFF: u8 = 0x0f;
const CODE_COLOR: u8 = 0x61;
const CODE_DEFAULT: u8 = 0x00;

/// When a timer fires. Exactly one of the calendar date and the repeat mask
/// is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    OneShot {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
    },
    /// `days` is a mask of [`preset::days`] bits. A zero mask would read
    /// back as a one-shot record.
    Recurring {
        days: NonZeroU8,
        hour: u8,
        minute: u8,
    },
}

impl Schedule {
    pub fn hour(&self) -> u8 {
        match self {
            Schedule::OneShot { hour, .. } | Schedule::Recurring { hour, .. } => *hour,
        }
    }

    pub fn minute(&self) -> u8 {
        match self {
            Schedule::OneShot { minute, .. } | Schedule::Recurring { minute, .. } => *minute,
        }
    }
}

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerAction {
    TurnOff,
    Color(RGB),
    /// Raw warm white byte. A zero level would read back as a black color.
    WarmWhite(NonZeroU8),
    Preset { pattern: PresetPattern, delay: u8 },
    /// Turn on with whatever the controller last showed.
    Default,
}

impl TimerAction {
    /// A level that scales to zero turns the device off instead.
    pub fn warm_white_percent(percent: i32) -> Self {
        NonZeroU8::new(percent_to_byte(percent))
            .map_or(TimerAction::TurnOff, TimerAction::WarmWhite)
    }

    pub fn preset(pattern: PresetPattern, speed: i32) -> Self {
        TimerAction::Preset {
            pattern,
            delay: speed_to_delay(speed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub schedule: Schedule,
    pub action: TimerAction,
    /// Byte 6 of the record. Its meaning is unknown; it is carried through
    /// unchanged.
    #[serde(default)]
    pub reserved: u8,
}

impl Timer {
    pub fn once(year: u16, month: u8, day: u8, hour: u8, minute: u8, action: TimerAction) -> Self {
        Timer {
            schedule: Schedule::OneShot {
                year,
                month,
                day,
                hour,
                minute,
            },
            action,
            reserved: 0,
        }
    }

    pub fn once_at(at: NaiveDateTime, action: TimerAction) -> Self {
        Timer::once(
            at.year().clamp(0, i32::from(u16::MAX)) as u16,
            at.month() as u8,
            at.day() as u8,
            at.hour() as u8,
            at.minute() as u8,
            action,
        )
    }

    /// Fails with `EmptyDayMask` when `days` selects no day.
    pub fn recurring(days: u8, hour: u8, minute: u8, action: TimerAction) -> Result<Self> {
        let days = NonZeroU8::new(days).ok_or(Error::EmptyDayMask)?;
        Ok(Timer {
            schedule: Schedule::Recurring { days, hour, minute },
            action,
            reserved: 0,
        })
    }
}

/// One of the six timer positions on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimerSlot {
    #[default]
    Inactive,
    Active(Timer),
}

impl TimerSlot {
    pub fn is_active(&self) -> bool {
        matches!(self, TimerSlot::Active(_))
    }

    /// A one-shot timer whose date and time lie strictly before `now`.
    /// Recurring and inactive slots never expire, nor do one-shot slots
    /// without a complete, valid date.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        let TimerSlot::Active(timer) = self else {
            return false;
        };
        match timer.schedule {
            Schedule::OneShot {
                year,
                month,
                day,
                hour,
                minute,
            } if year != 0 && month != 0 && day != 0 => {
                NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                    .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), 0))
                    .map_or(false, |at| at < now)
            }
            _ => false,
        }
    }

    /// Decodes one record. Fails only when a preset action names a pattern
    /// outside the preset range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut record = [0u8; TIMER_RECORD_LEN];
        let len = bytes.len().min(TIMER_RECORD_LEN);
        record[..len].copy_from_slice(&bytes[..len]);

        if record[0] != ACTIVE {
            return Ok(TimerSlot::Inactive);
        }

        let (hour, minute) = (record[4], record[5]);
        let schedule = match NonZeroU8::new(record[7]) {
            None => Schedule::OneShot {
                year: u16::from(record[1]) + 2000,
                month: record[2],
                day: record[3],
                hour,
                minute,
            },
            Some(days) => Schedule::Recurring { days, hour, minute },
        };

        let action = if record[13] != ACTION_RUN {
            TimerAction::TurnOff
        } else {
            match (record[8], NonZeroU8::new(record[12])) {
                (CODE_COLOR, Some(level)) => TimerAction::WarmWhite(level),
                (CODE_COLOR, None) => {
                    TimerAction::Color(RGB::new(record[9], record[10], record[11]))
                }
                (CODE_DEFAULT, _) => TimerAction::Default,
                (code, _) => TimerAction::Preset {
                    pattern: PresetPattern::new(code)?,
                    delay: record[9],
                },
            }
        };

        Ok(TimerSlot::Active(Timer {
            schedule,
            action,
            reserved: record[6],
        }))
    }

    pub fn to_bytes(&self) -> [u8; TIMER_RECORD_LEN] {
        let mut record = [0u8; TIMER_RECORD_LEN];
        let TimerSlot::Active(timer) = self else {
            record[0] = INACTIVE;
            return record;
        };

        record[0] = ACTIVE;
        match timer.schedule {
            Schedule::OneShot {
                year,
                month,
                day,
                hour,
                minute,
            } => {
                record[1] = if year >= 2000 {
                    (year - 2000).min(255) as u8
                } else {
                    year.min(255) as u8
                };
                record[2] = month;
                record[3] = day;
                record[4] = hour;
                record[5] = minute;
            }
            Schedule::Recurring { days, hour, minute } => {
                record[4] = hour;
                record[5] = minute;
                record[7] = days.get();
            }
        }
        record[6] = timer.reserved;

        match timer.action {
            TimerAction::TurnOff => {
                record[13] = ACTION_OFF;
                return record;
            }
            TimerAction::Color(color) => {
                record[8] = CODE_COLOR;
                record[9] = color.red;
                record[10] = color.green;
                record[11] = color.blue;
            }
            TimerAction::WarmWhite(level) => {
                record[8] = CODE_COLOR;
                record[12] = level.get();
            }
            TimerAction::Preset { pattern, delay } => {
                record[8] = pattern.id();
                record[9] = delay;
            }
            TimerAction::Default => record[8] = CODE_DEFAULT,
        }
        record[13] = ACTION_RUN;
        record
    }
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TimerSlot::Active(timer) = self else {
            return write!(f, "Unset");
        };

        let mut txt = String::new();
        txt += match timer.action {
            TimerAction::TurnOff => "[OFF] ",
            _ => "[ON ] ",
        };
        txt += &format!(
            "{:02}:{:02}  ",
            timer.schedule.hour(),
            timer.schedule.minute()
        );

        match timer.schedule {
            Schedule::OneShot {
                year, month, day, ..
            } => txt += &format!("Once: {:04}-{:02}-{:02}", year, month, day),
            Schedule::Recurring { days, .. } => {
                for bit in preset::DISPLAY_WEEK {
                    if days.get() & bit != 0 {
                        txt += preset::day_mask_name(bit).unwrap_or("??");
                    } else {
                        txt += "--";
                    }
                }
                txt += "  ";
            }
        }
        txt += "  ";

        match timer.action {
            TimerAction::Color(color) => txt += &format!("Color: {}", color),
            TimerAction::WarmWhite(level) => {
                txt += &format!("Warm White: {}%", byte_to_percent(level.get()))
            }
            TimerAction::Preset { pattern, delay } => {
                txt += &format!("{} (Speed:{}%)", pattern.name(), delay_to_speed(delay))
            }
            TimerAction::TurnOff | TimerAction::Default => {}
        }

        write!(f, "{}", txt.trim_end())
    }
}

/// Exactly six slots, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerBlock([TimerSlot; TIMER_SLOT_COUNT]);

/// The outcome of turning a caller's timer list into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerUpload {
    pub block: TimerBlock,
    /// Inactive or expired entries that were left out.
    pub dropped: usize,
    /// Active entries past the sixth that did not fit.
    pub truncated: usize,
}

impl TimerBlock {
    pub fn new(slots: [TimerSlot; TIMER_SLOT_COUNT]) -> Self {
        TimerBlock(slots)
    }

    pub fn slots(&self) -> &[TimerSlot; TIMER_SLOT_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimerSlot> {
        self.0.iter()
    }

    /// Keeps the active, unexpired entries in order, truncates to six with a
    /// warning and pads the rest with inactive slots.
    pub fn prepare(slots: &[TimerSlot], now: NaiveDateTime) -> TimerUpload {
        let mut kept: Vec<TimerSlot> = slots
            .iter()
            .filter(|slot| slot.is_active() && !slot.is_expired(now))
            .copied()
            .collect();
        let dropped = slots.len() - kept.len();

        let truncated = kept.len().saturating_sub(TIMER_SLOT_COUNT);
        if truncated > 0 {
            warn!(
                "Too many timers ({}), truncating list to {}",
                kept.len(),
                TIMER_SLOT_COUNT
            );
            kept.truncate(TIMER_SLOT_COUNT);
        }

        let mut block = [TimerSlot::Inactive; TIMER_SLOT_COUNT];
        for (position, slot) in block.iter_mut().zip(kept) {
            *position = slot;
        }

        TimerUpload {
            block: TimerBlock(block),
            dropped,
            truncated,
        }
    }
}

impl<'a> IntoIterator for &'a TimerBlock {
    type Item = &'a TimerSlot;
    type IntoIter = std::slice::Iter<'a, TimerSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
