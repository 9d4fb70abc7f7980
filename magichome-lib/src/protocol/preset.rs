//! Read-only lookup tables for the built-in preset patterns and the weekday
//! bits used by recurring timers.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// First valid preset pattern id.
pub const PRESET_MIN: u8 = 0x25;
/// Last valid preset pattern id.
pub const PRESET_MAX: u8 = 0x38;

const PRESET_NAMES: [(u8, &str); 20] = [
    (0x25, "Seven Color Cross Fade"),
    (0x26, "Red Gradual Change"),
    (0x27, "Green Gradual Change"),
    (0x28, "Blue Gradual Change"),
    (0x29, "Yellow Gradual Change"),
    (0x2a, "Cyan Gradual Change"),
    (0x2b, "Purple Gradual Change"),
    (0x2c, "White Gradual Change"),
    (0x2d, "Red Green Cross Fade"),
    (0x2e, "Red Blue Cross Fade"),
    (0x2f, "Green Blue Cross Fade"),
    (0x30, "Seven Color Strobe Flash"),
    (0x31, "Red Strobe Flash"),
    (0x32, "Green Strobe Flash"),
    (0x33, "Blue Strobe Flash"),
    (0x34, "Yellow Strobe Flash"),
    (0x35, "Cyan Strobe Flash"),
    (0x36, "Purple Strobe Flash"),
    (0x37, "White Strobe Flash"),
    (0x38, "Seven Color Jumping"),
];

/// A built-in animated effect. Can only hold ids in `0x25..=0x38`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PresetPattern(u8);

impl PresetPattern {
    pub const SEVEN_COLOR_CROSS_FADE: PresetPattern = PresetPattern(0x25);
    pub const RED_GRADUAL_CHANGE: PresetPattern = PresetPattern(0x26);
    pub const SEVEN_COLOR_STROBE_FLASH: PresetPattern = PresetPattern(0x30);
    pub const SEVEN_COLOR_JUMPING: PresetPattern = PresetPattern(0x38);

    pub fn new(id: u8) -> Result<Self> {
        if Self::is_valid(id) {
            Ok(PresetPattern(id))
        } else {
            Err(Error::InvalidPattern(id))
        }
    }

    pub fn is_valid(id: u8) -> bool {
        (PRESET_MIN..=PRESET_MAX).contains(&id)
    }

    pub fn id(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        preset_name(self.0).unwrap_or("Unknown Pattern")
    }

    /// All presets in id order.
    pub fn all() -> impl Iterator<Item = PresetPattern> {
        PRESET_NAMES.iter().map(|&(id, _)| PresetPattern(id))
    }
}

impl TryFrom<u8> for PresetPattern {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        PresetPattern::new(id)
    }
}

impl From<PresetPattern> for u8 {
    fn from(pattern: PresetPattern) -> Self {
        pattern.0
    }
}

impl Display for PresetPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Name of a preset pattern id, `None` outside the preset range.
pub fn preset_name(id: u8) -> Option<&'static str> {
    PRESET_NAMES
        .iter()
        .find(|&&(value, _)| value == id)
        .map(|&(_, name)| name)
}

/// Weekday bits of a recurring timer's repeat mask. Bit 0 is unused.
pub mod days {
    pub const MONDAY: u8 = 0x02;
    pub const TUESDAY: u8 = 0x04;
    pub const WEDNESDAY: u8 = 0x08;
    pub const THURSDAY: u8 = 0x10;
    pub const FRIDAY: u8 = 0x20;
    pub const SATURDAY: u8 = 0x40;
    pub const SUNDAY: u8 = 0x80;

    pub const WEEKDAYS: u8 = MONDAY | TUESDAY | WEDNESDAY | THURSDAY | FRIDAY;
    pub const WEEKEND: u8 = SATURDAY | SUNDAY;
    pub const EVERYDAY: u8 = WEEKDAYS | WEEKEND;
}

const DAY_MASK_NAMES: [(u8, &str); 10] = [
    (days::MONDAY, "Mo"),
    (days::TUESDAY, "Tu"),
    (days::WEDNESDAY, "We"),
    (days::THURSDAY, "Th"),
    (days::FRIDAY, "Fr"),
    (days::SATURDAY, "Sa"),
    (days::SUNDAY, "Su"),
    (days::EVERYDAY, "Everyday"),
    (days::WEEKDAYS, "Weekdays"),
    (days::WEEKEND, "Weekend"),
];

/// Display order used when rendering a repeat mask, Sunday first.
pub const DISPLAY_WEEK: [u8; 7] = [
    days::SUNDAY,
    days::MONDAY,
    days::TUESDAY,
    days::WEDNESDAY,
    days::THURSDAY,
    days::FRIDAY,
    days::SATURDAY,
];

/// Name of a single day bit or one of the composite masks.
pub fn day_mask_name(mask: u8) -> Option<&'static str> {
    DAY_MASK_NAMES
        .iter()
        .find(|&&(value, _)| value == mask)
        .map(|&(_, name)| name)
}

/// Inverse of [`day_mask_name`], ignoring case.
pub fn day_mask_from_name(name: &str) -> Option<u8> {
    DAY_MASK_NAMES
        .iter()
        .find(|&&(_, value)| value.eq_ignore_ascii_case(name))
        .map(|&(mask, _)| mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_range_bounds() {
        assert!(PresetPattern::new(0x24).is_err());
        assert!(PresetPattern::new(0x25).is_ok());
        assert!(PresetPattern::new(0x38).is_ok());
        assert!(PresetPattern::new(0x39).is_err());
    }

    #[test]
    fn test_invalid_preset_reports_id() {
        match PresetPattern::new(0x10) {
            Err(Error::InvalidPattern(id)) => assert_eq!(id, 0x10),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_every_preset_has_a_name() {
        assert_eq!(PresetPattern::all().count(), 20);
        for id in PRESET_MIN..=PRESET_MAX {
            assert!(preset_name(id).is_some(), "missing name for 0x{:02x}", id);
        }
        assert_eq!(preset_name(0x60), None);
    }

    #[test]
    fn test_preset_display() {
        assert_eq!(PresetPattern::RED_GRADUAL_CHANGE.to_string(), "Red Gradual Change");
        assert_eq!(PresetPattern::SEVEN_COLOR_JUMPING.name(), "Seven Color Jumping");
    }

    #[test]
    fn test_day_mask_names() {
        assert_eq!(day_mask_name(days::MONDAY), Some("Mo"));
        assert_eq!(day_mask_name(days::SUNDAY), Some("Su"));
        assert_eq!(day_mask_name(0x3e), Some("Weekdays"));
        assert_eq!(day_mask_name(0xc0), Some("Weekend"));
        assert_eq!(day_mask_name(0xfe), Some("Everyday"));
        assert_eq!(day_mask_name(0x06), None);
    }

    #[test]
    fn test_day_mask_from_name() {
        assert_eq!(day_mask_from_name("tu"), Some(days::TUESDAY));
        assert_eq!(day_mask_from_name("WEEKEND"), Some(0xc0));
        assert_eq!(day_mask_from_name("someday"), None);
    }
}
