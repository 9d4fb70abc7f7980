use thiserror::Error;

/// Errors reported by the controller library.
///
/// None of these are fatal to the process. A failed call leaves the session
/// usable, and a later write will try to reconnect.
#[derive(Error, Debug)]
pub enum Error {
    /// The TCP connection could not be opened, or a frame could not be sent
    /// even after one reconnect attempt.
    #[error("connection to {address} failed: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Fewer bytes than the response shape requires arrived before the read
    /// timed out or the peer closed the stream.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// A preset pattern id outside `0x25..=0x38`.
    #[error("invalid preset pattern 0x{0:02x}, expected 0x25..=0x38")]
    InvalidPattern(u8),

    /// The clock response does not describe a real calendar date.
    #[error("device clock reports an invalid date: {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")]
    InvalidClockDate {
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },

    /// A custom pattern needs at least one color.
    #[error("custom pattern contains no colors")]
    EmptyCustomPattern,

    /// A recurring timer has to run on at least one weekday.
    #[error("recurring timer selects no weekday")]
    EmptyDayMask,

    /// A buffer handed to a response parser has the wrong length.
    #[error("invalid {kind} response: expected {expected} bytes, got {actual}")]
    InvalidResponse {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
