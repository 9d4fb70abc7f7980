use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use serde::Serialize;

use magichome_lib::config::Config;
use magichome_lib::control_interface::{ControlInterface, DeviceAddress, RGB};
use magichome_lib::protocol::preset::{self, PresetPattern};
use magichome_lib::protocol::timer::{Timer, TimerAction, TimerSlot, TIMER_SLOT_COUNT};
use magichome_lib::protocol::Transition;
use magichome_lib::util::discovery::Discovery;
use magichome_lib::util::health::LinkHealth;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "magichome",
    about = "Controls MagicHome LAN LED controllers",
    version = "0.1.0"
)]
pub struct Cli {
    /// Optional YAML configuration file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Subcommand for operations that require device communication
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address of the controller
        #[clap(long)]
        ip: Ipv4Addr,

        /// Sets the device ID of the controller, usually its MAC address
        #[clap(long)]
        id: Option<String>,

        /// Control port, defaults to the configured session port
        #[clap(long)]
        port: Option<u16>,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Broadcasts a discovery request and lists the controllers that answer
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 3000)]
        timeout: u64,
    },
    /// Lists the built-in preset patterns
    #[clap(name = "presets")]
    Presets,
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Queries and prints the current device state.
    #[clap(name = "state")]
    State {
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Turns the device on.
    #[clap(name = "on")]
    On,
    /// Turns the device off.
    #[clap(name = "off")]
    Off,
    /// Shows a solid RGB color.
    #[clap(name = "color")]
    Color {
        /// Red component of the color (0-255)
        #[clap(short = 'r', long = "red", default_value_t = 0)]
        red: u8,

        /// Green component of the color (0-255)
        #[clap(short = 'g', long = "green", default_value_t = 0)]
        green: u8,

        /// Blue component of the color (0-255)
        #[clap(short = 'b', long = "blue", default_value_t = 0)]
        blue: u8,

        /// Do not store the color across power cycles
        #[clap(long)]
        no_persist: bool,
    },
    /// Shows warm white at the given brightness in percent.
    #[clap(name = "warm-white")]
    WarmWhite {
        percent: i32,

        /// Do not store the level across power cycles
        #[clap(long)]
        no_persist: bool,
    },
    /// Runs a built-in pattern, given by id (decimal or 0x-prefixed hex).
    #[clap(name = "preset")]
    Preset {
        #[clap(value_parser = parse_pattern_id)]
        pattern: u8,

        /// Animation speed in percent
        #[clap(long, default_value_t = 50)]
        speed: i32,
    },
    /// Cycles through up to sixteen colors.
    #[clap(name = "custom")]
    Custom {
        /// Colors as r,g,b. Repeat the flag for each color.
        #[clap(long = "colors", value_parser = parse_rgb, required = true, num_args = 1..)]
        colors: Vec<RGB>,

        /// Animation speed in percent
        #[clap(long, default_value_t = 50)]
        speed: i32,

        #[clap(long, value_enum, default_value_t = Transition::Gradual)]
        transition: Transition,
    },
    /// Prints the six timer slots.
    #[clap(name = "get-timers")]
    GetTimers,
    /// Deactivates all timers.
    #[clap(name = "clear-timers")]
    ClearTimers,
    /// Adds a timer next to the active ones already on the device.
    #[clap(name = "add-timer")]
    AddTimer {
        /// Time of day as HH:MM
        #[clap(long, value_parser = parse_time)]
        at: NaiveTime,

        /// Repeat on these days, e.g. "mo,we,fr" or "weekdays"
        #[clap(long, value_parser = parse_days, conflicts_with = "date")]
        days: Option<u8>,

        /// Run once on this date (YYYY-MM-DD). Defaults to the next
        /// occurrence of --at.
        #[clap(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        #[clap(subcommand)]
        action: TimerActionArg,
    },
    /// Prints the device clock.
    #[clap(name = "get-clock")]
    GetClock,
    /// Sets the device clock to the local time.
    #[clap(name = "set-clock")]
    SetClock,
    /// Refreshes the state periodically and prints a report after each poll.
    #[clap(name = "poll")]
    Poll {
        /// Time between polls in milliseconds
        #[clap(long, value_parser = parse_duration, default_value = "5000")]
        interval: Duration,

        /// Stop after this many polls
        #[clap(long)]
        count: Option<u32>,

        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
}

/// What a new timer does when it fires.
#[derive(Subcommand)]
pub enum TimerActionArg {
    /// Turns the device off.
    Off,
    /// Turns the device on with its last settings.
    Default,
    /// Shows a solid color.
    Color {
        #[clap(value_parser = parse_rgb)]
        color: RGB,
    },
    /// Shows warm white at the given brightness in percent.
    WarmWhite { percent: i32 },
    /// Runs a built-in pattern.
    Preset {
        #[clap(value_parser = parse_pattern_id)]
        pattern: u8,

        #[clap(long, default_value_t = 50)]
        speed: i32,
    },
}

impl TimerActionArg {
    fn into_action(self) -> Result<TimerAction> {
        Ok(match self {
            TimerActionArg::Off => TimerAction::TurnOff,
            TimerActionArg::Default => TimerAction::Default,
            TimerActionArg::Color { color } => TimerAction::Color(color),
            TimerActionArg::WarmWhite { percent } => TimerAction::warm_white_percent(percent),
            TimerActionArg::Preset { pattern, speed } => {
                TimerAction::preset(PresetPattern::new(pattern)?, speed)
            }
        })
    }
}

fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let millis = s
        .parse::<u64>()
        .map_err(|_| "could not parse duration in milliseconds")?;
    Ok(Duration::from_millis(millis))
}

fn parse_channel(value: &str) -> Result<u8, String> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("invalid color channel {:?}, expected 0-255", value))
}

fn parse_rgb(s: &str) -> Result<RGB, String> {
    let parts: Vec<&str> = s.split(',').collect();
    let [red, green, blue] = parts.as_slice() else {
        return Err(format!("expected r,g,b, got {:?}", s));
    };
    Ok(RGB::new(
        parse_channel(red)?,
        parse_channel(green)?,
        parse_channel(blue)?,
    ))
}

fn parse_pattern_id(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| format!("invalid pattern id {:?}", s))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_days(s: &str) -> Result<u8, String> {
    let mut mask = 0u8;
    for name in s.split(',') {
        mask |= preset::day_mask_from_name(name.trim())
            .ok_or_else(|| format!("unknown day {:?}", name))?;
    }
    if mask == 0 {
        return Err("no day given".to_string());
    }
    Ok(mask)
}

/// Appends `timer` to the pending timers in `existing`. Expired one-shot
/// timers are left out and counted. Fails before anything is sent when every
/// slot is taken or the new timer is already in the past.
fn merge_timer(
    existing: &[TimerSlot],
    timer: Timer,
    now: NaiveDateTime,
) -> Result<(Vec<TimerSlot>, usize)> {
    let new_slot = TimerSlot::Active(timer);
    if new_slot.is_expired(now) {
        return Err(anyhow!("The timer time has already passed"));
    }
    let (expired, mut slots): (Vec<TimerSlot>, Vec<TimerSlot>) = existing
        .iter()
        .filter(|slot| slot.is_active())
        .copied()
        .partition(|slot| slot.is_expired(now));
    if slots.len() >= TIMER_SLOT_COUNT {
        return Err(anyhow!(
            "All {} timer slots are in use, the new timer was not stored",
            TIMER_SLOT_COUNT
        ));
    }
    slots.push(new_slot);
    Ok((slots, expired.len()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn print_output<T: Serialize>(value: &T, output: OutputFormat, plaintext: String) -> Result<()> {
    match output {
        OutputFormat::Plaintext => println!("{}", plaintext),
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Discover { output, timeout } => {
            let devices =
                Discovery::scan(&config.discovery, Duration::from_millis(timeout)).await?;
            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::Presets => {
            for pattern in PresetPattern::all() {
                println!("0x{:02x}  {}", pattern.id(), pattern);
            }
        }
        Commands::DeviceCall {
            ip,
            id,
            port,
            action,
        } => {
            let address = DeviceAddress::new(
                ip,
                port.unwrap_or(config.session.port),
                id.as_deref().unwrap_or_default(),
                "",
            );
            let mut control = ControlInterface::open(address, config.session.clone()).await;

            match action {
                DeviceAction::State { output } => {
                    let state = control.refresh_state().await?;
                    print_output(state, output, state.to_string())?;
                }
                DeviceAction::On => {
                    control.turn_on().await?;
                    println!("Device turned on.");
                }
                DeviceAction::Off => {
                    control.turn_off().await?;
                    println!("Device turned off.");
                }
                DeviceAction::Color {
                    red,
                    green,
                    blue,
                    no_persist,
                } => {
                    let color = RGB::new(red, green, blue);
                    control.set_color(color, !no_persist).await?;
                    println!("Displayed color: {}", color);
                }
                DeviceAction::WarmWhite {
                    percent,
                    no_persist,
                } => {
                    control.set_warm_white(percent, !no_persist).await?;
                    println!("Warm white set to {}%", percent.clamp(0, 100));
                }
                DeviceAction::Preset { pattern, speed } => {
                    control.set_preset_pattern(pattern, speed).await?;
                    println!("Running pattern: {}", control.state());
                }
                DeviceAction::Custom {
                    colors,
                    speed,
                    transition,
                } => {
                    control
                        .set_custom_pattern(&colors, speed, transition)
                        .await?;
                    println!("Custom pattern started.");
                }
                DeviceAction::GetTimers => {
                    let timers = control.get_timers().await?;
                    println!("Timers on {}:", control.address());
                    for (index, slot) in timers.iter().enumerate() {
                        println!("  {}: {}", index + 1, slot);
                    }
                }
                DeviceAction::ClearTimers => {
                    control.send_timers(&[]).await?;
                    println!("All timers have been cleared from the device.");
                }
                DeviceAction::AddTimer {
                    at,
                    days,
                    date,
                    action,
                } => {
                    let action = action.into_action()?;
                    let now = Local::now().naive_local();
                    let timer = match days {
                        Some(days) => {
                            Timer::recurring(days, at.hour() as u8, at.minute() as u8, action)?
                        }
                        None => {
                            let date = date.unwrap_or_else(|| {
                                if at > now.time() {
                                    now.date()
                                } else {
                                    now.date().succ_opt().unwrap_or(now.date())
                                }
                            });
                            Timer::once_at(date.and_time(at), action)
                        }
                    };

                    let existing = control.get_timers().await?;
                    let (slots, expired) = merge_timer(existing.slots(), timer, now)?;

                    let upload = control.send_timers(&slots).await?;
                    let removed = expired + upload.dropped;
                    if removed > 0 {
                        println!("Removed {} expired timer(s).", removed);
                    }
                    println!("Timer added: {}", TimerSlot::Active(timer));
                }
                DeviceAction::GetClock => match control.get_clock().await? {
                    Some(clock) => println!("Device clock: {}", clock),
                    None => println!("Device clock is not set."),
                },
                DeviceAction::SetClock => {
                    let clock = control.set_clock().await?;
                    println!("Device clock set to {}", clock);
                }
                DeviceAction::Poll {
                    interval,
                    count,
                    output,
                } => {
                    let mut health = LinkHealth::new(config.reconnect.clone(), Instant::now());
                    let mut ticker = tokio::time::interval(interval);
                    let mut polls = 0u32;

                    loop {
                        ticker.tick().await;
                        match control.refresh_state().await {
                            Ok(_) => health.record_success(Instant::now()),
                            Err(e) => {
                                warn!("Refreshing {} failed: {}", control.address(), e);
                                if health.record_failure() {
                                    control.disconnect().await;
                                    control.connect().await;
                                }
                            }
                        }

                        let mut report = control.report();
                        report.connected &= !health.is_offline(Instant::now());
                        let plaintext = format!(
                            "connected: {}  color: {}  power: {}%",
                            report.connected, report.color, report.power
                        );
                        print_output(&report, output, plaintext)?;

                        polls += 1;
                        if count.is_some_and(|limit| polls >= limit) {
                            break;
                        }
                    }
                }
            }

            control.disconnect().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use magichome_lib::protocol::preset::days;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    fn daily(hour: u8) -> TimerSlot {
        TimerSlot::Active(Timer::recurring(days::EVERYDAY, hour, 0, TimerAction::TurnOff).unwrap())
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("mo,we"), Ok(days::MONDAY | days::WEDNESDAY));
        assert_eq!(parse_days("weekdays"), Ok(days::WEEKDAYS));
        assert!(parse_days("someday").is_err());
        assert!(parse_days("").is_err());
    }

    #[test]
    fn test_zero_warm_white_timer_turns_off() {
        let action = TimerActionArg::WarmWhite { percent: 0 }.into_action().unwrap();
        assert_eq!(action, TimerAction::TurnOff);
    }

    #[test]
    fn test_merge_timer_appends_to_active() {
        let now = at(2025, 1, 1, 0);
        let existing = [daily(6), TimerSlot::Inactive, daily(7)];
        let timer = Timer::once(2025, 1, 2, 8, 0, TimerAction::Default);
        let (slots, expired) = merge_timer(&existing, timer, now).unwrap();
        assert_eq!(expired, 0);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[..2], [daily(6), daily(7)]);
    }

    #[test]
    fn test_merge_timer_refuses_when_full() {
        let now = at(2025, 1, 1, 0);
        let existing: Vec<TimerSlot> = (0..6).map(daily).collect();
        let timer = Timer::recurring(days::MONDAY, 9, 0, TimerAction::Default).unwrap();
        assert!(merge_timer(&existing, timer, now).is_err());
    }

    #[test]
    fn test_merge_timer_frees_expired_slots() {
        let now = at(2025, 1, 1, 0);
        let mut existing: Vec<TimerSlot> = (0..5).map(daily).collect();
        existing.push(TimerSlot::Active(Timer::once(2024, 12, 31, 8, 0, TimerAction::TurnOff)));
        let timer = Timer::recurring(days::MONDAY, 9, 0, TimerAction::Default).unwrap();

        let (slots, expired) = merge_timer(&existing, timer, now).unwrap();
        assert_eq!(expired, 1);
        assert_eq!(slots.len(), TIMER_SLOT_COUNT);
        assert_eq!(slots[5], TimerSlot::Active(timer));
    }

    #[test]
    fn test_merge_timer_rejects_past_timer() {
        let now = at(2025, 1, 1, 12);
        let timer = Timer::once(2025, 1, 1, 11, 0, TimerAction::TurnOff);
        assert!(merge_timer(&[], timer, now).is_err());
    }
}
