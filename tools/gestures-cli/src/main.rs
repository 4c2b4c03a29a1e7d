//! Companion CLI for the gesture engine (spec §6 CLI surface), grounded on
//! `examples/original_source/tools/shared.c`'s option table.
//!
//! Device enumeration is out of scope for the library (spec §1), so this
//! tool does not open real kernel devices. Instead it replays a
//! newline-delimited synthetic event script — analogous to how `litest`
//! drives a fake device in the original test suite — and prints the
//! decoded semantic event stream.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use evdev_gestures::device::{AbsInfo, Device, DeviceCapability, Identity};
use evdev_gestures::dispatch::DeviceDispatch;
use evdev_gestures::event::{codes, DeviceId, RawEvent, SemanticEvent};
use evdev_gestures::seat::Seat;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScrollMethodArg {
    None,
    Twofinger,
    Edge,
    Button,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClickMethodArg {
    None,
    Clickfinger,
    Buttonareas,
}

/// Replay a synthetic evdev event script through the gesture engine.
#[derive(Debug, Parser)]
#[command(name = "gestures-cli", version, about)]
struct Cli {
    /// Path to a device to open (accepted for CLI-surface parity; this tool
    /// does not actually open kernel devices).
    #[arg(long)]
    device: Option<PathBuf>,

    /// Use udev device discovery on the given seat (accepted for CLI-surface
    /// parity; not implemented by this tool).
    #[arg(long)]
    udev: Option<Option<String>>,

    /// Path to the synthetic event script; reads stdin if omitted.
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long = "enable-tap", conflicts_with = "disable_tap")]
    enable_tap: bool,
    #[arg(long = "disable-tap")]
    disable_tap: bool,

    #[arg(long = "enable-natural-scrolling", conflicts_with = "disable_natural_scrolling")]
    enable_natural_scrolling: bool,
    #[arg(long = "disable-natural-scrolling")]
    disable_natural_scrolling: bool,

    #[arg(long = "enable-left-handed", conflicts_with = "disable_left_handed")]
    enable_left_handed: bool,
    #[arg(long = "disable-left-handed")]
    disable_left_handed: bool,

    #[arg(long = "set-click-method", value_enum)]
    click_method: Option<ClickMethodArg>,

    #[arg(long = "set-scroll-method", value_enum)]
    scroll_method: Option<ScrollMethodArg>,

    /// Button code name for BUTTON scroll mode, e.g. `BTN_MIDDLE`.
    #[arg(long = "set-scroll-button")]
    scroll_button: Option<String>,

    #[arg(long = "set-speed")]
    speed: Option<f64>,

    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read event script: {0}")]
    Io(#[from] io::Error),
    #[error("malformed event script line {line}: {text:?}")]
    Malformed { line: usize, text: String },
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "evdev_gestures=trace,gestures_cli=trace" } else { "evdev_gestures=info,gestures_cli=info" };
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(filter)).init();

    if let Some(path) = &cli.device {
        tracing::info!(?path, "--device accepted but ignored: this tool replays synthetic scripts only");
    }

    let mut device = build_device();
    apply_cli_config(&cli, &mut device);

    let mut seat = Seat::new("seat0");
    let mut dispatch = DeviceDispatch::for_device(&device);

    let script = read_script(cli.script.as_deref())?;
    for (lineno, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = parse_event(line).ok_or_else(|| CliError::Malformed { line: lineno + 1, text: line.to_string() })?;
        dispatch.ingest(&mut device, &mut seat, event, &mut |event: SemanticEvent| println!("{event:?}"));
    }

    Ok(())
}

fn read_script(path: Option<&std::path::Path>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn build_device() -> Device {
    let abs = AbsInfo { min: 0, max: 3000, resolution: 40, fake_resolution: false };
    Device::new(
        DeviceId(0),
        Identity { name: "synthetic".into(), vendor: 0, product: 0, bustype: 0 },
        DeviceCapability::TOUCH | DeviceCapability::POINTER,
        abs,
        abs,
        5,
        1000,
    )
}

fn apply_cli_config(cli: &Cli, device: &mut Device) {
    if cli.enable_tap {
        device.config.tap_enabled = true;
    }
    if cli.disable_tap {
        device.config.tap_enabled = false;
    }
    if cli.enable_natural_scrolling {
        device.config.natural_scroll = true;
        device.scroll.natural_scroll = true;
    }
    if cli.disable_natural_scrolling {
        device.config.natural_scroll = false;
        device.scroll.natural_scroll = false;
    }
    if cli.enable_left_handed {
        device.config.request_left_handed(true);
        device.config.apply_pending();
    }
    if cli.disable_left_handed {
        device.config.request_left_handed(false);
        device.config.apply_pending();
    }
    if let Some(method) = cli.scroll_method {
        device.scroll.want_method = match method {
            ScrollMethodArg::None => evdev_gestures::scroll::ScrollMethod::None,
            ScrollMethodArg::Twofinger => evdev_gestures::scroll::ScrollMethod::TwoFinger,
            ScrollMethodArg::Edge => evdev_gestures::scroll::ScrollMethod::Edge,
            ScrollMethodArg::Button => evdev_gestures::scroll::ScrollMethod::Button,
        };
        device.scroll.apply_pending_method();
    }
    if let Some(name) = &cli.scroll_button {
        if let Some(code) = button_code_by_name(name) {
            device.scroll.button = code;
        } else {
            tracing::warn!(%name, "unrecognized scroll button name, ignoring");
        }
    }
    if let Some(speed) = cli.speed {
        device.config.set_accel_speed(speed);
        device.filter.set_speed(device.config.accel_speed);
    }
    // --set-click-method is accepted for CLI-surface parity; clickpad button
    // areas vs. clickfinger is a palm/press-location heuristic out of this
    // engine's scope (external collaborator), so it has no effect here.
    let _ = cli.click_method;
}

fn button_code_by_name(name: &str) -> Option<u32> {
    match name {
        "BTN_LEFT" => Some(codes::BTN_LEFT),
        "BTN_RIGHT" => Some(codes::BTN_RIGHT),
        "BTN_MIDDLE" => Some(codes::BTN_MIDDLE),
        _ => None,
    }
}

/// Parse one script line: `<time_ms> <TYPE> <CODE> <VALUE>`, e.g.
/// `0 EV_ABS ABS_MT_SLOT 0` or `180 EV_SYN SYN_REPORT 0`.
fn parse_event(line: &str) -> Option<RawEvent> {
    let mut parts = line.split_whitespace();
    let time: u64 = parts.next()?.parse().ok()?;
    let kind = type_by_name(parts.next()?)?;
    let code = code_by_name(parts.next()?)?;
    let value: i32 = parts.next()?.parse().ok()?;
    Some(RawEvent::new(kind, code, value, time))
}

fn type_by_name(name: &str) -> Option<u32> {
    match name {
        "EV_SYN" => Some(codes::EV_SYN),
        "EV_KEY" => Some(codes::EV_KEY),
        "EV_REL" => Some(codes::EV_REL),
        "EV_ABS" => Some(codes::EV_ABS),
        _ => None,
    }
}

fn code_by_name(name: &str) -> Option<u32> {
    match name {
        "SYN_REPORT" => Some(codes::SYN_REPORT),
        "SYN_DROPPED" => Some(codes::SYN_DROPPED),
        "REL_X" => Some(codes::REL_X),
        "REL_Y" => Some(codes::REL_Y),
        "REL_WHEEL" => Some(codes::REL_WHEEL),
        "REL_HWHEEL" => Some(codes::REL_HWHEEL),
        "ABS_X" => Some(codes::ABS_X),
        "ABS_Y" => Some(codes::ABS_Y),
        "ABS_MT_SLOT" => Some(codes::ABS_MT_SLOT),
        "ABS_MT_POSITION_X" => Some(codes::ABS_MT_POSITION_X),
        "ABS_MT_POSITION_Y" => Some(codes::ABS_MT_POSITION_Y),
        "ABS_MT_TRACKING_ID" => Some(codes::ABS_MT_TRACKING_ID),
        "BTN_LEFT" => Some(codes::BTN_LEFT),
        "BTN_RIGHT" => Some(codes::BTN_RIGHT),
        "BTN_MIDDLE" => Some(codes::BTN_MIDDLE),
        "BTN_TOUCH" => Some(codes::BTN_TOUCH),
        other => other.strip_prefix("0x").and_then(|hex| u32::from_str_radix(hex, 16).ok()),
    }
}
