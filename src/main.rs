//! pollkb - Polling GPIO Keyboard
//!
//! Exposes a handful of GPIO switches as a keyboard by polling their levels.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use pollkb::{
    KeyboardConfig, LineAccess, LogSink, PollingKeyboard, ReportingSink, SimulatedLines,
};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG=debug shows every transition
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("pollkb")
        .version(pollkb::VERSION)
        .about("Expose GPIO switches as a keyboard by polling them")
        .long_about(
            "pollkb samples a fixed table of active-low GPIO lines at a jittered rate \
             around a nominal frequency and reports every level change as a key event.",
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with the line table (default: user config dir)"),
        )
        .arg(
            Arg::new("frequency")
                .long("frequency")
                .short('f')
                .value_name("HZ")
                .value_parser(value_parser!(u32))
                .help("Override the nominal polling frequency"),
        )
        .arg(
            Arg::new("chip")
                .long("chip")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value("/dev/gpiochip0")
                .help("GPIO character device the lines live on"),
        )
        .arg(
            Arg::new("sink")
                .long("sink")
                .value_parser(["log", "uinput"])
                .default_value("log")
                .help("Where key events are reported"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .action(ArgAction::SetTrue)
                .help("Use simulated lines that press each key in turn"),
        )
        .get_matches();

    let mut config = load_config(matches.get_one::<PathBuf>("config"))?;
    if let Some(&hz) = matches.get_one::<u32>("frequency") {
        config.frequency_hz = hz;
    }

    let simulate = matches.get_flag("simulate");
    let simulated = SimulatedLines::new();
    let access: Box<dyn LineAccess> = if simulate {
        Box::new(simulated.clone())
    } else {
        hardware_lines(matches.get_one::<PathBuf>("chip"))?
    };

    let sink_name = matches
        .get_one::<String>("sink")
        .map(String::as_str)
        .unwrap_or("log");
    let sink = make_sink(sink_name)?;

    let keyboard = PollingKeyboard::start(&config, access, sink)
        .with_context(|| format!("starting {}", config.device.name))?;

    let demo = simulate.then(|| tokio::spawn(press_each_key(simulated, config.clone())));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");

    if let Some(demo) = demo {
        demo.abort();
    }
    tokio::task::spawn_blocking(move || keyboard.stop())
        .await
        .context("joining shutdown task")?;

    Ok(())
}

#[cfg(feature = "config")]
fn load_config(path: Option<&PathBuf>) -> Result<KeyboardConfig> {
    let config = match path {
        Some(path) => KeyboardConfig::load(path)?,
        None => KeyboardConfig::discover()?,
    };
    Ok(config)
}

#[cfg(not(feature = "config"))]
fn load_config(path: Option<&PathBuf>) -> Result<KeyboardConfig> {
    if path.is_some() {
        anyhow::bail!("pollkb was built without the `config` feature");
    }
    Ok(KeyboardConfig::default())
}

#[cfg(target_os = "linux")]
fn hardware_lines(chip: Option<&PathBuf>) -> Result<Box<dyn LineAccess>> {
    let lines = match chip {
        Some(path) => pollkb::CdevLines::new(path),
        None => pollkb::CdevLines::default(),
    };
    Ok(Box::new(lines))
}

#[cfg(not(target_os = "linux"))]
fn hardware_lines(_chip: Option<&PathBuf>) -> Result<Box<dyn LineAccess>> {
    anyhow::bail!("GPIO lines are only supported on Linux; use --simulate")
}

fn make_sink(name: &str) -> Result<Box<dyn ReportingSink>> {
    match name {
        "log" => Ok(Box::new(LogSink::new())),
        #[cfg(all(feature = "uinput", target_os = "linux"))]
        "uinput" => Ok(Box::new(pollkb::sink::UinputSink::new())),
        other => anyhow::bail!("sink `{other}` is not available in this build"),
    }
}

/// Drive the simulated lines: press and release every configured key in turn.
async fn press_each_key(lines: SimulatedLines, config: KeyboardConfig) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        for entry in &config.lines {
            ticker.tick().await;
            lines.set_pressed(entry.line, true);
            ticker.tick().await;
            lines.set_pressed(entry.line, false);
        }
    }
}
