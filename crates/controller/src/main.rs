//! Command-line front end.
//!
//! `simulate` runs a G-code program through the full planner/step-gen stack
//! in-process, against the simulated HAL — a dry-run for CI and smoke
//! testing. `stream` forwards a program to a real controller over a serial
//! link and prints back whatever it answers, a dumb terminal in the spirit
//! of any other `ok`/`error`-line console.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use controller::ControllerMachine;
use gcode::{format_error, format_ok, LineEvent, LineReader};
use settings::SettingsRecord;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "controller", about = "Drive a motion controller, real or simulated")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program in-process against the simulated HAL.
    Simulate {
        /// Path to a G-code file.
        path: PathBuf,
    },
    /// Stream a program to a real controller over a serial port.
    Stream {
        /// Serial device path, e.g. /dev/ttyUSB0.
        port: String,
        /// Path to a G-code file.
        path: PathBuf,
        /// Baud rate.
        #[arg(long, default_value_t = 115_200)]
        baud: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate { path } => simulate(&path),
        Command::Stream { port, path, baud } => stream(&port, baud, &path).await,
    }
}

fn simulate(path: &PathBuf) -> Result<()> {
    let program = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut machine = ControllerMachine::new(SettingsRecord::default());
    let mut reader = LineReader::new();

    for byte in program.bytes().chain(std::iter::once(b'\n')) {
        match reader.feed(byte) {
            LineEvent::Pending => {}
            LineEvent::Blank => {}
            LineEvent::Complete(line) => dispatch(&mut machine, &line),
        }
    }
    Ok(())
}

fn dispatch(machine: &mut ControllerMachine, line: &str) {
    if line == "?" {
        print!("{}", machine.status_report());
        return;
    }
    match machine.execute_line(line) {
        Ok(output) => {
            for echoed in output {
                print!("{}", echoed);
            }
            print!("{}", format_ok());
        }
        Err(error) => print!("{}", format_error(error)),
    }
}

async fn stream(port: &str, baud: u32, path: &PathBuf) -> Result<()> {
    use tokio_serial::SerialPortBuilderExt;

    let program = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let serial = tokio_serial::new(port, baud)
        .open_native_async()
        .with_context(|| format!("opening serial port {port}"))?;
    let (read_half, mut write_half) = tokio::io::split(serial);
    let mut responses = BufReader::new(read_half).lines();

    for line in program.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        write_half.write_all(trimmed.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;

        loop {
            match responses.next_line().await? {
                Some(response) => {
                    println!("{response}");
                    if response.starts_with("ok") || response.starts_with("error") {
                        break;
                    }
                }
                None => anyhow::bail!("serial port closed while waiting for a response"),
            }
        }
    }
    Ok(())
}
