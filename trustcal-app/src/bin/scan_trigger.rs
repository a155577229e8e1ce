//! Sends one command byte to the scanning robot and prints its reply.
//!
//!     scan-trigger --list
//!     scan-trigger --port /dev/ttyUSB0 --command 1

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serial2::SerialPort;
use std::path::PathBuf;
use trustcal_experiment::device::{open_port, read_reply, send_command};
use trustcal_experiment::{ScanCommand, SerialSettings};
use trustcal_timing::{HighPrecisionTimer, Timer};

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
struct TriggerArgs {
    /// Print the available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Serial port of the device
    #[arg(short, long, required_unless_present = "list")]
    port: Option<PathBuf>,

    /// Baud rate of the serial link
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// Command byte: 1 scan, 2 zoom scan, 3 next item
    #[arg(short, long, default_value_t = '1')]
    command: char,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TriggerArgs::parse();

    if args.list {
        println!("Available devices:");
        for port in SerialPort::available_ports().context("failed to list serial ports")? {
            println!("\t{}", port.to_string_lossy());
        }
        return Ok(());
    }

    let command = u8::try_from(args.command)
        .ok()
        .and_then(ScanCommand::from_byte)
        .with_context(|| format!("unknown command '{}'", args.command))?;
    let port = args.port.context("--port is required")?;
    let settings = SerialSettings::new(port, args.baud);

    let mut port = open_port(&settings)
        .with_context(|| format!("failed to connect to {}", settings.port.display()))?;
    info!("Connected to {}", settings.port.display());
    HighPrecisionTimer::new().sleep(settings.settle);

    send_command(&mut port, command).context("failed to send command")?;
    if command.expects_reply() {
        let reply = read_reply(&mut port).context("failed to read device reply")?;
        println!("Device response: {reply}");
    } else {
        info!("Sent '{}'", args.command);
    }
    Ok(())
}
