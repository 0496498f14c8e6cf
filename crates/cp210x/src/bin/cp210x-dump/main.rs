//! cp210x-dump
//!
//! Opens a CP210x bridge and streams everything it receives to stdout.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::setup_logging;
use cp210x::{Config, OpenMode, RusbTransport, SerialLink};
use rusb::UsbContext;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cp210x-dump")]
#[command(
    author,
    version,
    about = "Dump the data received by a CP210x USB-to-UART bridge"
)]
#[command(long_about = "
Opens the first CP210x bridge (10c4:ea60), programs the UART and writes every
received byte to stdout. Log output goes to stderr.

EXAMPLES:
    # Dump at 115200 baud for 10 seconds
    cp210x-dump --baud 115200 --seconds 10

    # Use a file descriptor handed over by another process (e.g. Android)
    cp210x-dump --fd 7

    # Read through the buffered pumps instead of direct transfers
    cp210x-dump --buffered

    # Show raw traffic
    cp210x-dump --traffic

    # Framing and flow control come from the [line] section of the config
    cp210x-dump --config ~/cp210x-7e1.toml
")]
struct Args {
    /// Already opened USB device file descriptor to wrap
    #[arg(long, value_name = "FD")]
    fd: Option<i32>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Baud rate, overriding the configuration
    #[arg(short, long, value_name = "RATE")]
    baud: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Stop after this many seconds (runs until the device fails otherwise)
    #[arg(short, long, value_name = "SECONDS")]
    seconds: Option<u64>,

    /// Read through the RX buffer fed by the read pump
    #[arg(long)]
    buffered: bool,

    /// Log every received and sent packet
    #[arg(long)]
    traffic: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = Config::default();
        let path = Config::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        Config::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        Config::load_or_default()
    };
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let traffic = args.traffic || config.logging.traffic;
    setup_logging(log_level, traffic).context("Failed to setup logging")?;

    info!("cp210x-dump v{}", env!("CARGO_PKG_VERSION"));

    let transport = Arc::new(RusbTransport::new(open_device(args.fd)?));
    let mut link = SerialLink::new(transport, config.link).context("Failed to set up link")?;

    let mode = if args.buffered {
        OpenMode::Async
    } else {
        OpenMode::Sync
    };
    link.open(mode).context("Failed to open link")?;
    link.apply_line_settings(&config.line)
        .context("Failed to apply line settings")?;

    let until = args.seconds.map(Duration::from_secs);
    let result = if args.buffered {
        dump_buffered(&link, until)
    } else {
        let mut stdout = std::io::stdout().lock();
        link.dump_to(&mut stdout, until)
            .context("Transfer failed")
    };

    if let Err(e) = link.close() {
        warn!("Error closing link: {}", e);
    }

    let total = result?;
    info!("Received {} bytes", total);
    Ok(())
}

fn open_device(fd: Option<i32>) -> Result<rusb::DeviceHandle<rusb::Context>> {
    let context = rusb::Context::new().context("Failed to initialise libusb")?;

    match fd {
        #[cfg(unix)]
        Some(fd) => {
            // SAFETY: the caller hands over an open usbfs descriptor it no
            // longer uses; libusb takes it over for the handle's lifetime.
            let handle = unsafe { context.open_device_with_fd(fd) }
                .with_context(|| format!("Failed to wrap file descriptor {}", fd))?;
            Ok(handle)
        }
        #[cfg(not(unix))]
        Some(_) => Err(anyhow!("--fd is only supported on Unix")),
        None => context
            .open_device_with_vid_pid(protocol::VENDOR_ID, protocol::PRODUCT_ID)
            .ok_or_else(|| {
                anyhow!(
                    "No CP210x device ({:04x}:{:04x}) found",
                    protocol::VENDOR_ID,
                    protocol::PRODUCT_ID
                )
            }),
    }
}

fn dump_buffered(link: &SerialLink<RusbTransport>, until: Option<Duration>) -> Result<u64> {
    let deadline = common::Deadline::new(until);
    let mut stdout = std::io::stdout().lock();
    let mut total = 0u64;

    while !deadline.expired() {
        link.wait_for_rx(Some(deadline.next_wait(Duration::from_millis(200))));
        let data = link.read(None, None).context("Read failed")?;
        if !data.is_empty() {
            stdout.write_all(&data)?;
            stdout.flush()?;
            total += data.len() as u64;
        }
    }
    Ok(total)
}
