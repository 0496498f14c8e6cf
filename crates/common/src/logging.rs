//! Logging setup and configuration

use std::fmt::Write;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target used for raw RX/TX traffic, so it can be filtered on its own
/// (e.g. `RUST_LOG=info,cp210x::rxtx=debug`)
pub const RXTX_TARGET: &str = "cp210x::rxtx";

/// Filter used when `RUST_LOG` is unset
///
/// Raw traffic is logged at debug/trace on [`RXTX_TARGET`], so it is held to
/// `warn` (data-loss reports only) unless `traffic` asks for every packet.
pub fn default_filter(level: &str, traffic: bool) -> String {
    let rxtx_level = if traffic { "trace" } else { "warn" };
    format!("{},{}={}", level, RXTX_TARGET, rxtx_level)
}

/// Install the stderr subscriber
///
/// `RUST_LOG` takes precedence over [`default_filter`].
pub fn setup_logging(default_level: &str, traffic: bool) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(default_level, traffic)))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Format bytes as space-separated hex followed by their printable ASCII
pub fn hex_line(data: &[u8]) -> String {
    let mut line = String::with_capacity(data.len() * 4 + 2);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{:02x}", byte);
    }
    line.push_str("  ");
    line.extend(data.iter().map(|&b| {
        if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            '.'
        }
    }));
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_holds_back_traffic() {
        assert_eq!(default_filter("info", false), "info,cp210x::rxtx=warn");
        assert_eq!(default_filter("debug", true), "debug,cp210x::rxtx=trace");
        assert!(EnvFilter::try_new(default_filter("warn", true)).is_ok());
    }

    #[test]
    fn test_hex_line() {
        assert_eq!(hex_line(b"AB\n"), "41 42 0a  AB.");
        assert_eq!(hex_line(&[]), "  ");
    }
}
