//! Port name enumeration and the "highest numbered port" convention.
//!
//! A freshly plugged board is usually the most recently enumerated port,
//! which on Windows means the largest `COMn` and on Linux the largest
//! `/dev/ttyACMn`.

use tracing::{debug, warn};

/// Names of every serial port the OS currently reports.
///
/// Enumeration failures are logged and yield an empty list.
pub fn list_port_names() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Prefix used for auto-selection on this platform.
pub fn default_port_prefix() -> &'static str {
    if cfg!(windows) {
        "COM"
    } else {
        "/dev/ttyACM"
    }
}

/// Trailing number of `name` when it is `prefix` followed by digits.
fn port_number(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Pick the highest numbered `<prefix><n>` from `names`.
///
/// Names that do not match the convention are skipped. With no candidates
/// the result is `<prefix>0`.
///
/// ```
/// use arduino_serial::port::highest_numbered_port;
///
/// let names = ["COM3", "COM9", "COM1"];
/// assert_eq!(highest_numbered_port(&names, "COM"), "COM9");
/// assert_eq!(highest_numbered_port::<&str>(&[], "COM"), "COM0");
/// ```
pub fn highest_numbered_port<S: AsRef<str>>(names: &[S], prefix: &str) -> String {
    let highest = names
        .iter()
        .filter_map(|name| {
            let parsed = port_number(name.as_ref(), prefix);
            if parsed.is_none() {
                debug!("Skipping port {:?}: no numeric suffix after {:?}", name.as_ref(), prefix);
            }
            parsed
        })
        .max()
        .unwrap_or(0);

    format!("{prefix}{highest}")
}

/// Enumerate ports and pick the highest numbered one with `prefix`.
pub fn find_highest_port(prefix: &str) -> String {
    let names = list_port_names();
    let selected = highest_numbered_port(&names, prefix);
    debug!("Selected {} from {} available port(s)", selected, names.len());
    selected
}
