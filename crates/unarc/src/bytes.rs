//! Human byte sizes for command-line flags: `512k`, `16MB`, `50g`, `1024`.

const UNITS: &[(&str, u64)] = &[
    ("gb", 1 << 30),
    ("mb", 1 << 20),
    ("kb", 1 << 10),
    ("g", 1 << 30),
    ("m", 1 << 20),
    ("k", 1 << 10),
    ("b", 1),
];

pub fn parse_bytes(raw: &str) -> Result<u64, String> {
    let lower = raw.trim().to_ascii_lowercase();
    let (digits, unit) = UNITS
        .iter()
        .find_map(|(suffix, unit)| lower.strip_suffix(suffix).map(|d| (d, *unit)))
        .unwrap_or((lower.as_str(), 1));

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid byte size '{raw}': {e}"))?;
    value
        .checked_mul(unit)
        .ok_or_else(|| format!("byte size '{raw}' is too large"))
}

/// Largest whole unit that represents `bytes` exactly.
pub fn format_bytes(bytes: u64) -> String {
    for (suffix, unit) in &UNITS[3..6] {
        if bytes >= *unit && bytes % unit == 0 {
            return format!("{}{suffix}", bytes / unit);
        }
    }
    bytes.to_string()
}
