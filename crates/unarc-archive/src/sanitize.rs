use crate::error::{Error, Result};

/// Normalize a raw archive member name into a safe, `/`-separated relative path.
///
/// Empty and `.` components are dropped and `..` folds into its parent. Names
/// that are absolute, carry a drive prefix, or climb above the archive root are
/// rejected (zip-slip protection).
pub fn sanitize_entry_name(raw: &str) -> Result<String> {
    if raw.contains('\0') {
        return Err(Error::InvalidPath {
            entry: raw.to_string(),
        });
    }
    if raw.starts_with('/') || has_drive_prefix(raw) {
        return Err(Error::UnsafePath {
            entry: raw.to_string(),
        });
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(Error::UnsafePath {
                        entry: raw.to_string(),
                    });
                }
            }
            part => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath {
            entry: raw.to_string(),
        });
    }
    Ok(parts.join("/"))
}

/// Replace legacy Windows `\` separators with `/`.
pub fn normalize_separators(raw: &str) -> String {
    raw.replace('\\', "/")
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
