//! Mapping between abstract key names and the byte sequences sent to the pty.

use crate::error::{HarnessError, HarnessResult};

/// Byte sequence for the Enter key.
pub const CODE_ENTER: &[u8] = b"\r";
/// Byte sequence for PageUp.
pub const CODE_PAGE_UP: &[u8] = b"\x1b[5~";
/// Byte sequence for PageDown.
pub const CODE_PAGE_DOWN: &[u8] = b"\x1b[6~";
/// Byte sequences for F1 through F11, in order.
pub const CODE_FN: [&[u8]; 11] = [
    b"\x1bOP",
    b"\x1bOQ",
    b"\x1bOR",
    b"\x1bOS",
    b"\x1b[15~",
    b"\x1b[17~",
    b"\x1b[18~",
    b"\x1b[19~",
    b"\x1b[20~",
    b"\x1b[21~",
    b"\x1b[23~",
];

const SPECIAL_KEYS: &[&str] = &["Enter", "PageUp", "PageDown", "F1..F11"];

fn function_key_bytes(name: &str) -> Option<&'static [u8]> {
    let number: usize = name.strip_prefix('F')?.parse().ok()?;
    (1..=CODE_FN.len())
        .contains(&number)
        .then(|| CODE_FN.get(number - 1).copied())
        .flatten()
}

/// Whether `name` is a recognized abstract key name.
///
/// Any single character is always recognized and maps to itself.
pub fn is_known_key(name: &str) -> bool {
    name.chars().count() == 1 || encode_key(name).is_ok()
}

/// Translate an abstract key name into the bytes written to the pty.
///
/// Single characters map to their own UTF-8 encoding. Unknown multi-character
/// names are a playbook-format error, never silently dropped.
pub fn encode_key(name: &str) -> HarnessResult<Vec<u8>> {
    if name.chars().count() == 1 {
        return Ok(name.as_bytes().to_vec());
    }
    let bytes = match name {
        "Enter" => CODE_ENTER,
        "PageUp" => CODE_PAGE_UP,
        "PageDown" => CODE_PAGE_DOWN,
        other => function_key_bytes(other).ok_or_else(|| {
            HarnessError::playbook(
                format!("unrecognized key '{other}'"),
                serde_json::json!({
                    "received_key": other,
                    "supported_keys": SPECIAL_KEYS,
                    "note": "single characters map to themselves",
                }),
            )
        })?,
    };
    Ok(bytes.to_vec())
}
