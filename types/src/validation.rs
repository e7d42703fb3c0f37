use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use thiserror::Error;

pub const MAX_DISPLAY_NAME_LEN: usize = 32;
pub const MAX_ROOM_CODE_LEN: usize = 16;
pub const JOIN_CODE_LEN: usize = 6;
pub const DEFAULT_TIME_LIMIT_MS: u64 = 15_000;
pub const MAX_TIME_LIMIT_MS: u64 = 120_000;

// No 0/O or 1/I so codes read back cleanly off a projector.
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Display name is required")]
    EmptyDisplayName,

    #[error("Display name must be at most {MAX_DISPLAY_NAME_LEN} characters")]
    DisplayNameTooLong,

    #[error("Room code is required")]
    EmptyRoomCode,

    #[error("Room code must be 1-{MAX_ROOM_CODE_LEN} letters, digits or dashes")]
    InvalidRoomCode,

    #[error("Time limit must be between 1 and {MAX_TIME_LIMIT_MS} ms")]
    InvalidTimeLimit,
}

fn room_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9-]{1,16}$").expect("room code pattern is a valid regex")
    })
}

pub fn display_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyDisplayName);
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::DisplayNameTooLong);
    }
    Ok(name.to_string())
}

/// Trims and upper-cases a room code so joins are case-insensitive.
pub fn room_code(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ValidationError::EmptyRoomCode);
    }
    if !room_code_pattern().is_match(code) {
        return Err(ValidationError::InvalidRoomCode);
    }
    Ok(code.to_ascii_uppercase())
}

pub fn time_limit_ms(raw: Option<u64>) -> Result<u64, ValidationError> {
    match raw {
        None => Ok(DEFAULT_TIME_LIMIT_MS),
        Some(ms) if ms == 0 || ms > MAX_TIME_LIMIT_MS => Err(ValidationError::InvalidTimeLimit),
        Some(ms) => Ok(ms),
    }
}

pub fn generate_join_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}
