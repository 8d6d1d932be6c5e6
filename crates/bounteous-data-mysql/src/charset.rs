//! MySQL character sets and their default collation ids.

/// utf8mb4_0900_ai_ci (MySQL 8.0 default)
pub const UTF8MB4_0900_AI_CI: u8 = 255;
/// utf8mb4_general_ci (MySQL 5.7 / MariaDB default for utf8mb4)
pub const UTF8MB4_GENERAL_CI: u8 = 45;
/// utf8mb3_general_ci
pub const UTF8MB3_GENERAL_CI: u8 = 33;
/// latin1_swedish_ci
pub const LATIN1_SWEDISH_CI: u8 = 8;
/// ascii_general_ci
pub const ASCII_GENERAL_CI: u8 = 11;
/// ucs2_general_ci
pub const UCS2_GENERAL_CI: u8 = 35;
/// utf16_general_ci
pub const UTF16_GENERAL_CI: u8 = 54;
/// utf32_general_ci
pub const UTF32_GENERAL_CI: u8 = 60;
/// binary
pub const BINARY: u8 = 63;

/// Default charset for new connections.
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Default collation id for a charset name (case-insensitive).
pub fn collation_id(charset: &str) -> Option<u8> {
    let id = match charset.to_ascii_lowercase().as_str() {
        "utf8mb4" => UTF8MB4_0900_AI_CI,
        "utf8mb3" | "utf8" => UTF8MB3_GENERAL_CI,
        "latin1" => LATIN1_SWEDISH_CI,
        "ascii" => ASCII_GENERAL_CI,
        "ucs2" => UCS2_GENERAL_CI,
        "utf16" => UTF16_GENERAL_CI,
        "utf32" => UTF32_GENERAL_CI,
        "binary" => BINARY,
        _ => return None,
    };
    Some(id)
}

/// Whether `charset` names a supported character set.
pub fn is_supported(charset: &str) -> bool {
    collation_id(charset).is_some()
}
