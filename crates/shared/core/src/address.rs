//! Chain account addresses (`0x` followed by 20 hex-encoded bytes)

/// Length of a hex address including the `0x` prefix
pub const ADDRESS_HEX_LEN: usize = 2 + 2 * 20;

/// Check that `address` is a syntactically valid account address.
///
/// Mixed case is accepted; no checksum validation is performed.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_HEX_LEN
        && (address.starts_with("0x") || address.starts_with("0X"))
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Lower-cased form used for every address comparison
pub fn normalize_address(address: &str) -> String {
    address.to_ascii_lowercase()
}

/// Format raw address bytes as a lower-case `0x` string
pub fn format_address(bytes: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(bytes))
}
