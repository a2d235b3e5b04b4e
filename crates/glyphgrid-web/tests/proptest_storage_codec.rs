//! Property-based invariant tests for the platform-agnostic web-crate
//! layers (native targets only).
//!
//! Verifies:
//! 1. Hex codec: any byte blob survives encode → decode.
//! 2. Hex codec: output length is exactly twice the input length and uses
//!    lowercase digits only.
//! 3. Hex codec: odd-length strings never decode.
//! 4. Config: any nonzero grid size validates and reports the right cell
//!    count.

#![cfg(not(target_arch = "wasm32"))]

use glyphgrid_web::config::AppConfig;
use glyphgrid_web::storage::{decode_hex, encode_hex};
use proptest::prelude::*;

proptest! {
    #[test]
    fn hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let encoded = encode_hex(&bytes);
        prop_assert_eq!(decode_hex(&encoded), Some(bytes));
    }

    #[test]
    fn hex_encoding_shape(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let encoded = encode_hex(&bytes);
        prop_assert_eq!(encoded.len(), bytes.len() * 2);
        prop_assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn odd_length_never_decodes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut encoded = encode_hex(&bytes);
        encoded.push('0');
        prop_assert_eq!(decode_hex(&encoded), None);
    }

    #[test]
    fn nonzero_grids_validate(width in 1u16..=512, height in 1u16..=512) {
        let config = AppConfig::new("app.wasm", "terminal", width, height);
        prop_assert!(config.validate().is_ok());
        prop_assert_eq!(config.cell_count(), usize::from(width) * usize::from(height));
    }
}
