// content-gate-core/src/runtime/token.rs
// ============================================================================
// Module: Download Token Minting
// Description: Unguessable download token generation.
// Purpose: Mint the capability string bound to a paid purchase.
// Dependencies: base64, rand
// ============================================================================

//! ## Overview
//! Tokens are 32 bytes from the OS random source encoded as URL-safe base64
//! without padding, so they drop straight into a download path segment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::identifiers::DownloadToken;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 32;

/// Encoded token length.
pub const TOKEN_ENCODED_LEN: usize = 43;

/// Longest token string accepted from callers before any store lookup.
pub const MAX_TOKEN_LEN: usize = 128;

// ============================================================================
// SECTION: Minting
// ============================================================================

/// Mints a fresh download token.
#[must_use]
pub fn mint_download_token() -> DownloadToken {
    let mut bytes = [0_u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    DownloadToken::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Returns true when `token` could have been minted by this service.
///
/// Accepts the URL-safe base64 alphabet only, bounded by [`MAX_TOKEN_LEN`].
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::TOKEN_ENCODED_LEN;
    use super::is_well_formed;
    use super::mint_download_token;

    #[test]
    fn minted_tokens_are_url_safe_and_distinct() {
        let mut seen = BTreeSet::new();
        for _ in 0..256 {
            let token = mint_download_token();
            assert_eq!(token.as_str().len(), TOKEN_ENCODED_LEN);
            assert!(is_well_formed(token.as_str()));
            assert!(seen.insert(token.as_str().to_string()));
        }
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("../etc/passwd"));
        assert!(!is_well_formed("with space"));
        assert!(!is_well_formed(&"a".repeat(129)));
    }
}
