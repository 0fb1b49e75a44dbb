// content-gate-server/src/disposition.rs
// ============================================================================
// Module: Content-Disposition
// Description: Attachment header with an ASCII fallback and RFC 5987 name.
// Purpose: Offer non-ASCII file names without breaking older clients.
// Dependencies: urlencoding
// ============================================================================

//! Content-Disposition header construction for downloads.

/// Builds `attachment; filename="<ascii>"; filename*=UTF-8''<pct>`.
///
/// The quoted name keeps printable ASCII except `"` and `\`, replacing
/// everything else with `_`. The extended name percent-encodes the UTF-8
/// bytes of the original.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| if (ch.is_ascii_graphic() && ch != '"' && ch != '\\') || ch == ' ' { ch } else { '_' })
        .collect();
    let fallback = if fallback.trim().is_empty() { "download".to_string() } else { fallback };
    let encoded = urlencoding::encode(filename);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
