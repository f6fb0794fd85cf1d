//! Topic id validation.
//!
//! Request handlers validate topic ids before touching storage so a
//! malformed id never causes a partial write.

use uuid::Uuid;

/// Parse a topic id from its wire form. Returns `None` for anything that is
/// not a canonical UUID.
pub fn parse_topic_id(raw: &str) -> Option<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Uuid::parse_str(trimmed).ok()
}
