//! Invite codes and invite links.
//!
//! Two link shapes are accepted and resolve to the same code:
//!
//! - `{origin}/s/{slug}-tharwanet-{code}`
//! - `{origin}/split/join/{code}` (legacy)
//!
//! A path segment resolves to the text after its last hyphen, or to the
//! whole segment when it has none. Codes are matched case-insensitively.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Length of generated invite codes.
pub const INVITE_CODE_LEN: usize = 8;

const LINK_MARKER: &str = "tharwanet";
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a fresh random invite code (uppercase, no ambiguous characters).
pub fn generate_invite_code() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(INVITE_CODE_LEN)
        .map(|b| char::from(CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()]))
        .collect()
}

/// Canonical form of a user supplied code.
pub fn normalize_invite_code(code: &str) -> ResultEngine<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::KeyNotFound("invite code".to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

/// Resolve a single path segment to its code.
pub fn code_from_segment(segment: &str) -> ResultEngine<String> {
    let segment = segment.trim().trim_matches('/');
    let code = match segment.rfind('-') {
        Some(idx) => &segment[idx + 1..],
        None => segment,
    };
    normalize_invite_code(code)
}

/// Resolve a full invite link (or its path) to the code it carries.
pub fn code_from_link(link: &str) -> ResultEngine<String> {
    let path = link
        .split_once("://")
        .map(|(_, rest)| rest.find('/').map_or("", |idx| &rest[idx..]))
        .unwrap_or(link);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

    match parts.as_slice() {
        [.., "s", segment] | [.., "split", "join", segment] => code_from_segment(segment),
        _ => Err(EngineError::KeyNotFound("invite link".to_string())),
    }
}

/// Build the shareable link of a group.
pub fn invite_link(origin: &str, group_name: &str, code: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let slug = slugify(group_name);
    if slug.is_empty() {
        format!("{origin}/s/{LINK_MARKER}-{code}")
    } else {
        format!("{origin}/s/{slug}-{LINK_MARKER}-{code}")
    }
}

/// Fold a group name to a lowercase ASCII slug.
pub fn slugify(name: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in name.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_short_alphanumeric() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn segment_uses_text_after_last_hyphen() {
        assert_eq!(code_from_segment("summer-trip-tharwanet-ab12cd34").unwrap(), "AB12CD34");
        assert_eq!(code_from_segment("AB12CD34").unwrap(), "AB12CD34");
        assert!(code_from_segment("trip-").is_err());
    }

    #[test]
    fn both_link_shapes_resolve_to_same_code() {
        let modern = code_from_link("https://app.example.com/s/trip-tharwanet-K7M2P9QX").unwrap();
        let legacy = code_from_link("https://app.example.com/split/join/k7m2p9qx").unwrap();
        assert_eq!(modern, legacy);
        assert_eq!(code_from_link("/split/join/K7M2P9QX?ref=mail").unwrap(), "K7M2P9QX");
        assert!(code_from_link("https://app.example.com/groups/1").is_err());
    }

    #[test]
    fn link_round_trips_through_resolver() {
        let link = invite_link("https://app.example.com/", "Été à Marrakech!", "K7M2P9QX");
        assert_eq!(
            link,
            "https://app.example.com/s/ete-a-marrakech-tharwanet-K7M2P9QX"
        );
        assert_eq!(code_from_link(&link).unwrap(), "K7M2P9QX");
    }
}
