//! The session overlay (§4.5): a long-lived, PIT/FIB-exempt conduit between
//! an application (`fetch`) and a repository, established with a three
//! message handshake and kept alive across face changes by a reconnect
//! protocol.

pub mod fetch;
pub mod repository;

/// Default literal component that initiates a session handshake.
pub const SESSION_INITIATOR_TAG: &str = "session_connector";
/// Default literal component that introduces a session identifier.
pub const SESSION_IDENTIFIER_TAG: &str = "sid";
/// Literal component marking a reconnect Interest.
pub const RECONNECT_TAG: &str = "reconnect";

const BASE64_URL_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a cryptographically secure, URL-safe session token from
/// `n_bytes` of random source material (spec §9: 16 bytes yields ≈22
/// characters). No padding is emitted, matching `secrets.token_urlsafe`.
pub fn generate_session_token(n_bytes: usize) -> String {
    use rand::RngCore;
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

fn base64_url_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 4 + 2) / 3);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = *chunk.get(1).unwrap_or(&0) as u32;
        let b2 = *chunk.get(2).unwrap_or(&0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;

        out.push(BASE64_URL_ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        out.push(BASE64_URL_ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64_URL_ALPHABET[((n >> 6) & 0x3F) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(BASE64_URL_ALPHABET[(n & 0x3F) as usize] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_byte_token_is_twenty_two_characters() {
        let token = generate_session_token(16);
        assert_eq!(token.len(), 22);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn encoding_is_deterministic_for_fixed_input() {
        assert_eq!(base64_url_encode(&[0, 0, 0]), "AAAA");
        assert_eq!(base64_url_encode(&[255, 255, 255]), "____");
    }
}
