use chrono::{DateTime, Utc};

/// An admin web-UI login session. Never persisted to disk — a process
/// restart invalidates every open session, which is the desired behavior
/// for a login cookie rather than a durable record.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Generates an opaque 32-byte session id, hex-encoded — the same shape as
/// a client API key's random suffix, but with no `gw_` prefix since it's
/// never compared against the API-key verifier's prefix index.
pub fn generate_session_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_64_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
