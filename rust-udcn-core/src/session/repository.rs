//! Repository-side session establishment and termination.
//!
//! Grounded in `SessionRepositoryLayer.data_from_lower`: a repository above
//! the forwarding engine answers the initiator handshake with a fresh
//! token, promotes a pending session once the fetcher echoes it back, and
//! tears down bookkeeping on an explicit `terminate` content.

use std::collections::HashMap;

use rust_udcn_common::config::SessionConfig;
use rust_udcn_common::ndn::{Content, Interest, Name, NameComponent};
use rust_udcn_common::types::FaceId;

use super::generate_session_token;

const TERMINATE_PAYLOAD: &[u8] = b"terminate";

/// Tracks sessions a repository has offered, keyed by token.
pub struct SessionRepository {
    initiator_tag: NameComponent,
    identifier_tag: NameComponent,
    token_bytes: usize,
    pending: HashMap<String, FaceId>,
    running: HashMap<String, FaceId>,
}

impl SessionRepository {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            initiator_tag: NameComponent::from(config.initiator_tag.as_str()),
            identifier_tag: NameComponent::from(config.identifier_tag.as_str()),
            token_bytes: config.token_bytes,
            pending: HashMap::new(),
            running: HashMap::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn is_running(&self, token: &str) -> bool {
        self.running.contains_key(token)
    }

    /// Handshake step 2: answers an Interest ending in the initiator tag
    /// with a freshly generated token, recording the session as pending.
    /// Returns `None` if `interest` isn't a session-initiation request.
    pub fn handle_interest(&mut self, face_id: FaceId, interest: &Interest) -> Option<Content> {
        if interest.name.last() != Some(&self.initiator_tag) {
            return None;
        }
        let token = generate_session_token(self.token_bytes);
        self.pending.insert(token.clone(), face_id);
        Some(Content::new(interest.name.clone(), token.into_bytes()))
    }

    /// Handshake step 3 / termination: observes a Content whose name begins
    /// with the session identifier tag. Promotes a pending session to
    /// running (replying with an empty Content "to stop retransmit", per the
    /// original's comment), or removes a running session on `terminate`.
    pub fn handle_content(&mut self, face_id: FaceId, content: &Content) -> Option<Content> {
        if content.name.first() != Some(&self.identifier_tag) {
            return None;
        }
        let token = content.name.get(1)?.to_string();

        if content.payload.as_ref() == TERMINATE_PAYLOAD {
            self.running.remove(&token);
            return None;
        }

        if self.pending.remove(&token).is_some() {
            self.running.insert(token, face_id);
            return Some(Content::new(content.name.clone(), Vec::new()));
        }

        None
    }

    /// Builds the `Content(sid_name, "terminate")` message that removes
    /// this session's state at the repository (§4.5 Termination).
    pub fn terminate_message(&self, token: &str) -> Content {
        let name = Name::from_string(&format!("/{}", self.identifier_tag)).join(NameComponent::new(
            token.as_bytes().to_vec(),
        ));
        Content::new(name, TERMINATE_PAYLOAD.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            initiator_tag: "session_connector".to_string(),
            identifier_tag: "sid".to_string(),
            token_bytes: 16,
        }
    }

    #[test]
    fn initiator_interest_yields_token_and_pending_session() {
        let mut repo = SessionRepository::new(&config());
        let interest = Interest::new(Name::from_string("/u/s1/session_connector"));
        let reply = repo.handle_interest(FaceId(1), &interest).unwrap();
        assert_eq!(reply.name, interest.name);
        assert_eq!(repo.pending_count(), 1);
        assert_eq!(reply.payload.len(), 22);
    }

    #[test]
    fn echoing_token_promotes_pending_to_running() {
        let mut repo = SessionRepository::new(&config());
        let interest = Interest::new(Name::from_string("/u/s1/session_connector"));
        let reply = repo.handle_interest(FaceId(1), &interest).unwrap();
        let token = String::from_utf8(reply.payload.to_vec()).unwrap();

        let sid_name = Name::from_string("/sid").join(NameComponent::new(token.clone().into_bytes()));
        let confirm = Content::new(sid_name, token.clone().into_bytes());
        let ack = repo.handle_content(FaceId(1), &confirm).unwrap();
        assert!(ack.payload.is_empty());
        assert_eq!(repo.pending_count(), 0);
        assert!(repo.is_running(&token));
    }

    #[test]
    fn terminate_removes_running_session() {
        let mut repo = SessionRepository::new(&config());
        let interest = Interest::new(Name::from_string("/u/s1/session_connector"));
        let reply = repo.handle_interest(FaceId(1), &interest).unwrap();
        let token = String::from_utf8(reply.payload.to_vec()).unwrap();
        let sid_name = Name::from_string("/sid").join(NameComponent::new(token.clone().into_bytes()));
        repo.handle_content(FaceId(1), &Content::new(sid_name.clone(), token.clone().into_bytes()));

        let terminate = repo.terminate_message(&token);
        repo.handle_content(FaceId(1), &terminate);
        assert!(!repo.is_running(&token));
    }
}
