//! Fetcher-side session handshake and reconnect helpers.
//!
//! Grounded in `FetchSessions.fetch_data_session`/`handle_session`: these
//! are transport-agnostic packet builders. Wiring them to an actual link
//! layer (sending the `Interest`/`Content` they build and feeding back the
//! replies) is the caller's responsibility, matching how `FetchSessions`
//! layers session awareness on top of the plain `Fetch` queue protocol.

use rust_udcn_common::config::SessionConfig;
use rust_udcn_common::ndn::{Content, Interest, Name, NameComponent};

use super::RECONNECT_TAG;

/// A session established with a repository, once the handshake completes.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub sid_name: Name,
    pub token: String,
}

/// Drives the client side of the three-message handshake (§4.5).
pub struct SessionFetchClient {
    identifier_tag: NameComponent,
    session: Option<SessionHandle>,
}

impl SessionFetchClient {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            identifier_tag: NameComponent::from(config.identifier_tag.as_str()),
            session: None,
        }
    }

    /// Handshake step 1: `Interest(/<repo_prefix>/<session_initiator_tag>)`.
    pub fn initiate(&self, repo_prefix: &Name, initiator_tag: &str) -> Interest {
        Interest::new(repo_prefix.join(NameComponent::from(initiator_tag)))
    }

    /// Handshake step 3: given the repository's step-2 reply, builds the
    /// confirmation `Content(sid_name, token)` and records the session as
    /// active locally.
    pub fn confirm(&mut self, reply: &Content) -> Content {
        let token = String::from_utf8_lossy(&reply.payload).to_string();
        let sid_name = Name::new()
            .join(self.identifier_tag.clone())
            .join(NameComponent::new(token.clone().into_bytes()));
        self.session = Some(SessionHandle {
            sid_name: sid_name.clone(),
            token: token.clone(),
        });
        Content::new(sid_name, token.into_bytes())
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Wraps `payload` as a data-transfer Content on the active session.
    pub fn put(&self, payload: impl Into<bytes::Bytes>) -> Option<Content> {
        let handle = self.session.as_ref()?;
        Some(Content::new(handle.sid_name.clone(), payload.into()))
    }

    /// Builds a reconnect Interest for the active session, to be sent on
    /// every current face (§4.5 Reconnect).
    pub fn reconnect(&self, max_hops: u8) -> Option<Interest> {
        let handle = self.session.as_ref()?;
        let name = handle
            .sid_name
            .join(NameComponent::from(RECONNECT_TAG))
            .join(NameComponent::from(max_hops.to_string().as_str()));
        Some(Interest::new(name).with_must_be_fresh(false))
    }

    /// Builds the termination message and drops local session state.
    pub fn terminate(&mut self) -> Option<Content> {
        let handle = self.session.take()?;
        Some(Content::new(handle.sid_name, b"terminate".to_vec()))
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
    fn initiate_appends_initiator_tag_to_prefix() {
        let client = SessionFetchClient::new(&config());
        let interest = client.initiate(&Name::from_string("/u/s1"), "session_connector");
        assert_eq!(interest.name.to_string(), "/u/s1/session_connector");
    }

    #[test]
    fn confirm_records_session_and_builds_sid_content() {
        let mut client = SessionFetchClient::new(&config());
        let reply = Content::new(Name::from_string("/u/s1/session_connector"), "tok12345678901234567890");
        let confirm = client.confirm(&reply);
        assert!(confirm.name.to_string().starts_with("/sid/"));
        assert!(client.has_session());
    }

    #[test]
    fn reconnect_is_none_without_an_active_session() {
        let client = SessionFetchClient::new(&config());
        assert!(client.reconnect(16).is_none());
    }

    #[test]
    fn reconnect_name_carries_tag_and_hop_count() {
        let mut client = SessionFetchClient::new(&config());
        let reply = Content::new(Name::from_string("/u/s1/session_connector"), "abc");
        client.confirm(&reply);
        let reconnect = client.reconnect(16).unwrap();
        assert!(reconnect.name.to_string().ends_with("/reconnect/16"));
    }
}
