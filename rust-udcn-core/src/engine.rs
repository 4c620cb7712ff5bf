//! The ICN processing state machine: handles `(face_id, packet)` pairs
//! against the Content Store, PIT, and FIB.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{Mutex, RwLock};

use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::metrics::UdcnMetrics;
use rust_udcn_common::ndn::{Content, Interest, Nack, NackReason, Name, NameComponent, Packet};
use rust_udcn_common::types::FaceId;

use crate::content_store::ContentStore;
use crate::fib::{Fib, FibEntry, FibSnapshot};
use crate::pit::Pit;

/// An outbound `(face_id, packet)` pair. `FaceId::LOCAL_APP` means "toward
/// the application/repository queue" rather than a network face.
pub type Outbound = (FaceId, Packet);

/// The shared, lockable store triple plus the engine's processing logic.
pub struct IcnEngine {
    node_name: String,
    session_identifier_tag: NameComponent,
    session_initiator_tag: NameComponent,
    deliver_interests_to_app: bool,
    cs: Arc<RwLock<ContentStore>>,
    pit: Arc<Mutex<Pit>>,
    fib: Arc<RwLock<Fib>>,
    metrics: Arc<UdcnMetrics>,
}

impl IcnEngine {
    pub fn new(config: &NodeConfig, metrics: Arc<UdcnMetrics>) -> Self {
        Self {
            node_name: config.node_name.clone(),
            session_identifier_tag: NameComponent::from(config.session.identifier_tag.as_str()),
            session_initiator_tag: NameComponent::from(config.session.initiator_tag.as_str()),
            deliver_interests_to_app: config.deliver_interests_to_app,
            cs: Arc::new(RwLock::new(ContentStore::new(
                config.node_name.clone(),
                config.cs.capacity,
                std::time::Duration::from_millis(config.cs.default_ttl_ms),
            ))),
            pit: Arc::new(Mutex::new(Pit::new(config.node_name.clone(), config.pit.capacity))),
            fib: Arc::new(RwLock::new(Fib::new(config.node_name.clone(), config.fib.capacity))),
            metrics,
        }
    }

    pub fn cs(&self) -> Arc<RwLock<ContentStore>> {
        self.cs.clone()
    }

    pub fn pit(&self) -> Arc<Mutex<Pit>> {
        self.pit.clone()
    }

    pub fn fib(&self) -> Arc<RwLock<Fib>> {
        self.fib.clone()
    }

    pub fn metrics(&self) -> Arc<UdcnMetrics> {
        self.metrics.clone()
    }

    fn is_reconnect(&self, name: &Name) -> bool {
        name.first() == Some(&self.session_identifier_tag)
            && name.components().any(|c| c.to_string() == "reconnect")
    }

    /// Dispatches a packet arriving on `face_id` from the given direction.
    pub async fn handle_packet(
        &self,
        face_id: FaceId,
        packet: Packet,
        from_local: bool,
    ) -> Vec<Outbound> {
        match packet {
            Packet::Interest(interest) => self.handle_interest(face_id, interest, from_local).await,
            Packet::Content(content) => self.handle_content(face_id, content).await,
            Packet::Nack(nack) => self.handle_nack(face_id, nack).await,
        }
    }

    /// §4.1 Interest processing.
    pub async fn handle_interest(
        &self,
        face_id: FaceId,
        interest: Interest,
        from_local: bool,
    ) -> Vec<Outbound> {
        self.metrics.interests_received.increment();

        // 1. CS hit.
        {
            let mut cs = self.cs.write().await;
            if let Some(content) = cs.get(&interest.name) {
                self.metrics.cs_hits.increment();
                self.metrics.interests_satisfied.increment();
                debug!("{}: CS hit for {}", self.node_name, interest.name);
                return vec![(face_id, Packet::Content(content))];
            }
            self.metrics.cs_misses.increment();
        }

        // 2. Session-control (reconnect) packet.
        if self.is_reconnect(&interest.name) {
            return self.handle_reconnect(face_id, interest).await;
        }

        let mut pit = self.pit.lock().await;

        // 3. PIT hit -> aggregate and stop.
        if pit.contains(&interest.name) {
            pit.insert_or_aggregate(&interest, face_id, from_local);
            self.metrics.pit_hits.increment();
            debug!("{}: aggregated Interest for {}", self.node_name, interest.name);
            return Vec::new();
        }

        pit.insert_or_aggregate(&interest, face_id, from_local);
        self.metrics.pit_inserts.increment();

        let mut out = Vec::new();

        // 4. Delivery to application.
        if !from_local && self.deliver_interests_to_app {
            if let Some(entry) = pit.get_mut(&interest.name) {
                entry.outstanding_forwards += 1;
            }
            out.push((FaceId::LOCAL_APP, Packet::Interest(interest.clone())));
        }

        // 5. FIB lookup, excluding the incoming face (loop avoidance).
        let fib = self.fib.read().await;
        if let Some(fib_entry) = fib.lookup(&interest.name, &[], &[face_id]) {
            let snapshot = FibSnapshot::from(fib_entry);
            let upstreams: Vec<FaceId> = fib_entry.upstreams.clone();
            drop(fib);

            self.metrics.fib_hits.increment();
            match pit.get_mut(&interest.name) {
                Some(entry) => {
                    entry.add_tried_fib(snapshot);
                    for upstream in &upstreams {
                        if entry.was_nacked(*upstream) {
                            continue;
                        }
                        entry.outstanding_forwards += 1;
                        out.push((*upstream, Packet::Interest(interest.clone())));
                    }
                }
                None => {
                    // PIT was at capacity when this Interest arrived (§3.2):
                    // no entry exists to record outstanding-forward/Nack-
                    // fallback state against, so forward best-effort rather
                    // than abort the engine task.
                    for upstream in &upstreams {
                        out.push((*upstream, Packet::Interest(interest.clone())));
                    }
                }
            }
            self.metrics.interests_forwarded.add(out.len() as u64);
        } else {
            drop(fib);
            self.metrics.fib_misses.increment();
        }

        // 6. Miss: nobody to forward to. `out` reflects every forward made
        // above (app delivery and/or FIB upstreams), including the
        // capacity-exhausted best-effort path which has no PIT entry to
        // consult.
        if out.is_empty() {
            pit.remove(&interest.name);
            self.metrics.nacks_sent.increment();
            warn!("{}: no route for {}", self.node_name, interest.name);
            return vec![(
                face_id,
                Packet::Nack(Nack::new(NackReason::NoRoute, interest)),
            )];
        }

        out
    }

    /// §4.2 Content processing.
    pub async fn handle_content(&self, face_id: FaceId, content: Content) -> Vec<Outbound> {
        self.metrics.data_received.increment();

        let mut pit = self.pit.lock().await;
        let Some(entry) = pit.get(&content.name).cloned() else {
            debug!("{}: dropping unsolicited Content for {}", self.node_name, content.name);
            drop(pit);
            self.cs.write().await.insert(content);
            return Vec::new();
        };

        // §4.5 handshake bridge: a Content answering a session-initiation
        // Interest carries the repository's token as its payload. Mirror
        // this hop's PIT state under the eventual `/sid/<token>` name, with
        // the fetcher-facing downstream(s) plus the repo-facing arrival
        // face, so the fetcher's step-3 confirmation Content has a
        // two-face session PIT entry to traverse when it arrives.
        if !entry.is_session && content.name.last() == Some(&self.session_initiator_tag) && !content.payload.is_empty() {
            let token = String::from_utf8_lossy(&content.payload).into_owned();
            let sid_name = Name::new()
                .join(self.session_identifier_tag.clone())
                .join(NameComponent::from(token.as_str()));
            let mut downstreams: Vec<(FaceId, bool)> = entry.downstreams().collect();
            downstreams.push((face_id, false));
            pit.insert_session(sid_name, entry.interest.clone(), downstreams);
        }

        let mut out = Vec::new();

        if entry.is_session && entry.downstream_count() == 2 {
            // Forward to the other face; install a static session FIB route
            // toward the content's origin if one doesn't already exist.
            for (downstream, _) in entry.downstreams() {
                if downstream != face_id {
                    out.push((downstream, Packet::Content(content.clone())));
                }
            }
            drop(pit);

            let mut fib = self.fib.write().await;
            if fib.lookup(&content.name, &[], &[]).is_none() {
                fib.add(
                    FibEntry::new(content.name.clone(), vec![face_id])
                        .static_entry()
                        .session_entry(),
                );
            }
        } else {
            for (downstream, _) in entry.downstreams() {
                out.push((downstream, Packet::Content(content.clone())));
            }
            drop(pit);
        }

        self.metrics.data_sent.add(out.len() as u64);

        if !entry.is_session {
            self.pit.lock().await.remove(&content.name);
        }

        self.cs.write().await.insert(content);
        self.metrics.cs_inserts.increment();

        out
    }

    /// §4.3 Nack processing.
    pub async fn handle_nack(&self, face_id: FaceId, nack: Nack) -> Vec<Outbound> {
        self.metrics.nacks_received.increment();

        let mut pit = self.pit.lock().await;
        let Some(entry) = pit.get_mut(&nack.name) else {
            debug!("{}: dropping Nack for unknown {}", self.node_name, nack.name);
            return Vec::new();
        };

        entry.add_nacked_face(face_id);

        if entry.outstanding_forwards > 1 {
            entry.outstanding_forwards -= 1;
            self.metrics.nacks_suppressed.increment();
            return Vec::new();
        }
        entry.outstanding_forwards = 0;

        let fibs_tried = entry.fibs_tried.clone();
        let in_faces: Vec<FaceId> = entry.downstreams().map(|(f, _)| f).collect();
        let nacked_faces = entry.nacked_faces.clone();

        let fib = self.fib.read().await;
        let fallback = fib
            .lookup(&nack.name, &fibs_tried, &in_faces)
            .filter(|e| e.upstreams.iter().any(|u| !nacked_faces.contains(u)))
            .map(|e| (FibSnapshot::from(e), e.upstreams.clone()));
        drop(fib);

        if let Some((snapshot, upstreams)) = fallback {
            entry.add_tried_fib(snapshot);
            let mut out = Vec::new();
            for upstream in upstreams {
                if entry.was_nacked(upstream) {
                    continue;
                }
                entry.outstanding_forwards += 1;
                out.push((upstream, Packet::Interest(entry.interest.clone())));
            }
            return out;
        }

        // No fallback left to try. §4.3 step 6: local (application-facing)
        // downstreams are answered first and alone. A pure network-only
        // entry is retired outright; an entry with local downstreams is
        // rewritten without them so later network retries can still be
        // answered.
        let local_downstreams: Vec<FaceId> = entry
            .downstreams()
            .filter(|(_, local)| *local)
            .map(|(f, _)| f)
            .collect();

        let out: Vec<Outbound> = if local_downstreams.is_empty() {
            let out: Vec<Outbound> = entry
                .downstreams()
                .map(|(f, _)| (f, Packet::Nack(nack.clone())))
                .collect();
            pit.remove(&nack.name);
            out
        } else {
            let out: Vec<Outbound> = local_downstreams
                .into_iter()
                .map(|f| (f, Packet::Nack(nack.clone())))
                .collect();
            entry.retain_network_only();
            out
        };
        self.metrics.nacks_sent.add(out.len() as u64);

        out
    }

    async fn handle_reconnect(&self, face_id: FaceId, interest: Interest) -> Vec<Outbound> {
        let Some(hops_component) = interest.name.last() else {
            return Vec::new();
        };
        let max_hops: u32 = hops_component.to_string().parse().unwrap_or(0);
        let remaining = max_hops.saturating_sub(1);
        if remaining == 0 {
            debug!("{}: dropping reconnect Interest with exhausted hop count", self.node_name);
            return Vec::new();
        }

        let stripped = interest.name.drop_last(2);

        let mut fib = self.fib.write().await;
        let previous_upstreams = fib
            .lookup(&stripped, &[], &[])
            .map(|e| e.upstreams.clone())
            .unwrap_or_default();
        fib.replace(
            FibEntry::new(stripped.clone(), vec![face_id])
                .static_entry()
                .session_entry(),
        );
        drop(fib);

        self.metrics.reconnects_handled.increment();

        {
            let mut pit = self.pit.lock().await;
            if let Some(entry) = pit.get_mut(&stripped) {
                entry.add_downstream(face_id, false);
            }
        }

        let mut forwarded_name = stripped;
        forwarded_name.push(NameComponent::from("reconnect"));
        forwarded_name.push(NameComponent::from(remaining.to_string().as_str()));

        let mut forwarded = interest;
        forwarded.name = forwarded_name;

        previous_upstreams
            .into_iter()
            .filter(|u| *u != face_id)
            .map(|u| (u, Packet::Interest(forwarded.clone())))
            .collect()
    }
}
