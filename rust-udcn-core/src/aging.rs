//! The periodic ageing/retransmission task (§4.4).
//!
//! Modeled as a single `tokio::time::interval`-driven task; a fresh task is
//! never spawned per tick. Exceptions during a tick are caught and logged;
//! the interval is unconditionally rescheduled.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::ndn::{Nack, NackReason, Packet};
use rust_udcn_common::types::FaceId;

use crate::engine::{IcnEngine, Outbound};
use crate::fib::FibSnapshot;

pub struct AgingTask {
    engine: Arc<IcnEngine>,
    interval: Duration,
    pit_timeout: Duration,
    pit_retransmits: u32,
}

impl AgingTask {
    pub fn new(engine: Arc<IcnEngine>, config: &NodeConfig) -> Self {
        Self {
            engine,
            interval: config.ageing_interval(),
            pit_timeout: Duration::from_millis(config.pit.default_lifetime_ms),
            pit_retransmits: config.pit.retransmits,
        }
    }

    /// Spawns the ageing loop. Outbound retransmissions and timeout Nacks
    /// are pushed onto `outbound`; the caller is responsible for routing
    /// them to the link layer / application queue.
    pub fn spawn(self, outbound: mpsc::UnboundedSender<Outbound>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick(&outbound).await {
                    warn!("ageing tick failed: {e:#}");
                }
                // Rescheduling happens unconditionally via the next loop
                // iteration's `ticker.tick().await`, regardless of the
                // result above — the async equivalent of a `finally` block.
            }
        })
    }

    /// Runs a single ageing pass. Exposed as `pub` (rather than only driven
    /// by `spawn`'s interval loop) so tests can exercise one deterministic
    /// cycle without racing a real timer.
    pub async fn tick(&self, outbound: &mpsc::UnboundedSender<Outbound>) -> anyhow::Result<()> {
        let (to_retransmit, removed) = {
            let mut pit = self.engine.pit().lock().await;
            pit.ageing(self.pit_timeout, self.pit_retransmits)
        };

        for name in &to_retransmit {
            self.retransmit(name, outbound).await;
        }

        let timed_out = removed.len();
        for entry in removed {
            let nack = Nack::new(NackReason::PitTimeout, entry.interest.clone());
            // §7: PIT timeout after max retransmits is synthesized to local
            // downstreams only, not the network.
            for (downstream, local) in entry.downstreams() {
                if local {
                    let _ = outbound.send((downstream, Packet::Nack(nack.clone())));
                }
            }
            self.engine.metrics().pit_expirations.increment();
        }
        self.engine
            .metrics()
            .interests_timed_out
            .add(timed_out as u64);

        let evicted = self.engine.cs().write().await.ageing();
        self.engine.metrics().cs_evictions.add(evicted as u64);

        debug!(
            "ageing tick: {} retransmitted, {} timed out, {} CS entries evicted",
            to_retransmit.len(),
            timed_out,
            evicted
        );

        Ok(())
    }

    /// Retransmits a single PIT entry by looking up a fresh non-exhausted
    /// FIB entry and forwarding the stored Interest to every non-nacked
    /// upstream.
    async fn retransmit(
        &self,
        name: &rust_udcn_common::ndn::Name,
        outbound: &mpsc::UnboundedSender<Outbound>,
    ) {
        let (fibs_tried, in_faces, interest) = {
            let pit = self.engine.pit().lock().await;
            let Some(entry) = pit.get(name) else {
                return;
            };
            (
                entry.fibs_tried.clone(),
                entry.downstreams().map(|(f, _)| f).collect::<Vec<FaceId>>(),
                entry.interest.clone(),
            )
        };

        let candidate = {
            let fib = self.engine.fib().read().await;
            fib.lookup(name, &fibs_tried, &in_faces)
                .map(|e| (FibSnapshot::from(e), e.upstreams.clone()))
        };

        let Some((snapshot, upstreams)) = candidate else {
            return;
        };

        let mut pit = self.engine.pit().lock().await;
        let Some(entry) = pit.get_mut(name) else {
            return;
        };
        entry.add_tried_fib(snapshot);
        for upstream in upstreams {
            if entry.was_nacked(upstream) {
                continue;
            }
            entry.outstanding_forwards += 1;
            let _ = outbound.send((upstream, Packet::Interest(interest.clone())));
        }
    }
}
