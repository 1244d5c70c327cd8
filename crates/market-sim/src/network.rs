//! Latency-weighted gossip network.
//!
//! Participants are nodes of an undirected graph; each edge carries a
//! symmetric latency in gossip rounds, sampled once at build time from a
//! Gaussian floored at one round. A broadcast schedules deliveries to a
//! neighbor subset chosen per [`BroadcastMode`]; on first receipt a node
//! re-forwards to its remaining neighbors (excluding the sender), and a
//! per-transaction seen set bounds the flood. Duplicate deliveries are
//! no-ops, so coverage is full on the connected graph and termination is
//! guaranteed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use market_types::config::{BroadcastMode, NetworkConfig};
use market_types::{ParticipantId, TxId};
use petgraph::graph::{NodeIndex, UnGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

/// One scheduled hand-off of a transaction to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub tx: TxId,
    pub to: ParticipantId,
    pub from: ParticipantId,
    pub due_round: u64,
}

pub struct Network {
    graph: UnGraph<ParticipantId, u32>,
    nodes: Vec<NodeIndex>,
    broadcast: BroadcastMode,
    /// Min-heap of (due_round, sequence) → delivery; the sequence number
    /// keeps same-round deliveries in schedule order for determinism.
    pending: BinaryHeap<Reverse<(u64, u64)>>,
    by_key: HashMap<(u64, u64), Delivery>,
    seq: u64,
    seen: HashMap<TxId, HashSet<ParticipantId>>,
}

impl Network {
    /// Build the gossip graph: a ring backbone (keeps the graph connected)
    /// plus random extra edges with the configured probability. Edge latency
    /// is `round(mean + std * z)` floored at 1.
    pub fn build<R: Rng>(node_count: usize, cfg: &NetworkConfig, rng: &mut R) -> Self {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = (0..node_count).map(|id| graph.add_node(id)).collect();

        let mut sample_latency = |rng: &mut R| -> u32 {
            let z: f64 = rng.sample(StandardNormal);
            (cfg.latency_mean + cfg.latency_std * z).round().max(1.0) as u32
        };

        if node_count > 1 {
            for i in 0..node_count {
                let j = (i + 1) % node_count;
                if i < j {
                    let latency = sample_latency(rng);
                    graph.add_edge(nodes[i], nodes[j], latency);
                }
            }
            // Ring wrap-around edge (skipped for two nodes, where it would
            // duplicate the single ring edge).
            if node_count > 2 {
                let latency = sample_latency(rng);
                graph.add_edge(nodes[node_count - 1], nodes[0], latency);
            }

            for i in 0..node_count {
                for j in (i + 2)..node_count {
                    if i == 0 && j == node_count - 1 {
                        continue; // wrap-around edge already present
                    }
                    if rng.gen::<f64>() < cfg.edge_probability {
                        let latency = sample_latency(rng);
                        graph.add_edge(nodes[i], nodes[j], latency);
                    }
                }
            }
        }

        Self {
            graph,
            nodes,
            broadcast: cfg.broadcast,
            pending: BinaryHeap::new(),
            by_key: HashMap::new(),
            seq: 0,
            seen: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Latency in rounds between two directly connected nodes.
    pub fn latency(&self, a: ParticipantId, b: ParticipantId) -> Option<u32> {
        self.graph
            .find_edge(self.nodes[a], self.nodes[b])
            .map(|edge| self.graph[edge])
    }

    pub fn neighbors(&self, id: ParticipantId) -> Vec<ParticipantId> {
        let mut out: Vec<ParticipantId> = self
            .graph
            .neighbors(self.nodes[id])
            .map(|ix| self.graph[ix])
            .collect();
        out.sort_unstable();
        out
    }

    /// Gossip a freshly created transaction from its origin. Neighbor choice
    /// follows the configured broadcast mode; re-forwarding on delivery always
    /// floods to not-yet-seen neighbors.
    pub fn broadcast<R: Rng>(&mut self, tx: TxId, origin: ParticipantId, round: u64, rng: &mut R) {
        self.seen.entry(tx).or_default().insert(origin);

        let mut targets = self.neighbors(origin);
        if let BroadcastMode::Sample(fraction) = self.broadcast {
            let keep = ((targets.len() as f64) * fraction).ceil() as usize;
            targets.shuffle(rng);
            targets.truncate(keep.max(1).min(targets.len()));
            targets.sort_unstable();
        }

        for to in targets {
            self.schedule(tx, origin, to, round);
        }
    }

    /// Deliveries due at `round`, in schedule order.
    pub fn poll_due(&mut self, round: u64) -> Vec<Delivery> {
        let mut due = Vec::new();
        while let Some(&Reverse(key)) = self.pending.peek() {
            if key.0 > round {
                break;
            }
            self.pending.pop();
            if let Some(delivery) = self.by_key.remove(&key) {
                due.push(delivery);
            }
        }
        due
    }

    /// Process one delivery. Returns true on first receipt, in which case the
    /// transaction is re-forwarded to the node's other neighbors; duplicate
    /// receipts are no-ops.
    pub fn accept(&mut self, delivery: Delivery) -> bool {
        let seen = self.seen.entry(delivery.tx).or_default();
        if !seen.insert(delivery.to) {
            return false;
        }

        for neighbor in self.neighbors(delivery.to) {
            if neighbor == delivery.from {
                continue;
            }
            if self
                .seen
                .get(&delivery.tx)
                .is_some_and(|s| s.contains(&neighbor))
            {
                continue;
            }
            self.schedule(delivery.tx, delivery.to, neighbor, delivery.due_round);
        }
        true
    }

    /// Nodes that have observed `tx` so far (origin included).
    pub fn coverage(&self, tx: TxId) -> usize {
        self.seen.get(&tx).map_or(0, HashSet::len)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn schedule(&mut self, tx: TxId, from: ParticipantId, to: ParticipantId, round: u64) {
        let latency = self.latency(from, to).unwrap_or(1) as u64;
        let due_round = round + latency;
        let key = (due_round, self.seq);
        self.seq += 1;
        self.pending.push(Reverse(key));
        self.by_key.insert(
            key,
            Delivery {
                tx,
                to,
                from,
                due_round,
            },
        );
    }
}
