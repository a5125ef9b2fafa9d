//! Token graph & cycle enumeration (§4.D).
//!
//! A directed multigraph rooted at WETH, indexed by token address and by
//! pool address. Edges carry the set of pool addresses serving that pair —
//! multiple pools may quote the same pair — and are attached by each family's
//! [`discovery`] routine at construction time; the graph is read-only once
//! built.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod discovery;

use crate::error::GraphError;
use crate::pools::PoolSimulator;
use crate::types::PoolHandle;
use alloy::primitives::Address;
use std::collections::HashMap;

/// One directed edge: an ordered token pair backed by one or more pools.
#[derive(Debug, Clone, Default)]
pub struct Edge {
    pub from: Address,
    pub to: Address,
    pub pools: Vec<Address>,
}

/// A chosen traversal of the graph from WETH back to WETH: one edge index
/// per hop, in insertion order (§4.D's `circuits()` contract).
#[derive(Debug, Clone)]
pub struct Circuit {
    pub edges: Vec<usize>,
}

pub struct TokenGraph {
    root: Address,
    /// token -> outgoing edge indices
    adjacency: HashMap<Address, Vec<usize>>,
    edges: Vec<Edge>,
    pools: HashMap<Address, PoolHandle>,
    max_hops: usize,
}

impl TokenGraph {
    pub fn new(root: Address, max_hops: usize) -> Self {
        Self { root, adjacency: HashMap::new(), edges: Vec::new(), pools: HashMap::new(), max_hops }
    }

    /// Adds `pool` to the graph and wires its edge(s) into the adjacency
    /// list. Pools must have non-negligible reserves before reaching this
    /// call — the graph itself does not re-check decimal scaling.
    pub fn insert_pool(&mut self, from: Address, to: Address, pool: PoolHandle) {
        let pool_address = pool.address();
        self.pools.insert(pool_address, pool);

        for (a, b) in [(from, to), (to, from)] {
            if let Some(&edge_index) = self.adjacency.get(&a).and_then(|indices| {
                indices.iter().find(|&&i| self.edges[i].from == a && self.edges[i].to == b)
            }) {
                self.edges[edge_index].pools.push(pool_address);
            } else {
                let edge_index = self.edges.len();
                self.edges.push(Edge { from: a, to: b, pools: vec![pool_address] });
                self.adjacency.entry(a).or_default().push(edge_index);
            }
        }
    }

    pub fn pool(&self, address: Address) -> Result<&PoolHandle, GraphError> {
        self.pools.get(&address).ok_or(GraphError::UnknownPool(address))
    }

    /// Swaps in a fresh per-block snapshot for every pool the cache
    /// refreshed successfully, leaving topology (edges, adjacency) and any
    /// pool the cache excluded this block untouched (§4.C).
    pub fn update_pools(&mut self, refreshed: HashMap<Address, PoolHandle>) {
        for (address, handle) in refreshed {
            self.pools.insert(address, handle);
        }
    }

    /// Addresses of every pool currently attached to the graph, for driving
    /// the per-block cache refresh.
    pub fn pool_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.pools.keys().copied()
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    pub fn root(&self) -> Address {
        self.root
    }

    /// Enumerate all simple-edge paths from the root back to the root with
    /// at most `max_hops` edges. A path may revisit vertices but never an
    /// edge, matching §4.D's "simple path" definition.
    pub fn circuits(&self) -> Result<Vec<Circuit>, GraphError> {
        if !self.adjacency.contains_key(&self.root) {
            return Err(GraphError::MissingRoot);
        }

        let mut results = Vec::new();
        let mut visited_edges = vec![false; self.edges.len()];
        let mut path = Vec::new();
        self.dfs(self.root, &mut path, &mut visited_edges, &mut results);
        Ok(results)
    }

    fn dfs(&self, current: Address, path: &mut Vec<usize>, visited_edges: &mut [bool], results: &mut Vec<Circuit>) {
        if !path.is_empty() && current == self.root {
            results.push(Circuit { edges: path.clone() });
        }
        if path.len() >= self.max_hops {
            return;
        }

        let Some(outgoing) = self.adjacency.get(&current) else { return };
        for &edge_index in outgoing {
            if visited_edges[edge_index] {
                continue;
            }
            visited_edges[edge_index] = true;
            path.push(edge_index);
            self.dfs(self.edges[edge_index].to, path, visited_edges, results);
            path.pop();
            visited_edges[edge_index] = false;
        }
    }

    /// Discards a cycle if every edge shares the same single pool — such a
    /// cycle is the same pool traded against itself and can never be
    /// profitable (§4.D).
    pub fn prune_circuits(&self, cycles: Vec<Circuit>) -> Vec<Circuit> {
        cycles
            .into_iter()
            .filter(|cycle| {
                let first_pools: &[Address] = &self.edges[cycle.edges[0]].pools;
                !(first_pools.len() == 1
                    && cycle.edges.iter().all(|&e| self.edges[e].pools == first_pools))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::constant_product::ConstantProductPool;
    use alloy::primitives::{address, U256};

    fn sample_pool(addr: Address, t0: Address, t1: Address) -> PoolHandle {
        PoolHandle::ConstantProduct(ConstantProductPool::new(addr, t0, t1, U256::from(1000u64), U256::from(1000u64)))
    }

    #[test]
    fn finds_two_hop_circuit() {
        let weth = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let usdc = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let pool_a = address!("0000000000000000000000000000000000000a");
        let pool_b = address!("0000000000000000000000000000000000000b");

        let mut graph = TokenGraph::new(weth, 3);
        graph.insert_pool(weth, usdc, sample_pool(pool_a, weth, usdc));
        graph.insert_pool(weth, usdc, sample_pool(pool_b, weth, usdc));

        let circuits = graph.circuits().unwrap();
        assert!(circuits.iter().any(|c| c.edges.len() == 2));
    }

    #[test]
    fn prunes_same_pool_round_trip() {
        let weth = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let usdc = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let pool_a = address!("0000000000000000000000000000000000000a");

        let mut graph = TokenGraph::new(weth, 3);
        graph.insert_pool(weth, usdc, sample_pool(pool_a, weth, usdc));

        let circuits = graph.circuits().unwrap();
        let pruned = graph.prune_circuits(circuits);
        assert!(pruned.is_empty());
    }
}
