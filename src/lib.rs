//! On-chain multi-hop DEX arbitrage search engine.
//!
//! `pools` simulates every supported AMM family off a per-block parameter
//! snapshot; `graph` wires those pools into a token graph rooted at WETH and
//! enumerates candidate cycles; `optimizer` solves each cycle for its
//! profit-maximizing input; `composer` packs the winning cycle into an Ape
//! executor call array; `orchestrator` drives the whole pipeline one block
//! at a time and hands the result to `relay` for submission.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod abi;
pub mod cache;
pub mod composer;
pub mod config;
pub mod error;
pub mod graph;
pub mod math;
pub mod node;
pub mod optimizer;
pub mod orchestrator;
pub mod pools;
pub mod relay;
pub mod testmode;
pub mod types;

pub use config::{load_config, BotConfig};
pub use orchestrator::Orchestrator;
