//! Configuration management.
//!
//! `.env` supplies secrets and endpoints, `config.toml` supplies the
//! structured trade-set and pool registries, and `clap` flags layer CLI
//! overrides on top. Assembly follows the same `dotenv` + `std::env::var` +
//! `anyhow::Context` pattern the reference bot used, just fanned out across
//! two file formats instead of one.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::graph::discovery::{FamilyRegistry, StableSwapRegistryEntry, StaticPair};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    Live,
    Test,
}

/// `clap`-parsed command line, matching §4.H/§4.N's flag set.
#[derive(Debug, Parser)]
#[command(name = "arb-bot", about = "On-chain multi-hop DEX arbitrage search engine")]
pub struct Cli {
    #[arg(short = 'm', long = "mode", value_enum, default_value = "live")]
    pub mode: RunMode,

    /// In test mode, the fraction by which constant-product pools are
    /// imbalanced after each refresh to synthesize a guaranteed arbitrage.
    #[arg(short = 'p', long = "price-change", alias = "pc")]
    pub price_change: Option<f64>,

    #[arg(long = "config", default_value = "./config.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RpcSection {
    ws: String,
    http: String,
    fork: Option<String>,
    aws: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwnerSection {
    address: String,
    keyfile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutorSection {
    address: String,
}

#[derive(Debug, Deserialize)]
struct EtherscanSection {
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlStaticPair {
    token_a: String,
    token_b: String,
}

#[derive(Debug, Deserialize)]
struct TomlStableEntry {
    pool: String,
    coins: Vec<String>,
    #[serde(default)]
    disabled_pairs: Vec<(String, String)>,
}

#[derive(Debug, Deserialize, Default)]
struct TradeSetSection {
    #[serde(default)]
    constant_product_factories: Vec<String>,
    #[serde(default)]
    pairs: Vec<TomlStaticPair>,
    #[serde(default)]
    stable_pools: Vec<TomlStableEntry>,
    #[serde(default)]
    weighted_pools: Vec<String>,
    #[serde(default)]
    concentrated_pools: Vec<String>,
    #[serde(default)]
    hybrid_pools: Vec<String>,
    #[serde(default)]
    bancor_converters: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    rpc: RpcSection,
    owner: OwnerSection,
    executor: ExecutorSection,
    etherscan: Option<EtherscanSection>,
    #[serde(default)]
    trade_set: TradeSetSection,
}

/// The fully-resolved runtime configuration the orchestrator bootstraps
/// against (§4.H).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub mode: RunMode,
    pub price_change: Option<f64>,

    pub rpc_ws: String,
    pub rpc_http: String,
    pub rpc_fork: Option<String>,
    pub rpc_aws: Option<String>,

    pub owner_address: Address,
    pub owner_keyfile: Option<PathBuf>,
    pub executor_address: Address,
    pub etherscan_api_key: Option<String>,

    pub private_key: String,
    pub flashbots_relay_url: String,
    pub flashbots_log_path: PathBuf,

    pub max_hops: usize,
    pub loan_max_wei: alloy::primitives::U256,
    pub registry: FamilyRegistry,
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value).with_context(|| format!("invalid address for `{field}`: {value}"))
}

fn load_toml(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Resolves `.env` + `config.toml` + CLI flags into a single [`BotConfig`],
/// failing fast with a named field on the first missing or malformed
/// setting (§4.H — configuration failures abort before the block loop).
pub fn load_config(cli: &Cli) -> Result<BotConfig> {
    dotenv::dotenv().ok();

    let file = load_toml(&cli.config)?;

    let registry = FamilyRegistry {
        constant_product_factories: file
            .trade_set
            .constant_product_factories
            .iter()
            .map(|addr| parse_address("trade_set.constant_product_factories", addr))
            .collect::<Result<_>>()?,
        static_trade_set: file
            .trade_set
            .pairs
            .iter()
            .map(|pair| {
                Ok(StaticPair {
                    token_a: parse_address("trade_set.pairs.token_a", &pair.token_a)?,
                    token_b: parse_address("trade_set.pairs.token_b", &pair.token_b)?,
                })
            })
            .collect::<Result<_>>()?,
        stable_pools: file
            .trade_set
            .stable_pools
            .iter()
            .map(|entry| {
                let coins = entry.coins.iter().map(|c| parse_address("trade_set.stable_pools.coins", c)).collect::<Result<_>>()?;
                let disabled_pairs = entry
                    .disabled_pairs
                    .iter()
                    .map(|(a, b)| Ok((parse_address("trade_set.stable_pools.disabled_pairs", a)?, parse_address("trade_set.stable_pools.disabled_pairs", b)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StableSwapRegistryEntry { pool: parse_address("trade_set.stable_pools.pool", &entry.pool)?, coins, disabled_pairs })
            })
            .collect::<Result<_>>()?,
        weighted_pools: file.trade_set.weighted_pools.iter().map(|addr| parse_address("trade_set.weighted_pools", addr)).collect::<Result<_>>()?,
        concentrated_pools: file.trade_set.concentrated_pools.iter().map(|addr| parse_address("trade_set.concentrated_pools", addr)).collect::<Result<_>>()?,
        hybrid_pools: file.trade_set.hybrid_pools.iter().map(|addr| parse_address("trade_set.hybrid_pools", addr)).collect::<Result<_>>()?,
        bancor_converters: file.trade_set.bancor_converters.iter().map(|addr| parse_address("trade_set.bancor_converters", addr)).collect::<Result<_>>()?,
    };

    Ok(BotConfig {
        mode: cli.mode,
        price_change: cli.price_change,

        rpc_ws: file.rpc.ws,
        rpc_http: file.rpc.http,
        rpc_fork: file.rpc.fork,
        rpc_aws: file.rpc.aws,

        owner_address: parse_address("owner.address", &file.owner.address)?,
        owner_keyfile: file.owner.keyfile.map(PathBuf::from),
        executor_address: parse_address("executor.address", &file.executor.address)?,
        etherscan_api_key: file.etherscan.and_then(|e| e.api_key),

        private_key: std::env::var("PRIVATE_KEY").context("PRIVATE_KEY not set")?,
        flashbots_relay_url: std::env::var("FLASHBOTS_RELAY_URL").unwrap_or_else(|_| "https://relay.flashbots.net".to_string()),
        flashbots_log_path: std::env::var("FLASHBOTS_LOG_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("flashbots_log.json")),

        max_hops: std::env::var("MAX_HOPS").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
        loan_max_wei: std::env::var("MAX_LOAN_WEI")
            .ok()
            .and_then(|v| alloy::primitives::U256::from_str_radix(&v, 10).ok())
            .unwrap_or_else(|| alloy::primitives::U256::from(500u64) * alloy::primitives::U256::from(10u64).pow(alloy::primitives::U256::from(18u8))),
        registry,
    })
}
