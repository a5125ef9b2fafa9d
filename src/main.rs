//! Entry point: parses CLI flags, resolves configuration, builds the live
//! node client and token graph, and hands both to the orchestrator loop.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use apearb_engine::abi::{IBalancerPool, IMooniswapPool, IUniswapV2Factory, IUniswapV3Pool};
use apearb_engine::cache::PoolDescriptor;
use apearb_engine::config::{self, Cli};
use apearb_engine::graph::discovery::{self, DiscoveredPool};
use apearb_engine::graph::TokenGraph;
use apearb_engine::node::live::AlloyNodeClient;
use apearb_engine::node::NodeClient;
use apearb_engine::pools::constant_product::ConstantProductPool;
use apearb_engine::relay::FlashbotsRelay;
use apearb_engine::types::PoolHandle;
use clap::Parser;
use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_config(&cli)?;
    info!(mode = ?config.mode, "loaded configuration");

    let ws = WsConnect::new(config.rpc_ws.clone());
    let provider = ProviderBuilder::new().connect_ws(ws).await.context("failed to connect to node over websocket")?;
    let node = AlloyNodeClient::new(Arc::new(provider));

    let current_block = node.eth_block_number().await.context("initial eth_blockNumber failed")?;
    let weth = alloy::primitives::address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

    let (graph, descriptors) = bootstrap_graph(&node, &config, weth, current_block).await?;
    info!(pools = descriptors.len(), "discovered trade set");

    let signer = PrivateKeySigner::from_str(&config.private_key).context("invalid PRIVATE_KEY")?;
    let relay = FlashbotsRelay::new(config.flashbots_relay_url.clone(), signer, config.flashbots_log_path.clone());

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handler")?;
    let shutdown = tokio::spawn(async move {
        signals.next().await;
        info!("shutdown signal received, exiting after current block");
    });

    let mut orchestrator = apearb_engine::Orchestrator::new(&config, &node, &relay, graph, descriptors);
    tokio::select! {
        result = orchestrator.run() => result,
        _ = shutdown => Ok(()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves the configured trade set into a live [`TokenGraph`] plus the
/// descriptor list the per-block cache refresh needs. Every resolved pool is
/// seeded into the graph with zeroed reserves; `Orchestrator::run_one_block`
/// overwrites every snapshot field on its first cache refresh before any
/// cycle is searched, so the placeholder values never drive a quote.
///
/// Bancor converters have no on-chain call in [`crate::abi`] to enumerate
/// their reserve tokens (the reference registry assumed they were supplied
/// out of band), so they are skipped here with a warning rather than
/// fabricated; MetaStable pools have no `config.toml` section yet for the
/// same reason. Both are tracked as open gaps, not silently dropped data.
async fn bootstrap_graph(node: &dyn NodeClient, config: &config::BotConfig, root: Address, block: u64) -> Result<(TokenGraph, Vec<PoolDescriptor>)> {
    let mut graph = TokenGraph::new(root, config.max_hops);
    let mut descriptors = Vec::new();

    for pair in &config.registry.static_trade_set {
        let mut resolved = None;
        for factory in &config.registry.constant_product_factories {
            let data = IUniswapV2Factory::getPairCall { tokenA: pair.token_a, tokenB: pair.token_b }.abi_encode();
            let Ok(raw) = node.eth_call(*factory, data.into(), block).await else { continue };
            let Ok(pool_address) = IUniswapV2Factory::getPairCall::abi_decode_returns(&raw) else { continue };
            if pool_address != Address::ZERO {
                resolved = Some(pool_address);
                break;
            }
        }
        let Some(pool_address) = resolved else {
            warn!(token_a = %pair.token_a, token_b = %pair.token_b, "no configured factory returned a pair for this trade-set entry, skipping");
            continue;
        };
        seed_pool(&mut graph, pool_address, pair.token_a, pair.token_b);
        descriptors.push(PoolDescriptor::ConstantProduct { address: pool_address, token0: pair.token_a, token1: pair.token_b });
    }

    let discovered_stable = discovery::discover_stable_pairs(node, &config.registry.stable_pools, block).await?;
    for DiscoveredPool { pool_address, token_a, token_b } in &discovered_stable {
        seed_pool(&mut graph, *pool_address, *token_a, *token_b);
    }
    for entry in &config.registry.stable_pools {
        descriptors.push(PoolDescriptor::Stable {
            address: entry.pool,
            coins: entry.coins.clone(),
            rates: vec![U256::from(10u64).pow(U256::from(18u8)); entry.coins.len()],
            a_precision: 100,
        });
    }

    for address in &config.registry.weighted_pools {
        let data = IBalancerPool::getCurrentTokensCall {}.abi_encode();
        let raw = match node.eth_call(*address, data.into(), block).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%address, %err, "getCurrentTokens failed, skipping weighted pool");
                continue;
            }
        };
        let Ok(tokens) = IBalancerPool::getCurrentTokensCall::abi_decode_returns(&raw) else {
            warn!(%address, "failed to decode getCurrentTokens response, skipping weighted pool");
            continue;
        };
        for i in 0..tokens.len() {
            for j in (i + 1)..tokens.len() {
                seed_pool(&mut graph, *address, tokens[i], tokens[j]);
            }
        }
        descriptors.push(PoolDescriptor::Weighted { address: *address, tokens });
    }

    for address in &config.registry.concentrated_pools {
        let (Ok(token0_raw), Ok(token1_raw), Ok(spacing_raw)) = (
            node.eth_call(*address, IUniswapV3Pool::token0Call {}.abi_encode().into(), block).await,
            node.eth_call(*address, IUniswapV3Pool::token1Call {}.abi_encode().into(), block).await,
            node.eth_call(*address, IUniswapV3Pool::tickSpacingCall {}.abi_encode().into(), block).await,
        ) else {
            warn!(%address, "failed to read token0/token1/tickSpacing, skipping concentrated pool");
            continue;
        };
        let (Ok(token0), Ok(token1), Ok(tick_spacing)) = (
            IUniswapV3Pool::token0Call::abi_decode_returns(&token0_raw),
            IUniswapV3Pool::token1Call::abi_decode_returns(&token1_raw),
            IUniswapV3Pool::tickSpacingCall::abi_decode_returns(&spacing_raw),
        ) else {
            warn!(%address, "failed to decode concentrated pool metadata, skipping");
            continue;
        };
        seed_pool(&mut graph, *address, token0, token1);
        descriptors.push(PoolDescriptor::Concentrated { address: *address, token0, token1, tick_spacing });
    }

    for address in &config.registry.hybrid_pools {
        let (Ok(token0_raw), Ok(token1_raw)) = (
            node.eth_call(*address, IMooniswapPool::tokensCall { i: U256::ZERO }.abi_encode().into(), block).await,
            node.eth_call(*address, IMooniswapPool::tokensCall { i: U256::from(1u8) }.abi_encode().into(), block).await,
        ) else {
            warn!(%address, "failed to read tokens(0)/tokens(1), skipping hybrid pool");
            continue;
        };
        let (Ok(token0), Ok(token1)) = (IMooniswapPool::tokensCall::abi_decode_returns(&token0_raw), IMooniswapPool::tokensCall::abi_decode_returns(&token1_raw)) else {
            warn!(%address, "failed to decode hybrid pool tokens, skipping");
            continue;
        };
        seed_pool(&mut graph, *address, token0, token1);
        descriptors.push(PoolDescriptor::Hybrid { address: *address, token0, token1 });
    }

    for address in &config.registry.bancor_converters {
        warn!(%address, "bancor converter reserve tokens are not enumerable with the current ABI set, skipping");
    }

    Ok((graph, descriptors))
}

/// Wires a placeholder zero-reserve snapshot into the graph so
/// [`TokenGraph::insert_pool`]'s edges exist before the first real refresh.
fn seed_pool(graph: &mut TokenGraph, pool_address: Address, token0: Address, token1: Address) {
    let placeholder = PoolHandle::ConstantProduct(ConstantProductPool::new(pool_address, token0, token1, U256::ZERO, U256::ZERO));
    graph.insert_pool(token0, token1, placeholder);
}
