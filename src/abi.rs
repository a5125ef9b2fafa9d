//! Centralized contract interface definitions.
//!
//! Every Solidity interface this engine calls into, defined with alloy's
//! `sol!` macro. `#[sol(rpc)]` interfaces generate contract instance types
//! usable against any `alloy::providers::Provider`; plain `sol!` blocks
//! (no `rpc`) are used purely for their generated encode/decode helpers when
//! the cache talks through the generic `NodeClient` batch interface instead.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

// ── Uniswap V2 / Sushi (constant-product) ───────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
        function allPairs(uint256) external view returns (address pair);
        function allPairsLength() external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function swap(uint256 amount0Out, uint256 amount1Out, address to, bytes calldata data) external;
    }
}

// ── Curve StableSwap ──────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ICurvePool {
        function balances(uint256 i) external view returns (uint256);
        function fee() external view returns (uint256);
        function admin_fee() external view returns (uint256);
        function initial_A() external view returns (uint256);
        function future_A() external view returns (uint256);
        function initial_A_time() external view returns (uint256);
        function future_A_time() external view returns (uint256);
        function get_dy(int128 i, int128 j, uint256 dx) external view returns (uint256);
        function exchange(int128 i, int128 j, uint256 dx, uint256 min_dy) external;
        function exchange_underlying(int128 i, int128 j, uint256 dx, uint256 min_dy) external;
    }
}

// ── Balancer weighted pools ───────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IBalancerPool {
        function getBalance(address token) external view returns (uint256);
        function getNormalizedWeight(address token) external view returns (uint256);
        function getSwapFee() external view returns (uint256);
        function getCurrentTokens() external view returns (address[] memory tokens);
        function swapExactAmountIn(address tokenIn, uint256 tokenAmountIn, address tokenOut, uint256 minAmountOut, uint256 maxPrice) external returns (uint256 tokenAmountOut, uint256 spotPriceAfter);
    }
}

// ── Uniswap V3 (concentrated liquidity) ──────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function tickSpacing() external view returns (int24);
        function tickBitmap(int16 wordPosition) external view returns (uint256);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function observations(uint256 index) external view returns (uint32 blockTimestamp, int56 tickCumulative, uint160 secondsPerLiquidityCumulativeX128, bool initialized);
        function flash(address recipient, uint256 amount0, uint256 amount1, bytes calldata data) external;
    }
}

// ── Mooniswap (hybrid, directional reserves) ─────────────────────────

sol! {
    #[sol(rpc)]
    interface IMooniswapPool {
        function getBalanceForAddition(address token) external view returns (uint256);
        function getBalanceForRemoval(address token) external view returns (uint256);
        function fee() external view returns (uint256);
        function tokens(uint256 i) external view returns (address);
        function swap(address inToken, address outToken, uint256 inAmount, uint256 minReturn, address referral) external payable returns (uint256 result);
    }
}

// ── Bancor converter ──────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IBancorConverter {
        function reserveBalance(address reserveToken) external view returns (uint256);
        function reserveWeight(address reserveToken) external view returns (uint32);
    }
}

// ── Wrapped ether (aETH-pool unwrap/rewrap legs) ─────────────────────

sol! {
    #[sol(rpc)]
    interface IWETH {
        function withdraw(uint256 wad) external;
        function deposit() external payable;
    }
}

// ── Flash-loan-executing arb contract ("ape") ────────────────────────

sol! {
    #[sol(rpc)]
    interface IApeExecutor {
        function execute(uint256[] calldata callArray) external payable;
    }
}
