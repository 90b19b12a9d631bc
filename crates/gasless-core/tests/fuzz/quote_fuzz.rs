//! Fuzz tests for quote arithmetic

use gasless_core::tokens::{USDC, WETH};
use gasless_core::{MockRouteProvider, QuoteRequest};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Up to one billion USDC in base units
fn amount_strategy() -> impl Strategy<Value = u128> {
    1u128..1_000_000_000_000_000u128
}

fn slippage_strategy() -> impl Strategy<Value = u32> {
    0u32..=10_000u32
}

proptest! {
    /// More input never yields less output
    #[test]
    fn quote_monotonic_in_amount(a in amount_strategy(), b in amount_strategy(), bps in slippage_strategy()) {
        let provider = MockRouteProvider::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let out_lo = provider.output_amount(&QuoteRequest::new(USDC.address, WETH.address, lo).with_slippage_bps(bps)).unwrap();
        let out_hi = provider.output_amount(&QuoteRequest::new(USDC.address, WETH.address, hi).with_slippage_bps(bps)).unwrap();
        prop_assert!(out_lo <= out_hi);
    }

    /// More slippage never yields more output
    #[test]
    fn quote_antitone_in_slippage(amount in amount_strategy(), x in slippage_strategy(), y in slippage_strategy()) {
        let provider = MockRouteProvider::default();
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let tight = provider.output_amount(&QuoteRequest::new(USDC.address, WETH.address, amount).with_slippage_bps(lo)).unwrap();
        let loose = provider.output_amount(&QuoteRequest::new(USDC.address, WETH.address, amount).with_slippage_bps(hi)).unwrap();
        prop_assert!(loose <= tight);
    }

    /// Output never exceeds the zero-slippage conversion
    #[test]
    fn quote_bounded_by_spot(amount in amount_strategy(), bps in slippage_strategy()) {
        let provider = MockRouteProvider::default();
        let out = provider.output_amount(&QuoteRequest::new(USDC.address, WETH.address, amount).with_slippage_bps(bps)).unwrap();
        let spot = amount * 1_000_000_000_000 / 2500;
        prop_assert!(out <= spot);
    }
}
