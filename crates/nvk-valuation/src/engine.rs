use crate::fixedpoint::{bps_of, mul_div, qty_price_value, BPS_DENOM, SECS_PER_YEAR_DENOM};
use crate::types::{
    AssetHolding, ComplianceProof, NavInputs, PriceQuote, RiskAdjustments, Valuation,
    ValuationConfig, ValuationError, MAX_FUTURE_SKEW_SECS, MAX_PRICE_AGE_SECS,
    MIN_PRICE_CONFIDENCE,
};

// ---------------------------------------------------------------------------
// Input validation guards
// ---------------------------------------------------------------------------

/// Guard: holdings non-empty, every quantity strictly positive, every
/// update timestamp set. Runs before any arithmetic so a bad holding can
/// never reach the aggregation loop.
pub fn validate_holdings(holdings: &[AssetHolding]) -> Result<(), ValuationError> {
    if holdings.is_empty() {
        return Err(ValuationError::EmptyHoldings);
    }
    for h in holdings {
        if h.quantity == 0 {
            return Err(ValuationError::ZeroQuantity {
                asset_id: h.asset_id.clone(),
            });
        }
        if h.last_updated <= 0 {
            return Err(ValuationError::MissingTimestamp {
                asset_id: h.asset_id.clone(),
            });
        }
    }
    Ok(())
}

/// Guard: prices non-empty, strictly positive, confident, fresh, and not
/// dated into the future beyond clock-skew tolerance.
pub fn validate_prices(prices: &[PriceQuote], now: i64) -> Result<(), ValuationError> {
    if prices.is_empty() {
        return Err(ValuationError::EmptyPrices);
    }
    for p in prices {
        if p.price == 0 {
            return Err(ValuationError::ZeroPrice {
                asset_id: p.asset_id.clone(),
            });
        }
        if p.confidence < MIN_PRICE_CONFIDENCE {
            return Err(ValuationError::LowConfidence {
                asset_id: p.asset_id.clone(),
                confidence: p.confidence,
            });
        }
        let age = now - p.timestamp;
        if age >= MAX_PRICE_AGE_SECS {
            return Err(ValuationError::StalePrice {
                asset_id: p.asset_id.clone(),
                age_secs: age,
            });
        }
        if p.timestamp > now + MAX_FUTURE_SKEW_SECS {
            return Err(ValuationError::FutureQuote {
                asset_id: p.asset_id.clone(),
                skew_secs: p.timestamp - now,
            });
        }
    }
    Ok(())
}

/// Guard: compliance proofs unexpired with a non-zero hash.
pub fn validate_proofs(proofs: &[ComplianceProof], now: i64) -> Result<(), ValuationError> {
    for cp in proofs {
        if cp.expiry <= now {
            return Err(ValuationError::ExpiredProof {
                proof_type: cp.proof_type.clone(),
            });
        }
        if cp.hash == [0u8; 32] {
            return Err(ValuationError::ZeroProofHash {
                proof_type: cp.proof_type.clone(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Compute the fund NAV from fully materialized inputs.
///
/// Stages, in fixed order:
/// 1) validate holdings, prices, compliance proofs;
/// 2) total_assets = Σ quantity × matched price / 1e6 (exact asset_id match,
///    first quote in array order wins; a holding with no quote is fatal);
/// 3) total_liabilities = Σ amount + simple accrued interest to maturity;
/// 4) raw_nav = total_assets − total_liabilities, floored at zero;
/// 5) haircuts (config-gated): volatility, liquidity, concentration, each
///    `raw_nav × factor_bps / 10_000`, adjusted NAV floored at zero.
///
/// Identical inputs yield a bit-identical `Valuation`.
pub fn compute(
    cfg: &ValuationConfig,
    inputs: &NavInputs,
    now: i64,
) -> Result<Valuation, ValuationError> {
    validate_holdings(&inputs.holdings)?;
    validate_prices(&inputs.prices, now)?;
    validate_proofs(&inputs.compliance_proofs, now)?;

    // Per-holding values are kept for the factor functions below.
    let mut total_assets: u128 = 0;
    let mut values: Vec<(u128, bool)> = Vec::with_capacity(inputs.holdings.len());

    for h in &inputs.holdings {
        let quote = inputs
            .prices
            .iter()
            .find(|p| p.asset_id == h.asset_id)
            .ok_or_else(|| ValuationError::PriceNotFound {
                asset_id: h.asset_id.clone(),
            })?;

        let value = qty_price_value(h.quantity, quote.price).ok_or(ValuationError::Overflow {
            context: "asset value",
        })?;

        total_assets = total_assets
            .checked_add(value)
            .ok_or(ValuationError::Overflow {
                context: "total assets",
            })?;
        values.push((value, h.asset_type.is_illiquid()));
    }

    let mut total_liabilities: u128 = 0;
    for l in &inputs.liabilities {
        let accrued = accrued_interest(l.amount, l.interest_rate_bps, l.maturity, now)?;
        let owed = l
            .amount
            .checked_add(accrued)
            .ok_or(ValuationError::Overflow {
                context: "liability amount",
            })?;
        total_liabilities =
            total_liabilities
                .checked_add(owed)
                .ok_or(ValuationError::Overflow {
                    context: "total liabilities",
                })?;
    }

    // Never negative: an over-levered fund reports zero, not a signed value.
    let raw_nav = total_assets.saturating_sub(total_liabilities);

    let adjustments = if cfg.risk_adjustments_enabled {
        risk_adjustments(cfg, &inputs.prices, &values, total_assets, raw_nav)?
    } else {
        RiskAdjustments::default()
    };

    let nav_value = raw_nav.saturating_sub(adjustments.total_deduction);

    Ok(Valuation {
        nav_value,
        raw_nav,
        total_assets,
        total_liabilities,
        adjustments,
    })
}

/// Simple interest while `maturity > now` and rate is positive:
/// `amount × rate_bps × seconds_remaining / (10_000 × seconds_per_year)`.
/// Matured or rate-free liabilities accrue nothing.
fn accrued_interest(
    amount: u128,
    rate_bps: u64,
    maturity: i64,
    now: i64,
) -> Result<u128, ValuationError> {
    if rate_bps == 0 || maturity <= now {
        return Ok(0);
    }
    let secs_remaining = (maturity - now) as u128;
    amount
        .checked_mul(rate_bps as u128)
        .and_then(|x| x.checked_mul(secs_remaining))
        .and_then(|x| x.checked_div(SECS_PER_YEAR_DENOM))
        .ok_or(ValuationError::Overflow {
            context: "interest accrual",
        })
}

// ---------------------------------------------------------------------------
// Haircut factor functions
// ---------------------------------------------------------------------------

/// The three factors are independent views over the same inputs; each is
/// capped, then charged against raw_nav separately.
fn risk_adjustments(
    cfg: &ValuationConfig,
    prices: &[PriceQuote],
    values: &[(u128, bool)],
    total_assets: u128,
    raw_nav: u128,
) -> Result<RiskAdjustments, ValuationError> {
    let volatility_bps = cap(volatility_factor_bps(cfg, prices), cfg.max_adjustment_bps);
    let liquidity_bps = cap(
        liquidity_factor_bps(cfg, values, total_assets),
        cfg.max_adjustment_bps,
    );
    let concentration_bps = cap(
        concentration_factor_bps(cfg, values, total_assets),
        cfg.max_adjustment_bps,
    );

    let mut total_deduction: u128 = 0;
    for bps in [volatility_bps, liquidity_bps, concentration_bps] {
        let cut = bps_of(raw_nav, bps).ok_or(ValuationError::Overflow {
            context: "risk haircut",
        })?;
        total_deduction = total_deduction.saturating_add(cut);
    }

    Ok(RiskAdjustments {
        volatility_bps,
        liquidity_bps,
        concentration_bps,
        total_deduction,
    })
}

fn cap(bps: u64, max_bps: u64) -> u64 {
    bps.min(max_bps)
}

/// Average confidence shortfall (100 − confidence) across quotes, scaled by
/// the per-point weight. Full-confidence feeds cost nothing.
fn volatility_factor_bps(cfg: &ValuationConfig, prices: &[PriceQuote]) -> u64 {
    if prices.is_empty() {
        return 0;
    }
    let shortfall_sum: u64 = prices
        .iter()
        .map(|p| (100u64).saturating_sub(p.confidence as u64))
        .sum();
    let avg = shortfall_sum / prices.len() as u64;
    avg.saturating_mul(cfg.volatility_bps_per_point)
}

/// Illiquidity haircut proportional to the illiquid share of assets:
/// `illiquid_value × haircut_bps / total_assets`.
fn liquidity_factor_bps(cfg: &ValuationConfig, values: &[(u128, bool)], total_assets: u128) -> u64 {
    if total_assets == 0 {
        return 0;
    }
    let illiquid: u128 = values
        .iter()
        .filter(|(_, illiquid)| *illiquid)
        .map(|(v, _)| *v)
        .sum();
    // illiquid ≤ total_assets, so the scaled share fits u64 whenever the
    // product fits u128. Fail-closed on overflow: charge the full haircut.
    match mul_div(illiquid, cfg.illiquidity_haircut_bps as u128, total_assets) {
        Some(bps) => bps as u64,
        None => cfg.illiquidity_haircut_bps,
    }
}

/// Largest single-asset share of assets (bps) over the configured floor,
/// scaled by the concentration weight.
fn concentration_factor_bps(
    cfg: &ValuationConfig,
    values: &[(u128, bool)],
    total_assets: u128,
) -> u64 {
    if total_assets == 0 {
        return 0;
    }
    let max_value = values.iter().map(|(v, _)| *v).max().unwrap_or(0);
    // max_value ≤ total_assets, so the share is ≤ 10_000 bps when the
    // product fits u128. Fail-closed on overflow: treat as a 100% share.
    let max_share_bps = match mul_div(max_value, BPS_DENOM, total_assets) {
        Some(bps) => bps as u64,
        None => BPS_DENOM as u64,
    };
    let excess = max_share_bps.saturating_sub(cfg.concentration_floor_bps);
    (excess as u128 * cfg.concentration_weight_bps as u128 / BPS_DENOM) as u64
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
