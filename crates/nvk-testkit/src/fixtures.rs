//! Shared input builders for tests and scenario fixtures. Times are pinned
//! to [`NOW`] so fixtures stay deterministic.

use nvk_valuation::{
    AssetHolding, AssetType, ComplianceProof, Liability, LiabilityType, PriceQuote,
    ValuationMethod,
};

/// Fixed wall-clock for deterministic fixtures.
pub const NOW: i64 = 1_700_000_000;

/// Micro-unit scale shorthand.
pub const M: u128 = 1_000_000;

pub fn holding(asset_id: &str, quantity: u128, asset_type: AssetType) -> AssetHolding {
    AssetHolding {
        asset_id: asset_id.to_owned(),
        quantity,
        asset_type,
        valuation_method: ValuationMethod::MarkToMarket,
        last_updated: NOW - 60,
    }
}

pub fn quote(asset_id: &str, price: u128, confidence: u8) -> PriceQuote {
    PriceQuote {
        asset_id: asset_id.to_owned(),
        price,
        confidence,
        source: "fixture".to_owned(),
        timestamp: NOW - 30,
    }
}

pub fn liability(liability_id: &str, amount: u128, liability_type: LiabilityType) -> Liability {
    Liability {
        liability_id: liability_id.to_owned(),
        amount,
        liability_type,
        maturity: NOW,
        interest_rate_bps: 0,
    }
}

pub fn proof(proof_type: &str, issuer: &str) -> ComplianceProof {
    ComplianceProof {
        proof_type: proof_type.to_owned(),
        hash: [0x11; 32],
        issuer: issuer.to_owned(),
        expiry: NOW + 86_400,
    }
}
