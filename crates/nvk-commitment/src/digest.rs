use nvk_valuation::{
    AssetHolding, AssetType, Liability, LiabilityType, PriceQuote, ValuationMethod,
};
use sha2::{Digest, Sha256};

/// 32-byte commitment digest.
pub type Commitment = [u8; 32];

// Scheme/domain tags. Changing any of these is a commitment-format break.
const DOMAIN_COMMIT: &[u8] = b"NVK_NAV_COMMIT_V1";
const DOMAIN_HOLDINGS: &[u8] = b"NVK_HOLDINGS_V1";
const DOMAIN_PRICES: &[u8] = b"NVK_PRICES_V1";
const DOMAIN_LIABILITIES: &[u8] = b"NVK_LIABILITIES_V1";

/// The declared public inputs of a commitment: one digest per category.
/// A verifier holding the raw inputs recomputes these with the
/// category-digest functions below.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs {
    pub holdings_digest: Commitment,
    pub prices_digest: Commitment,
    pub liabilities_digest: Commitment,
}

// ---------------------------------------------------------------------------
// Field encoding
// ---------------------------------------------------------------------------

// Strings are length-prefixed and integers fixed-width LE, so no two
// distinct element sequences can collide by concatenation.

fn update_str(h: &mut Sha256, s: &str) {
    h.update((s.len() as u32).to_le_bytes());
    h.update(s.as_bytes());
}

fn asset_type_code(t: AssetType) -> u8 {
    match t {
        AssetType::Treasury => 0,
        AssetType::CorporateBond => 1,
        AssetType::RealEstate => 2,
        AssetType::PrivateCredit => 3,
        AssetType::Commodity => 4,
        AssetType::Cash => 5,
    }
}

fn valuation_method_code(m: ValuationMethod) -> u8 {
    match m {
        ValuationMethod::MarkToMarket => 0,
        ValuationMethod::OracleQuote => 1,
        ValuationMethod::ModelPrice => 2,
        ValuationMethod::AmortizedCost => 3,
    }
}

fn liability_type_code(t: LiabilityType) -> u8 {
    match t {
        LiabilityType::AccruedExpense => 0,
        LiabilityType::Borrowing => 1,
        LiabilityType::PendingRedemption => 2,
        LiabilityType::FeePayable => 3,
    }
}

// ---------------------------------------------------------------------------
// Category sub-digests (order-sensitive folds)
// ---------------------------------------------------------------------------

/// Fold holdings in array order into one digest.
pub fn holdings_digest(holdings: &[AssetHolding]) -> Commitment {
    let mut h = Sha256::new();
    for x in holdings {
        update_str(&mut h, &x.asset_id);
        h.update(x.quantity.to_le_bytes());
        h.update([asset_type_code(x.asset_type)]);
        h.update([valuation_method_code(x.valuation_method)]);
        h.update(x.last_updated.to_le_bytes());
    }
    h.update(DOMAIN_HOLDINGS);
    h.finalize().into()
}

/// Fold price quotes in array order into one digest.
pub fn prices_digest(prices: &[PriceQuote]) -> Commitment {
    let mut h = Sha256::new();
    for x in prices {
        update_str(&mut h, &x.asset_id);
        h.update(x.price.to_le_bytes());
        h.update([x.confidence]);
        update_str(&mut h, &x.source);
        h.update(x.timestamp.to_le_bytes());
    }
    h.update(DOMAIN_PRICES);
    h.finalize().into()
}

/// Fold liabilities in array order into one digest.
pub fn liabilities_digest(liabilities: &[Liability]) -> Commitment {
    let mut h = Sha256::new();
    for x in liabilities {
        update_str(&mut h, &x.liability_id);
        h.update(x.amount.to_le_bytes());
        h.update([liability_type_code(x.liability_type)]);
        h.update(x.maturity.to_le_bytes());
        h.update(x.interest_rate_bps.to_le_bytes());
    }
    h.update(DOMAIN_LIABILITIES);
    h.finalize().into()
}

/// Compute all three category digests.
pub fn public_inputs(
    holdings: &[AssetHolding],
    prices: &[PriceQuote],
    liabilities: &[Liability],
) -> PublicInputs {
    PublicInputs {
        holdings_digest: holdings_digest(holdings),
        prices_digest: prices_digest(prices),
        liabilities_digest: liabilities_digest(liabilities),
    }
}

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// Commitment over a NAV value and its public inputs.
pub fn commit_from_public(nav_value: u128, inputs: &PublicInputs) -> Commitment {
    let mut h = Sha256::new();
    h.update(nav_value.to_le_bytes());
    h.update(inputs.holdings_digest);
    h.update(inputs.prices_digest);
    h.update(inputs.liabilities_digest);
    h.update(DOMAIN_COMMIT);
    h.finalize().into()
}

/// Commitment straight from raw inputs (computes the sub-digests first).
pub fn commit(
    nav_value: u128,
    holdings: &[AssetHolding],
    prices: &[PriceQuote],
    liabilities: &[Liability],
) -> Commitment {
    commit_from_public(nav_value, &public_inputs(holdings, prices, liabilities))
}

/// Recompute the expected commitment from declared public inputs and compare.
/// A mismatch is a logical `false`, never an error, so verification loops
/// keep running on disagreement.
pub fn verify(commitment: &Commitment, inputs: &PublicInputs, nav_value: u128) -> bool {
    commit_from_public(nav_value, inputs) == *commitment
}

/// Hex rendering for events and logs.
pub fn to_hex(digest: &Commitment) -> String {
    hex::encode(digest)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
