/// Lowest oracle confidence accepted for a price quote.
pub const MIN_PRICE_CONFIDENCE: u8 = 50;

/// A quote older than this (seconds) is stale.
pub const MAX_PRICE_AGE_SECS: i64 = 3_600;

/// A quote dated further than this into the future is rejected.
pub const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Asset classes held by a fund. RealEstate and PrivateCredit are the
/// illiquid classes for the liquidity haircut.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetType {
    Treasury,
    CorporateBond,
    RealEstate,
    PrivateCredit,
    Commodity,
    Cash,
}

impl AssetType {
    pub fn is_illiquid(self) -> bool {
        matches!(self, AssetType::RealEstate | AssetType::PrivateCredit)
    }
}

/// How a holding's carrying value was derived upstream. Carried through to
/// audit payloads; does not alter aggregation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValuationMethod {
    MarkToMarket,
    OracleQuote,
    ModelPrice,
    AmortizedCost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiabilityType {
    AccruedExpense,
    Borrowing,
    PendingRedemption,
    FeePayable,
}

/// One position in the fund. Quantity is micro-unit scaled (1e-6 shares).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetHolding {
    pub asset_id: String,
    pub quantity: u128,
    pub asset_type: AssetType,
    pub valuation_method: ValuationMethod,
    pub last_updated: i64,
}

/// An oracle price for one asset. Price is micro-units per whole share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub asset_id: String,
    pub price: u128,
    /// 0..=100. Quotes below [`MIN_PRICE_CONFIDENCE`] are rejected.
    pub confidence: u8,
    pub source: String,
    pub timestamp: i64,
}

/// A fund obligation. Simple interest accrues while `maturity > now` and
/// `interest_rate_bps > 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Liability {
    pub liability_id: String,
    pub amount: u128,
    pub liability_type: LiabilityType,
    pub maturity: i64,
    pub interest_rate_bps: u64,
}

/// Externally issued compliance attestation, consumed opaquely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplianceProof {
    pub proof_type: String,
    pub hash: [u8; 32],
    pub issuer: String,
    pub expiry: i64,
}

/// Everything one computation consumes. Array order is contractual: the
/// commitment layer folds elements in this exact order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NavInputs {
    pub holdings: Vec<AssetHolding>,
    pub prices: Vec<PriceQuote>,
    pub liabilities: Vec<Liability>,
    pub compliance_proofs: Vec<ComplianceProof>,
}

/// Risk haircut layer knobs. All basis points unless noted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuationConfig {
    pub risk_adjustments_enabled: bool,

    /// Volatility haircut per average point of confidence shortfall
    /// (shortfall = 100 − confidence).
    pub volatility_bps_per_point: u64,

    /// Haircut applied to the illiquid share of assets.
    pub illiquidity_haircut_bps: u64,

    /// Single-asset share above which concentration starts to cost.
    pub concentration_floor_bps: u64,

    /// Weight applied to the concentration excess.
    pub concentration_weight_bps: u64,

    /// Per-factor cap.
    pub max_adjustment_bps: u64,
}

impl ValuationConfig {
    pub fn sane_defaults() -> Self {
        Self {
            risk_adjustments_enabled: true,
            volatility_bps_per_point: 10,
            illiquidity_haircut_bps: 300,
            concentration_floor_bps: 2_500,
            concentration_weight_bps: 1_000,
            max_adjustment_bps: 2_000,
        }
    }
}

/// The three independent haircut factors, plus the micro-unit total deducted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct RiskAdjustments {
    pub volatility_bps: u64,
    pub liquidity_bps: u64,
    pub concentration_bps: u64,
    pub total_deduction: u128,
}

/// Output of one computation. `nav_value` is the adjusted figure; `raw_nav`
/// is assets minus liabilities before haircuts (floored at zero).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Valuation {
    pub nav_value: u128,
    pub raw_nav: u128,
    pub total_assets: u128,
    pub total_liabilities: u128,
    pub adjustments: RiskAdjustments,
}

/// Validation / computation failures. The input variants are recoverable by
/// resubmission with corrected data; `PriceNotFound` is fatal for the
/// computation (no default price is ever substituted) and `Overflow` means
/// the inputs do not fit the arithmetic domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValuationError {
    EmptyHoldings,
    ZeroQuantity { asset_id: String },
    MissingTimestamp { asset_id: String },
    EmptyPrices,
    ZeroPrice { asset_id: String },
    LowConfidence { asset_id: String, confidence: u8 },
    StalePrice { asset_id: String, age_secs: i64 },
    FutureQuote { asset_id: String, skew_secs: i64 },
    ExpiredProof { proof_type: String },
    ZeroProofHash { proof_type: String },
    PriceNotFound { asset_id: String },
    Overflow { context: &'static str },
}

impl std::fmt::Display for ValuationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValuationError::EmptyHoldings => write!(f, "holdings set is empty"),
            ValuationError::ZeroQuantity { asset_id } => {
                write!(f, "holding {asset_id} has zero quantity")
            }
            ValuationError::MissingTimestamp { asset_id } => {
                write!(f, "holding {asset_id} has no update timestamp")
            }
            ValuationError::EmptyPrices => write!(f, "price set is empty"),
            ValuationError::ZeroPrice { asset_id } => {
                write!(f, "quote for {asset_id} has zero price")
            }
            ValuationError::LowConfidence {
                asset_id,
                confidence,
            } => write!(
                f,
                "quote for {asset_id} confidence {confidence} below minimum {MIN_PRICE_CONFIDENCE}"
            ),
            ValuationError::StalePrice { asset_id, age_secs } => write!(
                f,
                "quote for {asset_id} is {age_secs}s old (max {MAX_PRICE_AGE_SECS}s)"
            ),
            ValuationError::FutureQuote {
                asset_id,
                skew_secs,
            } => write!(
                f,
                "quote for {asset_id} is {skew_secs}s in the future (max {MAX_FUTURE_SKEW_SECS}s)"
            ),
            ValuationError::ExpiredProof { proof_type } => {
                write!(f, "compliance proof {proof_type} is expired")
            }
            ValuationError::ZeroProofHash { proof_type } => {
                write!(f, "compliance proof {proof_type} has a zero hash")
            }
            ValuationError::PriceNotFound { asset_id } => {
                write!(f, "no price quote for asset {asset_id}")
            }
            ValuationError::Overflow { context } => {
                write!(f, "arithmetic overflow in {context}")
            }
        }
    }
}

impl std::error::Error for ValuationError {}
