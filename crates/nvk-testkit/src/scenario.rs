//! Scenario files: serde DTOs for scripted runs, plus the conversions into
//! the engine's input types.
//!
//! Money fields are micro-unit integers written as strings so YAML never
//! routes them through floats; underscores are allowed as digit separators
//! ("925_000_000"). Time in a scenario is relative where that reads better:
//! holdings carry `age_secs`, liabilities `due_in_secs`, proofs
//! `valid_for_secs`, all anchored to the step's `at` timestamp.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use nvk_engine::{Capability, EmergencyReason, EngineConfig};
use nvk_exposure::ExposureType;
use nvk_valuation::{
    AssetHolding, AssetType, ComplianceProof, Liability, LiabilityType, NavInputs, PriceQuote,
    ValuationMethod,
};

/// One scripted run: a cast of actors and an ordered list of operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub actors: Vec<ActorSpec>,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpec {
    pub name: String,
    pub capabilities: Vec<CapabilitySpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySpec {
    Oracle,
    Verifier,
    Admin,
    Bridge,
}

impl From<CapabilitySpec> for Capability {
    fn from(c: CapabilitySpec) -> Self {
        match c {
            CapabilitySpec::Oracle => Capability::Oracle,
            CapabilitySpec::Verifier => Capability::Verifier,
            CapabilitySpec::Admin => Capability::Admin,
            CapabilitySpec::Bridge => Capability::Bridge,
        }
    }
}

/// One operation against the engine. The `op` tag selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepSpec {
    ComputeNav {
        actor: String,
        fund_id: String,
        at: i64,
        holdings: Vec<HoldingSpec>,
        prices: Vec<PriceSpec>,
        #[serde(default)]
        liabilities: Vec<LiabilitySpec>,
        #[serde(default)]
        compliance_proofs: Vec<ProofSpec>,
    },
    /// Re-verify the last commitment this run published for `fund_id`.
    /// `claimed_nav` overrides the published value to script a mismatch.
    VerifyLast {
        actor: String,
        fund_id: String,
        #[serde(default)]
        claimed_nav: Option<String>,
    },
    UpdateExposure {
        actor: String,
        from_fund: String,
        to_fund: String,
        weight_bps: u64,
        exposure_type: ExposureTypeSpec,
        slot_index: usize,
        at: i64,
    },
    DetectExposure {
        max_exposure_pct_bps: u64,
        at: i64,
    },
    /// Report an anchor-target confirmation for the last published epoch of
    /// `fund_id`. `nav_value` overrides the published value to script a
    /// divergent report; `epoch` overrides the published epoch.
    RecordAnchor {
        actor: String,
        fund_id: String,
        anchor_id: String,
        #[serde(default)]
        epoch: Option<u64>,
        #[serde(default)]
        nav_value: Option<String>,
        at: i64,
    },
    TriggerEmergency {
        actor: String,
        reason: ReasonSpec,
        at: i64,
    },
    ClearEmergency {
        actor: String,
    },
    OverrideNav {
        actor: String,
        fund_id: String,
        nav_value: String,
        reason: ReasonSpec,
        at: i64,
    },
    ResetBreaker {
        actor: String,
        fund_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingSpec {
    pub asset_id: String,
    pub quantity: String,
    pub asset_type: AssetTypeSpec,
    #[serde(default)]
    pub valuation_method: MethodSpec,
    /// Seconds before the step's `at` that this position was last updated.
    #[serde(default)]
    pub age_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSpec {
    pub asset_id: String,
    pub price: String,
    #[serde(default = "full_confidence")]
    pub confidence: u8,
    #[serde(default = "default_source")]
    pub source: String,
    /// Seconds before the step's `at` that the quote was struck.
    #[serde(default)]
    pub age_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiabilitySpec {
    pub liability_id: String,
    pub amount: String,
    pub liability_type: LiabilityTypeSpec,
    /// Seconds after the step's `at` that the obligation matures. Negative
    /// values script an already-matured liability.
    pub due_in_secs: i64,
    #[serde(default)]
    pub interest_rate_bps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofSpec {
    pub proof_type: String,
    pub issuer: String,
    /// 64 hex chars.
    pub hash_hex: String,
    pub valid_for_secs: i64,
}

fn full_confidence() -> u8 {
    100
}

fn default_source() -> String {
    "scenario".to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetTypeSpec {
    Treasury,
    CorporateBond,
    RealEstate,
    PrivateCredit,
    Commodity,
    Cash,
}

impl From<AssetTypeSpec> for AssetType {
    fn from(t: AssetTypeSpec) -> Self {
        match t {
            AssetTypeSpec::Treasury => AssetType::Treasury,
            AssetTypeSpec::CorporateBond => AssetType::CorporateBond,
            AssetTypeSpec::RealEstate => AssetType::RealEstate,
            AssetTypeSpec::PrivateCredit => AssetType::PrivateCredit,
            AssetTypeSpec::Commodity => AssetType::Commodity,
            AssetTypeSpec::Cash => AssetType::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodSpec {
    #[default]
    MarkToMarket,
    OracleQuote,
    ModelPrice,
    AmortizedCost,
}

impl From<MethodSpec> for ValuationMethod {
    fn from(m: MethodSpec) -> Self {
        match m {
            MethodSpec::MarkToMarket => ValuationMethod::MarkToMarket,
            MethodSpec::OracleQuote => ValuationMethod::OracleQuote,
            MethodSpec::ModelPrice => ValuationMethod::ModelPrice,
            MethodSpec::AmortizedCost => ValuationMethod::AmortizedCost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityTypeSpec {
    AccruedExpense,
    Borrowing,
    PendingRedemption,
    FeePayable,
}

impl From<LiabilityTypeSpec> for LiabilityType {
    fn from(t: LiabilityTypeSpec) -> Self {
        match t {
            LiabilityTypeSpec::AccruedExpense => LiabilityType::AccruedExpense,
            LiabilityTypeSpec::Borrowing => LiabilityType::Borrowing,
            LiabilityTypeSpec::PendingRedemption => LiabilityType::PendingRedemption,
            LiabilityTypeSpec::FeePayable => LiabilityType::FeePayable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureTypeSpec {
    DirectInvestment,
    DerivativeExposure,
    CollateralBacking,
    SyntheticExposure,
}

impl From<ExposureTypeSpec> for ExposureType {
    fn from(t: ExposureTypeSpec) -> Self {
        match t {
            ExposureTypeSpec::DirectInvestment => ExposureType::DirectInvestment,
            ExposureTypeSpec::DerivativeExposure => ExposureType::DerivativeExposure,
            ExposureTypeSpec::CollateralBacking => ExposureType::CollateralBacking,
            ExposureTypeSpec::SyntheticExposure => ExposureType::SyntheticExposure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonSpec {
    MarketCrash,
    OracleFailure,
    SecurityBreach,
    RegulatoryAction,
    TechnicalFailure,
    ExcessiveDrift,
}

impl From<ReasonSpec> for EmergencyReason {
    fn from(r: ReasonSpec) -> Self {
        match r {
            ReasonSpec::MarketCrash => EmergencyReason::MarketCrash,
            ReasonSpec::OracleFailure => EmergencyReason::OracleFailure,
            ReasonSpec::SecurityBreach => EmergencyReason::SecurityBreach,
            ReasonSpec::RegulatoryAction => EmergencyReason::RegulatoryAction,
            ReasonSpec::TechnicalFailure => EmergencyReason::TechnicalFailure,
            ReasonSpec::ExcessiveDrift => EmergencyReason::ExcessiveDrift,
        }
    }
}

/// Parse a micro-unit money string. Underscore separators are stripped.
pub fn parse_micros(text: &str, what: &str) -> Result<u128> {
    let cleaned = text.trim().replace('_', "");
    cleaned
        .parse::<u128>()
        .with_context(|| format!("{what}: not a micro-unit integer: {text:?}"))
}

pub fn build_nav_inputs(
    at: i64,
    holdings: &[HoldingSpec],
    prices: &[PriceSpec],
    liabilities: &[LiabilitySpec],
    compliance_proofs: &[ProofSpec],
) -> Result<NavInputs> {
    let mut inputs = NavInputs::default();
    for h in holdings {
        inputs.holdings.push(AssetHolding {
            asset_id: h.asset_id.clone(),
            quantity: parse_micros(&h.quantity, &format!("holding {}", h.asset_id))?,
            asset_type: h.asset_type.into(),
            valuation_method: h.valuation_method.into(),
            last_updated: at - h.age_secs,
        });
    }
    for p in prices {
        inputs.prices.push(PriceQuote {
            asset_id: p.asset_id.clone(),
            price: parse_micros(&p.price, &format!("price {}", p.asset_id))?,
            confidence: p.confidence,
            source: p.source.clone(),
            timestamp: at - p.age_secs,
        });
    }
    for l in liabilities {
        inputs.liabilities.push(Liability {
            liability_id: l.liability_id.clone(),
            amount: parse_micros(&l.amount, &format!("liability {}", l.liability_id))?,
            liability_type: l.liability_type.into(),
            maturity: at + l.due_in_secs,
            interest_rate_bps: l.interest_rate_bps,
        });
    }
    for pr in compliance_proofs {
        let raw = hex::decode(&pr.hash_hex)
            .with_context(|| format!("proof {}: hash_hex is not hex", pr.proof_type))?;
        if raw.len() != 32 {
            bail!(
                "proof {}: hash_hex must be 32 bytes, got {}",
                pr.proof_type,
                raw.len()
            );
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&raw);
        inputs.compliance_proofs.push(ComplianceProof {
            proof_type: pr.proof_type.clone(),
            hash,
            issuer: pr.issuer.clone(),
            expiry: at + pr.valid_for_secs,
        });
    }
    Ok(inputs)
}

/// Engine settings the demo scenario assumes: defaults everywhere, plus two
/// known anchor targets.
pub fn demo_engine_config() -> EngineConfig {
    let mut cfg = EngineConfig::sane_defaults();
    cfg.anchor.known_targets = vec!["chain-east".to_owned(), "chain-west".to_owned()];
    cfg
}

/// A run that touches every operation class: two calm epochs, a
/// verification, a hot exposure edge plus the sweep that reports it, an
/// anchor confirmation, and an emergency round-trip ending with a third
/// epoch (whose pipeline pass reports the standing edge again).
pub fn demo_scenario() -> ScenarioSpec {
    const T0: i64 = 1_700_000_000;
    let book = |price: &str, at: i64| StepSpec::ComputeNav {
        actor: "nav-oracle".to_owned(),
        fund_id: "fund-main".to_owned(),
        at,
        holdings: vec![
            HoldingSpec {
                asset_id: "UST-2Y".to_owned(),
                quantity: "600_000_000".to_owned(),
                asset_type: AssetTypeSpec::Treasury,
                valuation_method: MethodSpec::MarkToMarket,
                age_secs: 60,
            },
            HoldingSpec {
                asset_id: "CORP-A".to_owned(),
                quantity: "400_000_000".to_owned(),
                asset_type: AssetTypeSpec::CorporateBond,
                valuation_method: MethodSpec::OracleQuote,
                age_secs: 60,
            },
        ],
        prices: vec![
            PriceSpec {
                asset_id: "UST-2Y".to_owned(),
                price: "1_000_000".to_owned(),
                confidence: 100,
                source: "demo".to_owned(),
                age_secs: 30,
            },
            PriceSpec {
                asset_id: "CORP-A".to_owned(),
                price: price.to_owned(),
                confidence: 100,
                source: "demo".to_owned(),
                age_secs: 30,
            },
        ],
        liabilities: vec![LiabilitySpec {
            liability_id: "REPO-7".to_owned(),
            amount: "50_000_000".to_owned(),
            liability_type: LiabilityTypeSpec::Borrowing,
            due_in_secs: 0,
            interest_rate_bps: 0,
        }],
        compliance_proofs: vec![],
    };

    ScenarioSpec {
        name: "demo-full-surface".to_owned(),
        actors: vec![
            ActorSpec {
                name: "nav-oracle".to_owned(),
                capabilities: vec![CapabilitySpec::Oracle],
            },
            ActorSpec {
                name: "auditor".to_owned(),
                capabilities: vec![CapabilitySpec::Verifier],
            },
            ActorSpec {
                name: "ops".to_owned(),
                capabilities: vec![CapabilitySpec::Admin],
            },
            ActorSpec {
                name: "settle-bridge".to_owned(),
                capabilities: vec![CapabilitySpec::Bridge],
            },
        ],
        steps: vec![
            book("1_000_000", T0),
            StepSpec::VerifyLast {
                actor: "auditor".to_owned(),
                fund_id: "fund-main".to_owned(),
                claimed_nav: None,
            },
            book("1_010_000", T0 + 3_600),
            StepSpec::UpdateExposure {
                actor: "ops".to_owned(),
                from_fund: "fund-main".to_owned(),
                to_fund: "fund-feeder".to_owned(),
                // Over the 5000 bps concentration limit on purpose.
                weight_bps: 5_500,
                exposure_type: ExposureTypeSpec::DirectInvestment,
                slot_index: 0,
                at: T0 + 3_700,
            },
            StepSpec::DetectExposure {
                max_exposure_pct_bps: 3_000,
                at: T0 + 3_800,
            },
            StepSpec::RecordAnchor {
                actor: "settle-bridge".to_owned(),
                fund_id: "fund-main".to_owned(),
                anchor_id: "chain-east".to_owned(),
                epoch: None,
                nav_value: None,
                at: T0 + 3_900,
            },
            StepSpec::TriggerEmergency {
                actor: "ops".to_owned(),
                reason: ReasonSpec::OracleFailure,
                at: T0 + 4_000,
            },
            StepSpec::ClearEmergency {
                actor: "ops".to_owned(),
            },
            book("1_005_000", T0 + 7_200),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_step_parses_with_defaults_applied() {
        let yaml = r#"
name: tiny
actors:
  - name: oracle-1
    capabilities: [oracle]
steps:
  - op: compute_nav
    actor: oracle-1
    fund_id: fund-x
    at: 1700000000
    holdings:
      - asset_id: CASH
        quantity: "1_000_000"
        asset_type: cash
    prices:
      - asset_id: CASH
        price: "1000000"
"#;
        let spec: ScenarioSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.actors[0].capabilities, vec![CapabilitySpec::Oracle]);
        match &spec.steps[0] {
            StepSpec::ComputeNav {
                holdings,
                prices,
                liabilities,
                compliance_proofs,
                ..
            } => {
                assert_eq!(holdings[0].valuation_method, MethodSpec::MarkToMarket);
                assert_eq!(holdings[0].age_secs, 0);
                assert_eq!(prices[0].confidence, 100);
                assert_eq!(prices[0].source, "scenario");
                assert!(liabilities.is_empty());
                assert!(compliance_proofs.is_empty());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn money_strings_accept_underscores_and_reject_garbage() {
        assert_eq!(parse_micros("925_000_000", "x").unwrap(), 925_000_000);
        assert_eq!(parse_micros(" 42 ", "x").unwrap(), 42);
        let err = parse_micros("1.5", "price CORP-A").unwrap_err();
        assert!(err.to_string().contains("price CORP-A"));
    }

    #[test]
    fn build_inputs_anchors_relative_times_to_the_step() {
        let holdings = vec![HoldingSpec {
            asset_id: "RE-1".to_owned(),
            quantity: "10_000_000".to_owned(),
            asset_type: AssetTypeSpec::RealEstate,
            valuation_method: MethodSpec::ModelPrice,
            age_secs: 120,
        }];
        let prices = vec![PriceSpec {
            asset_id: "RE-1".to_owned(),
            price: "2_000_000".to_owned(),
            confidence: 80,
            source: "appraiser".to_owned(),
            age_secs: 600,
        }];
        let liabilities = vec![LiabilitySpec {
            liability_id: "FEE-Q3".to_owned(),
            amount: "1_000_000".to_owned(),
            liability_type: LiabilityTypeSpec::FeePayable,
            due_in_secs: 86_400,
            interest_rate_bps: 0,
        }];
        let at = 1_700_000_000;
        let inputs = build_nav_inputs(at, &holdings, &prices, &liabilities, &[]).unwrap();
        assert_eq!(inputs.holdings[0].last_updated, at - 120);
        assert_eq!(inputs.prices[0].timestamp, at - 600);
        assert_eq!(inputs.liabilities[0].maturity, at + 86_400);
    }

    #[test]
    fn proof_hash_must_be_32_bytes_of_hex() {
        let short = ProofSpec {
            proof_type: "aml".to_owned(),
            issuer: "reg-x".to_owned(),
            hash_hex: "abcd".to_owned(),
            valid_for_secs: 3_600,
        };
        let err = build_nav_inputs(0, &[], &[], &[], &[short]).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));

        let good = ProofSpec {
            proof_type: "aml".to_owned(),
            issuer: "reg-x".to_owned(),
            hash_hex: "11".repeat(32),
            valid_for_secs: 3_600,
        };
        let inputs = build_nav_inputs(100, &[], &[], &[], &[good]).unwrap();
        assert_eq!(inputs.compliance_proofs[0].hash, [0x11u8; 32]);
        assert_eq!(inputs.compliance_proofs[0].expiry, 3_700);
    }
}
