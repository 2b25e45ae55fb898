use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates. Contract rates are annual percentages (10 = 10%); internal
/// periodic rates are decimals.
pub type Rate = Decimal;

/// Currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    GBP,
    #[default]
    USD,
    EUR,
    CHF,
    JPY,
    CAD,
    AUD,
    HKD,
    SGD,
    INR,
    AED,
    Other(String),
}

/// Reporting basis for balances and journals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GaapStandard {
    #[default]
    #[serde(rename = "IFRS", alias = "ifrs", alias = "IFRS16")]
    Ifrs,
    #[serde(rename = "IndAS", alias = "ind_as", alias = "INDAS")]
    IndAs,
    #[serde(rename = "US-GAAP", alias = "us_gaap", alias = "USGAAP", alias = "ASC842")]
    UsGaap,
}

impl GaapStandard {
    /// Ind AS 116 follows the IFRS 16 single lessee model.
    pub fn is_ifrs_basis(self) -> bool {
        matches!(self, GaapStandard::Ifrs | GaapStandard::IndAs)
    }

    pub fn label(self) -> &'static str {
        match self {
            GaapStandard::Ifrs => "IFRS 16",
            GaapStandard::IndAs => "Ind AS 116",
            GaapStandard::UsGaap => "ASC 842",
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
