use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── Network ─────────────────────────────────────────────────────────

/// Networks a subscription payment can be made on. All of them settle in ETH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Ethereum,
    Optimism,
    Arbitrum,
    Base,
    Sepolia,
}

impl Network {
    /// Canonical string, also the env var prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETHEREUM",
            Network::Optimism => "OPTIMISM",
            Network::Arbitrum => "ARBITRUM",
            Network::Base => "BASE",
            Network::Sepolia => "SEPOLIA",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Optimism => 10,
            Network::Arbitrum => 42161,
            Network::Base => 8453,
            Network::Sepolia => 11155111,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Network::all()
            .iter()
            .copied()
            .find(|n| n.chain_id() == chain_id)
    }

    pub fn native_symbol(&self) -> &'static str {
        "ETH"
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Optimism => "Optimism",
            Network::Arbitrum => "Arbitrum",
            Network::Base => "Base",
            Network::Sepolia => "Sepolia",
        }
    }

    /// Default block explorer URL.
    pub fn explorer_url(&self) -> &'static str {
        match self {
            Network::Ethereum => "https://etherscan.io",
            Network::Optimism => "https://optimistic.etherscan.io",
            Network::Arbitrum => "https://arbiscan.io",
            Network::Base => "https://basescan.org",
            Network::Sepolia => "https://sepolia.etherscan.io",
        }
    }

    pub fn all() -> &'static [Network] {
        &[Network::Ethereum, Network::Optimism, Network::Arbitrum, Network::Base, Network::Sepolia]
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ETHEREUM" | "ETH" | "MAINNET" => Ok(Network::Ethereum),
            "OPTIMISM" | "OP" => Ok(Network::Optimism),
            "ARBITRUM" | "ARB" => Ok(Network::Arbitrum),
            "BASE" => Ok(Network::Base),
            "SEPOLIA" => Ok(Network::Sepolia),
            _ =>
                Err(
                    AppError::InvalidInput(
                        format!("Unknown network: {}. Supported: ETHEREUM, OPTIMISM, ARBITRUM, BASE, SEPOLIA", s)
                    )
                ),
        }
    }
}

// ─── SubscriptionDuration ────────────────────────────────────────────

/// Length of access bought by a single payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionDuration {
    Month,
    Year,
}

impl SubscriptionDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionDuration::Month => "month",
            SubscriptionDuration::Year => "year",
        }
    }

    /// Calendar months added to the expiry.
    pub fn months(&self) -> u32 {
        match self {
            SubscriptionDuration::Month => 1,
            SubscriptionDuration::Year => 12,
        }
    }
}

impl fmt::Display for SubscriptionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionDuration {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" | "monthly" => Ok(SubscriptionDuration::Month),
            "year" | "yearly" => Ok(SubscriptionDuration::Year),
            _ =>
                Err(
                    AppError::InvalidInput(
                        format!("Invalid duration: {}. Supported: month, year", s)
                    )
                ),
        }
    }
}

// ─── TxStatus ────────────────────────────────────────────────────────

/// Lifecycle of a pending payment. Moves from `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(AppError::InvalidInput(format!("Invalid tx status: {}", s))),
        }
    }
}

// ─── RelativeRisk ────────────────────────────────────────────────────

/// Risk rating of an opportunity. Variant order is the sort ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelativeRisk {
    Low,
    Medium,
    High,
}

impl RelativeRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeRisk::Low => "Low",
            RelativeRisk::Medium => "Medium",
            RelativeRisk::High => "High",
        }
    }
}

impl fmt::Display for RelativeRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelativeRisk {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RelativeRisk::Low),
            "medium" => Ok(RelativeRisk::Medium),
            "high" => Ok(RelativeRisk::High),
            _ =>
                Err(
                    AppError::InvalidInput(
                        format!("Invalid relative risk: {}. Supported: Low, Medium, High", s)
                    )
                ),
        }
    }
}

// ─── Category ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Stablecoin,
    VolatileAsset,
    AdvancedStrategies,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stablecoin => "stablecoin",
            Category::VolatileAsset => "volatileAsset",
            Category::AdvancedStrategies => "advancedStrategies",
        }
    }

    pub fn all() -> &'static [Category] {
        &[Category::Stablecoin, Category::VolatileAsset, Category::AdvancedStrategies]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stablecoin" => Ok(Category::Stablecoin),
            "volatileAsset" => Ok(Category::VolatileAsset),
            "advancedStrategies" => Ok(Category::AdvancedStrategies),
            _ =>
                Err(
                    AppError::InvalidInput(
                        format!(
                            "Invalid category: {}. Supported: stablecoin, volatileAsset, advancedStrategies",
                            s
                        )
                    )
                ),
        }
    }
}

// ─── Tier ────────────────────────────────────────────────────────────

/// Access tier of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// No wallet connected
    Public,
    /// Wallet connected, not entitled
    Free,
    /// Entitled
    Paid,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Sorting ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "estimatedApy")]
    EstimatedApy,
    #[serde(rename = "tvl")]
    Tvl,
    #[serde(rename = "relativeRisk")]
    RelativeRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}
