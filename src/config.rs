use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the affiliate commission amount is determined for an order.
///
/// `UseExternalReferralAmount` takes the pre-computed amount attached to the
/// referral by the affiliate platform. `PercentageAfterMarketplace` computes
/// a percentage of the order total minus the order-level marketplace
/// commission. The two bases are not equivalent and both are kept as
/// configured alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateCommissionMode {
    UseExternalReferralAmount,
    PercentageAfterMarketplace,
}

impl AffiliateCommissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliateCommissionMode::UseExternalReferralAmount => "use_external_referral_amount",
            AffiliateCommissionMode::PercentageAfterMarketplace => "percentage_after_marketplace",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "percentage_after_marketplace" => AffiliateCommissionMode::PercentageAfterMarketplace,
            _ => AffiliateCommissionMode::UseExternalReferralAmount,
        }
    }
}

/// One entry of the manually configured static split, used as the fallback
/// when the dynamic calculation refuses an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualSplitEntry {
    pub wallet_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fixed_value: Decimal,
}

/// Commission configuration snapshot. Owned by the configuration store;
/// read-only to the engine.
#[derive(Debug, Clone)]
pub struct SplitSettings {
    pub dynamic_split_enabled: bool,
    pub marketplace_wallet_id: String,
    pub marketplace_commission_pct: Decimal,
    pub affiliate_commission_mode: AffiliateCommissionMode,
    pub default_affiliate_commission_pct: Decimal,
    pub manual_split: Vec<ManualSplitEntry>,
}

impl SplitSettings {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let manual_split = match std::env::var("SPLIT_MANUAL_WALLETS") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                config::ConfigError::Message(format!("invalid SPLIT_MANUAL_WALLETS: {}", e))
            })?,
            _ => Vec::new(),
        };

        Ok(Self {
            dynamic_split_enabled: std::env::var("DYNAMIC_SPLIT_ENABLED")
                .map(|v| v == "yes" || v == "true" || v == "1")
                .unwrap_or(false),
            marketplace_wallet_id: std::env::var("MARKETPLACE_WALLET_ID").unwrap_or_default(),
            marketplace_commission_pct: parse_pct_env("MARKETPLACE_COMMISSION_PCT")?,
            affiliate_commission_mode: AffiliateCommissionMode::parse(
                &std::env::var("AFFILIATE_COMMISSION_MODE").unwrap_or_default(),
            ),
            default_affiliate_commission_pct: parse_pct_env("DEFAULT_AFFILIATE_COMMISSION_PCT")?,
            manual_split,
        })
    }

    /// Enabled and carrying a marketplace wallet to receive commissions.
    pub fn is_configured(&self) -> bool {
        self.dynamic_split_enabled && !self.marketplace_wallet_id.trim().is_empty()
    }
}

fn parse_pct_env(key: &str) -> Result<Decimal, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let pct = Decimal::from_str(raw.trim()).map_err(|e| {
                config::ConfigError::Message(format!("invalid {}: {}", key, e))
            })?;
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(config::ConfigError::Message(format!(
                    "{} must be between 0 and 100, got {}",
                    key, pct
                )));
            }
            Ok(pct)
        }
        Err(_) => Ok(Decimal::ZERO),
    }
}

/// External configuration store boundary. Implementations read the current
/// settings snapshot; the engine never caches across orders.
pub trait ConfigStore: Send + Sync {
    fn split_settings(&self) -> SplitSettings;
}

/// Configuration store backed by process environment variables.
pub struct EnvConfigStore;

impl ConfigStore for EnvConfigStore {
    fn split_settings(&self) -> SplitSettings {
        dotenv::dotenv().ok();
        SplitSettings::from_env().unwrap_or_else(|e| {
            tracing::warn!("Split settings unreadable, dynamic split disabled: {}", e);
            SplitSettings {
                dynamic_split_enabled: false,
                marketplace_wallet_id: String::new(),
                marketplace_commission_pct: Decimal::ZERO,
                affiliate_commission_mode: AffiliateCommissionMode::UseExternalReferralAmount,
                default_affiliate_commission_pct: Decimal::ZERO,
                manual_split: Vec::new(),
            }
        })
    }
}

/// Fixed settings snapshot, for embedding and tests.
pub struct StaticConfigStore {
    settings: SplitSettings,
}

impl StaticConfigStore {
    pub fn new(settings: SplitSettings) -> Self {
        Self { settings }
    }
}

impl ConfigStore for StaticConfigStore {
    fn split_settings(&self) -> SplitSettings {
        self.settings.clone()
    }
}
