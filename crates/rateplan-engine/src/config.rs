//! Configuration for the rateplan engine and binary

use crate::error::{LedgerError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rateplan_common::Amount;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "rateplan.toml";
const ENV_PREFIX: &str = "RATEPLAN_";

/// Upper bound for every day count in the configuration (a century).
pub const MAX_CONFIG_DAYS: i64 = 36_500;
const MAX_CONFIG_MINUTES: i64 = MAX_CONFIG_DAYS * 24 * 60;
/// Upper bound for a pass block price.
pub const MAX_BLOCK_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn invalid(message: &str) -> Result<()> {
    Err(LedgerError::Config {
        message: message.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when neither `-v/-q` nor `RUST_LOG` is given
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "rateplan=info,rateplan_engine=info".to_string(),
        }
    }
}

/// Size of the ranked owner listing in ledger reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportsConfig {
    pub top_owners: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self { top_owners: 10 }
    }
}

impl ReportsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_owners == 0 {
            return invalid("reports.top_owners must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursesConfig {
    /// Largest share of a course price a student bonus may cover
    pub max_bonus_share: Decimal,
    pub min_rating: u8,
    pub max_rating: u8,
    /// Length of the top rated listing
    pub top_rated: usize,
}

impl Default for CoursesConfig {
    fn default() -> Self {
        Self {
            max_bonus_share: dec!(0.5),
            min_rating: 1,
            max_rating: 5,
            top_rated: 10,
        }
    }
}

impl CoursesConfig {
    pub fn validate(&self) -> Result<()> {
        let share = self.max_bonus_share;
        if share < Decimal::ZERO || share > Decimal::ONE {
            return invalid("courses.max_bonus_share must be between 0 and 1");
        }
        if self.min_rating == 0 || self.min_rating > self.max_rating {
            return invalid("courses rating bounds must satisfy 1 <= min_rating <= max_rating");
        }
        if self.top_rated == 0 {
            return invalid("courses.top_rated must be positive");
        }
        Ok(())
    }
}

/// Fare table for bike-share passes. Every fare is
/// `(billable_minutes / block_minutes + 1) * block_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassTariffs {
    pub annual_validity_days: i64,
    pub annual_free_minutes: i64,
    pub annual_block_minutes: i64,
    pub annual_block_price: Amount,

    pub prepaid_minimum_balance: Amount,
    pub prepaid_block_minutes: i64,
    pub prepaid_block_price: Amount,

    pub tourist_validity_days: i64,
    pub tourist_free_minutes: i64,
    pub tourist_block_minutes: i64,
    pub tourist_block_price: Amount,
}

impl Default for PassTariffs {
    fn default() -> Self {
        Self {
            annual_validity_days: 365,
            annual_free_minutes: 30,
            annual_block_minutes: 5,
            annual_block_price: Amount::from(2u32),

            prepaid_minimum_balance: Amount::from(5u32),
            prepaid_block_minutes: 15,
            prepaid_block_price: Amount::from(5u32),

            tourist_validity_days: 7,
            tourist_free_minutes: 120,
            tourist_block_minutes: 15,
            tourist_block_price: Amount::from(10u32),
        }
    }
}

impl PassTariffs {
    pub fn validate(&self) -> Result<()> {
        let block_minutes = [
            self.annual_block_minutes,
            self.prepaid_block_minutes,
            self.tourist_block_minutes,
        ];
        if block_minutes.iter().any(|m| *m <= 0 || *m > MAX_CONFIG_MINUTES) {
            return invalid("passes block minutes must be positive and at most a century");
        }
        let free_minutes = [self.annual_free_minutes, self.tourist_free_minutes];
        if free_minutes.iter().any(|m| *m < 0 || *m > MAX_CONFIG_MINUTES) {
            return invalid("passes free minutes must be between 0 and a century");
        }
        let validity_days = [self.annual_validity_days, self.tourist_validity_days];
        if validity_days.iter().any(|d| *d < 0 || *d > MAX_CONFIG_DAYS) {
            return invalid("passes validity days must be between 0 and 36500");
        }
        let prices = [
            self.annual_block_price,
            self.prepaid_block_price,
            self.tourist_block_price,
            self.prepaid_minimum_balance,
        ];
        if prices
            .iter()
            .any(|p| p.as_decimal() < Decimal::ZERO || p.as_decimal() > MAX_BLOCK_PRICE)
        {
            return invalid("passes prices must be between 0 and 1000000000");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Cost added per kilometre travelled for mileage-based tasks
    pub mileage_rate: Decimal,
    /// Length of the costliest plans listing
    pub top_plans: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            mileage_rate: dec!(0.05),
            top_plans: 5,
        }
    }
}

impl MaintenanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mileage_rate < Decimal::ZERO {
            return invalid("maintenance.mileage_rate cannot be negative");
        }
        if self.top_plans == 0 {
            return invalid("maintenance.top_plans must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiddingConfig {
    pub min_score: u32,
    pub max_score: u32,
    /// Days a position bid counts per month
    pub days_per_month: i64,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            min_score: 1,
            max_score: 50,
            days_per_month: 30,
        }
    }
}

impl BiddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_score > self.max_score {
            return invalid("bidding.min_score cannot exceed bidding.max_score");
        }
        if self.days_per_month <= 0 || self.days_per_month > 31 {
            return invalid("bidding.days_per_month must be between 1 and 31");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KanbanConfig {
    /// Tasks closed within this many days before the sprint close are scored
    pub sprint_window_days: i64,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            sprint_window_days: 15,
        }
    }
}

impl KanbanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sprint_window_days <= 0 || self.sprint_window_days > MAX_CONFIG_DAYS {
            return invalid("kanban.sprint_window_days must be between 1 and 36500");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub courses: CoursesConfig,
    #[serde(default)]
    pub passes: PassTariffs,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub bidding: BiddingConfig,
    #[serde(default)]
    pub kanban: KanbanConfig,
}

impl EngineConfig {
    /// Load defaults, then `path` (or `rateplan.toml` in the working
    /// directory when present), then `RATEPLAN_*` environment variables.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

        match path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from an explicit file without consulting the environment.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::extract(
            Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::file(path)),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: EngineConfig = figment.extract().map_err(|e| LedgerError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn generate_example() -> Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(|e| LedgerError::Config {
            message: format!("Failed to serialize config: {e}"),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.reports.validate()?;
        self.courses.validate()?;
        self.passes.validate()?;
        self.maintenance.validate()?;
        self.bidding.validate()?;
        self.kanban.validate()
    }
}
