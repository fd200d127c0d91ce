use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::{info, instrument, warn};

use crate::entities::setting::{self, Entity as SettingEntity};
use crate::errors::ServiceError;

const COMMISSION_KEY: &str = "commission";

/// Marketplace settings collaborator. Values are read fresh on every call so
/// a commission change is visible to the next request without restarts, and
/// is never implicitly cached across requests.
#[derive(Clone)]
pub struct SettingsService {
    db: Arc<DatabaseConnection>,
    default_commission: Decimal,
}

impl SettingsService {
    pub fn new(db: Arc<DatabaseConnection>, default_commission: Decimal) -> Self {
        Self {
            db,
            default_commission,
        }
    }

    /// Current commission percentage. Falls back to the configured default
    /// when the row is missing or unparseable.
    #[instrument(skip(self))]
    pub async fn commission_percent(&self) -> Result<Decimal, ServiceError> {
        let row = SettingEntity::find_by_id(COMMISSION_KEY).one(&*self.db).await?;

        match row {
            Some(setting) => match Decimal::from_str(&setting.value) {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(value = %setting.value, "stored commission is not a number, using default");
                    Ok(self.default_commission)
                }
            },
            None => Ok(self.default_commission),
        }
    }

    /// Update the commission percentage. Applies only to orders created after
    /// the write; existing orders keep their totals.
    #[instrument(skip(self))]
    pub async fn set_commission_percent(&self, percent: Decimal) -> Result<Decimal, ServiceError> {
        if percent < Decimal::ZERO || percent > dec!(100) {
            return Err(ServiceError::invalid_field(
                "commission",
                "commission percentage must be between 0 and 100",
            ));
        }

        let now = Utc::now();
        let existing = SettingEntity::find_by_id(COMMISSION_KEY).one(&*self.db).await?;

        match existing {
            Some(row) => {
                let mut active: setting::ActiveModel = row.into();
                active.value = Set(percent.to_string());
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
            }
            None => {
                setting::ActiveModel {
                    key: Set(COMMISSION_KEY.to_string()),
                    value: Set(percent.to_string()),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
            }
        }

        info!(%percent, "commission percentage updated");
        Ok(percent)
    }
}
