use crate::error::AppError;
use crate::models::{Plan, SupplierRating};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_SUPPLIER_RATING: f64 = 3.0;

/// A plan catalog as fetched at one point in time. Whoever refreshes the
/// catalog owns this value and hands it to the advisor; nothing here caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub suppliers: Vec<SupplierRating>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Plans(Vec<Plan>),
    #[serde(rename_all = "camelCase")]
    Document {
        plans: Vec<Plan>,
        #[serde(default)]
        suppliers: Vec<SupplierRating>,
        #[serde(default)]
        fetched_at: Option<DateTime<Utc>>,
    },
}

impl CatalogSnapshot {
    pub fn new(
        plans: Vec<Plan>,
        suppliers: Vec<SupplierRating>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            plans,
            suppliers,
            fetched_at,
        }
    }

    /// Read a catalog file (a bare plan array or a `{plans, suppliers, fetchedAt}`
    /// document). Without `fetchedAt` the file's modification time stands in.
    pub fn load(plans_path: &Path, suppliers_path: Option<&Path>) -> Result<Self, AppError> {
        let raw = fs::read_to_string(plans_path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;

        let (plans, mut suppliers, fetched_at) = match file {
            CatalogFile::Plans(plans) => (plans, Vec::new(), None),
            CatalogFile::Document {
                plans,
                suppliers,
                fetched_at,
            } => (plans, suppliers, fetched_at),
        };

        let fetched_at = match fetched_at {
            Some(at) => at,
            None => fs::metadata(plans_path)?.modified()?.into(),
        };

        if let Some(path) = suppliers_path {
            suppliers = serde_json::from_str(&fs::read_to_string(path)?)?;
        }

        debug!(
            plans = plans.len(),
            suppliers = suppliers.len(),
            %fetched_at,
            "loaded plan catalog"
        );

        Ok(Self::new(plans, suppliers, fetched_at))
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }

    pub fn supplier_rating(&self, supplier_id: &str) -> f64 {
        self.suppliers
            .iter()
            .find(|s| s.id == supplier_id)
            .map_or(DEFAULT_SUPPLIER_RATING, |s| s.rating.clamp(0.0, 5.0))
    }

    pub fn ensure_non_empty(&self) -> Result<(), AppError> {
        if self.plans.is_empty() {
            return Err(AppError::EmptyCatalog);
        }
        Ok(())
    }

    pub fn find_plan(&self, id: &str) -> Result<&Plan, AppError> {
        self.plans
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::UnknownPlan(id.to_string()))
    }
}
