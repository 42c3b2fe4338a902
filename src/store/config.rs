//! Store configuration, persisted in the store index.

use serde::{Deserialize, Serialize};

use crate::geometry::DEFAULT_EPS;
use crate::mesh_error::MeshFieldError;
use crate::units::Unit;

/// Retention policy of the in-process `time -> Field` cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Keep every materialized field until [`clear_cache`] is called.
    ///
    /// [`clear_cache`]: crate::store::TemporalField::clear_cache
    #[default]
    Unbounded,
    /// Keep at most `max_entries` fields, evicting the oldest insertion first.
    Bounded { max_entries: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub cache_policy: CachePolicy,
    /// Relative tolerance used by `TemporalField::evaluate` when none is given.
    pub default_eps: f64,
    /// Time unit written to XDMF collections.
    pub time_unit: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::Unbounded,
            default_eps: DEFAULT_EPS,
            time_unit: "s".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn with_default_eps(mut self, eps: f64) -> Self {
        self.default_eps = eps;
        self
    }

    pub fn with_time_unit(mut self, unit: impl Into<String>) -> Self {
        self.time_unit = unit.into();
        self
    }

    /// Reject settings the store cannot honor.
    pub fn validate(&self) -> Result<(), MeshFieldError> {
        if !(self.default_eps.is_finite() && self.default_eps >= 0.0) {
            return Err(MeshFieldError::Config(format!(
                "default_eps must be finite and non-negative, got {}",
                self.default_eps
            )));
        }
        if let CachePolicy::Bounded { max_entries: 0 } = self.cache_policy {
            return Err(MeshFieldError::Config(
                "bounded cache needs max_entries > 0".into(),
            ));
        }
        let unit = Unit::parse(&self.time_unit)?;
        if !unit.is_time() {
            return Err(MeshFieldError::IncompatibleUnits {
                from: self.time_unit.clone(),
                to: "s".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn time_unit(&self) -> Result<Unit, MeshFieldError> {
        Unit::parse(&self.time_unit)
    }
}
