//! Plan catalog and downgrade constraint resolution.
//!
//! Plans are a fixed catalog, not user data. A plan change is only
//! constraint-checked when it is a downgrade by ordinal level; upgrades and
//! lateral changes commit directly. Blocking violations must be resolved
//! (delete the excess, or accept a 30-day grace period) before a downgrade
//! may commit; warning violations are surfaced but never block.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days a blocking violation is tolerated after a grace-period downgrade.
pub const GRACE_PERIOD_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),
    /// The catalog is static and system-controlled; a malformed storage
    /// string is a programming defect, not a runtime condition.
    #[error("Invalid storage limit in plan catalog: {0}")]
    StorageLimitParse(String),
    #[error("Plan change rejected: blocking constraint violations are unresolved")]
    PlanChangeRejected,
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Predefined subscription plan. Monthly and yearly prices are independent
/// catalog values; no conversion rule relates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub monthly_price: f64,
    pub yearly_price: f64,
    pub image_limit: i64,
    /// Human-readable limit ("200MB", "2GB"); parse with
    /// [`parse_storage_limit`] before comparing.
    pub storage_limit: String,
    pub password_protection: bool,
    /// Ordinal rank for upgrade/downgrade comparison.
    pub level: u8,
    pub recommended: bool,
}

/// The static plan catalog: Free, Lite, Standard.
pub fn catalog() -> Vec<Plan> {
    vec![
        Plan {
            id: "free".to_string(),
            name: "Free".to_string(),
            monthly_price: 0.0,
            yearly_price: 0.0,
            image_limit: 20,
            storage_limit: "200MB".to_string(),
            password_protection: false,
            level: 0,
            recommended: false,
        },
        Plan {
            id: "lite".to_string(),
            name: "Lite".to_string(),
            monthly_price: 1.99,
            yearly_price: 19.99,
            image_limit: 100,
            storage_limit: "1GB".to_string(),
            password_protection: false,
            level: 1,
            recommended: false,
        },
        Plan {
            id: "standard".to_string(),
            name: "Standard".to_string(),
            monthly_price: 3.99,
            yearly_price: 39.99,
            image_limit: 200,
            storage_limit: "2GB".to_string(),
            password_protection: true,
            level: 2,
            recommended: true,
        },
    ]
}

pub fn find_plan(id: &str) -> PlanResult<Plan> {
    catalog()
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| PlanError::UnknownPlan(id.to_string()))
}

/// Parse a catalog storage limit ("200MB", "2GB") to bytes. Base-1024
/// throughout: GB is 1024x the MB multiplier.
pub fn parse_storage_limit(limit: &str) -> PlanResult<i64> {
    let limit = limit.trim();
    let (number, multiplier) = if let Some(value) = limit.strip_suffix("GB") {
        (value, 1024i64 * 1024 * 1024)
    } else if let Some(value) = limit.strip_suffix("MB") {
        (value, 1024i64 * 1024)
    } else {
        return Err(PlanError::StorageLimitParse(limit.to_string()));
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| PlanError::StorageLimitParse(limit.to_string()))?;
    if value < 0.0 {
        return Err(PlanError::StorageLimitParse(limit.to_string()));
    }
    Ok((value * multiplier as f64) as i64)
}

/// Read-only usage metrics, computed by the store from live data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub image_count: i64,
    pub storage_used_bytes: i64,
    pub protected_share_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Images,
    Storage,
    Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Must be resolved or explicitly deferred before commit.
    Blocking,
    /// Surfaced and acknowledged, never blocks commit.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    DeleteExcessImages,
    DisableProtectedShares,
    AcceptGracePeriod,
}

/// One usage dimension that would exceed the target plan's limits.
/// Computed fresh on every plan-change attempt, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintViolation {
    pub dimension: Dimension,
    pub severity: Severity,
    pub current: i64,
    pub limit: i64,
    pub excess: i64,
    pub resolution_options: Vec<ResolutionStrategy>,
}

/// The user's selected mitigations, from the constraint dialog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolutionChoice {
    #[serde(default)]
    pub delete_excess_images: bool,
    #[serde(default)]
    pub disable_protected_shares: bool,
    #[serde(default)]
    pub accept_grace_period: bool,
}

/// Detect which usage dimensions would violate the target plan's limits.
///
/// Only downgrades are evaluated: when `target.level >= current.level` the
/// result is always empty, regardless of usage.
pub fn evaluate(
    current: &Plan,
    target: &Plan,
    usage: &UsageSnapshot,
) -> PlanResult<Vec<ConstraintViolation>> {
    if target.level >= current.level {
        return Ok(Vec::new());
    }

    let mut violations = Vec::new();

    if usage.image_count > target.image_limit {
        violations.push(ConstraintViolation {
            dimension: Dimension::Images,
            severity: Severity::Blocking,
            current: usage.image_count,
            limit: target.image_limit,
            excess: usage.image_count - target.image_limit,
            resolution_options: vec![
                ResolutionStrategy::DeleteExcessImages,
                ResolutionStrategy::AcceptGracePeriod,
            ],
        });
    }

    let storage_limit = parse_storage_limit(&target.storage_limit)?;
    if usage.storage_used_bytes > storage_limit {
        violations.push(ConstraintViolation {
            dimension: Dimension::Storage,
            severity: Severity::Blocking,
            current: usage.storage_used_bytes,
            limit: storage_limit,
            excess: usage.storage_used_bytes - storage_limit,
            resolution_options: vec![
                ResolutionStrategy::DeleteExcessImages,
                ResolutionStrategy::AcceptGracePeriod,
            ],
        });
    }

    if current.password_protection
        && !target.password_protection
        && usage.protected_share_count > 0
    {
        violations.push(ConstraintViolation {
            dimension: Dimension::Features,
            severity: Severity::Warning,
            current: usage.protected_share_count,
            limit: 0,
            excess: usage.protected_share_count,
            resolution_options: vec![ResolutionStrategy::DisableProtectedShares],
        });
    }

    Ok(violations)
}

pub fn has_blocking(violations: &[ConstraintViolation]) -> bool {
    violations.iter().any(|v| v.severity == Severity::Blocking)
}

/// Gate for committing a plan change. Blocking violations require either
/// deleting the excess or accepting the grace period; warnings never block.
pub fn can_commit(violations: &[ConstraintViolation], choice: &ResolutionChoice) -> bool {
    if !has_blocking(violations) {
        return true;
    }
    choice.delete_excess_images || choice.accept_grace_period
}
