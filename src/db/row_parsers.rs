use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::errors::AppError;
use crate::models::membership::{MembershipRow, ResourceKey};
use crate::models::rule::{RolePermissionRule, RuleOrigin};
use crate::models::scope::{ApplicationInfo, ScopeInfo, ScopeKind, ScopeRef};

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // Try RFC3339 first (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date.and_hms_opt(0, 0, 0).ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn get_id(row: &SqliteRow, column: &str) -> Result<u64, AppError> {
    let raw: i64 = row.try_get(column).map_err(|e| AppError::internal(format!("missing {}: {}", column, e)))?;
    u64::try_from(raw).map_err(|_| AppError::internal(format!("negative {}: {}", column, raw)))
}

fn get_text(row: &SqliteRow, column: &str) -> Result<String, AppError> {
    row.try_get(column).map_err(|e| AppError::internal(format!("missing {}: {}", column, e)))
}

pub fn membership_from_row(row: &SqliteRow) -> Result<MembershipRow, AppError> {
    let user_id = get_text(row, "user_id")?;
    let scope_kind: ScopeKind = get_text(row, "scope_type")?
        .parse()
        .map_err(|e: AppError| AppError::internal(format!("invalid scope_type: {}", e)))?;
    let scope_id = get_id(row, "scope_id")?;
    let parent_id = get_id(row, "parent_id")?;
    let resource_key: ResourceKey = get_text(row, "resource_key")?.parse()?;
    let resource_value = get_text(row, "resource_value")?;

    Ok(MembershipRow {
        user_id,
        scope: ScopeRef::new(scope_kind, scope_id),
        parent_id,
        resource_key,
        resource_value,
    })
}

pub fn rule_from_row(row: &SqliteRow) -> Result<RolePermissionRule, AppError> {
    let scope: ScopeKind = get_text(row, "scope")?
        .parse()
        .map_err(|e: AppError| AppError::internal(format!("invalid rule scope: {}", e)))?;
    let created_at_s: Option<String> = row.try_get("created_at").map_err(|e| AppError::internal(format!("missing created_at: {}", e)))?;

    Ok(RolePermissionRule {
        scope,
        role: get_text(row, "role")?,
        resource_role: get_text(row, "resource_role")?,
        resource: get_text(row, "resource")?,
        action: get_text(row, "action")?,
        creator: get_text(row, "creator")?,
        origin: RuleOrigin::Database,
        created_at: parse_opt_datetime(created_at_s)?,
    })
}

/// Expects `is_public` and `parent_id` columns; the caller aliases the parent column.
pub fn scope_info_from_row(row: &SqliteRow) -> Result<ScopeInfo, AppError> {
    let is_public: i64 = row.try_get("is_public").map_err(|e| AppError::internal(format!("missing is_public: {}", e)))?;
    Ok(ScopeInfo {
        is_public: is_public != 0,
        parent_id: get_id(row, "parent_id")?,
    })
}

pub fn application_from_row(row: &SqliteRow) -> Result<ApplicationInfo, AppError> {
    Ok(ApplicationInfo {
        id: get_id(row, "id")?,
        project_id: get_id(row, "project_id")?,
        mode: get_text(row, "mode")?,
    })
}
