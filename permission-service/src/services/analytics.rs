//! Informational analytics over roles, assignments and temporary grants.
//! Nothing here feeds access decisions.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db;
use crate::db::analytics::{DepartmentUsage, PermissionGrantCount, PermissionHolders, SystemTotals};
use crate::models::{TemporaryPermissionResponse, User};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::resolution::load_sources;
use crate::services::temporary_permission::expiry_horizon;

/// Keyword groups and their weights. A group counts once per permission.
const RISK_KEYWORDS: &[(&[&str], u32)] = &[
    (&["admin"], 50),
    (&["system"], 40),
    (&["delete"], 30),
    (&["grant"], 25),
    (&["manage"], 20),
    (&["approve"], 15),
    (&["write", "update", "edit"], 10),
];

const WIDE_HOLDER_THRESHOLD: i64 = 20;
const WIDE_HOLDER_BONUS: u32 = 10;
const MAX_RISK_SCORE: u32 = 100;

const UNDERUSED_BELOW: i64 = 2;
const OVERUSED_AT: i64 = 50;
const EXCESSIVE_TEMPORARY_AT: i64 = 5;
const TEMPORARY_LOOKBACK_DAYS: i64 = 30;
const DASHBOARD_TOP_RISKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 70 => RiskLevel::Critical,
            s if s >= 45 => RiskLevel::High,
            s if s >= 20 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionRisk {
    pub permission: String,
    pub score: u32,
    pub level: RiskLevel,
    pub holder_count: i64,
    pub matched_keywords: Vec<String>,
}

/// Heuristic risk of a permission name held by `holder_count` users.
pub fn assess_permission(permission: &str, holder_count: i64) -> PermissionRisk {
    let lowered = permission.to_lowercase();
    let mut score = 0;
    let mut matched_keywords = Vec::new();

    for (words, weight) in RISK_KEYWORDS {
        if let Some(word) = words.iter().find(|w| lowered.contains(*w)) {
            score += weight;
            matched_keywords.push((*word).to_string());
        }
    }
    if holder_count > WIDE_HOLDER_THRESHOLD {
        score += WIDE_HOLDER_BONUS;
    }
    let score = score.min(MAX_RISK_SCORE);

    PermissionRisk {
        permission: permission.to_string(),
        score,
        level: RiskLevel::from_score(score),
        holder_count,
        matched_keywords,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Underused,
    Overused,
    ExcessivelyTemporary,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    pub permission: String,
    pub metric: i64,
    pub recommendation: String,
}

/// Fixed-threshold suggestions over holder counts and recent temporary grants.
pub fn build_suggestions(
    role_defined: &[String],
    holders: &[PermissionHolders],
    recent_temporary: &[PermissionGrantCount],
) -> Vec<OptimizationSuggestion> {
    let holder_map: HashMap<&str, i64> = holders
        .iter()
        .map(|h| (h.permission.as_str(), h.holder_count))
        .collect();

    let mut suggestions = Vec::new();

    for permission in role_defined {
        let count = holder_map.get(permission.as_str()).copied().unwrap_or(0);
        if count < UNDERUSED_BELOW {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::Underused,
                permission: permission.clone(),
                metric: count,
                recommendation: format!(
                    "Held by {} user(s); consider removing it from roles that never use it",
                    count
                ),
            });
        }
    }

    for holder in holders {
        if holder.holder_count < OVERUSED_AT {
            continue;
        }
        let risk = assess_permission(&holder.permission, holder.holder_count);
        if risk.level >= RiskLevel::High {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::Overused,
                permission: holder.permission.clone(),
                metric: holder.holder_count,
                recommendation: format!(
                    "{}-risk permission held by {} users; narrow the roles that carry it",
                    risk.level.as_str(),
                    holder.holder_count
                ),
            });
        }
    }

    for grant in recent_temporary {
        if grant.grant_count >= EXCESSIVE_TEMPORARY_AT {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::ExcessivelyTemporary,
                permission: grant.permission.clone(),
                metric: grant.grant_count,
                recommendation: format!(
                    "Granted temporarily {} times in {} days; consider a role that includes it",
                    grant.grant_count, TEMPORARY_LOOKBACK_DAYS
                ),
            });
        }
    }

    suggestions
}

/// Risk of every held permission, highest first.
pub fn rank_risks(holders: &[PermissionHolders]) -> Vec<PermissionRisk> {
    let mut risks: Vec<PermissionRisk> = holders
        .iter()
        .map(|h| assess_permission(&h.permission, h.holder_count))
        .collect();
    risks.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.permission.cmp(&b.permission)));
    risks
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserPermissionAnalytics {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub effective_permissions: Vec<String>,
    pub role_permissions: Vec<String>,
    pub direct_permissions: Vec<String>,
    pub temporary_permissions: Vec<String>,
    pub active_assignments: i64,
    pub temporary_grants_total: i64,
    pub pending_requests: i64,
    pub highest_risk: Option<PermissionRisk>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionUsage {
    pub permission: String,
    pub holder_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemUsage {
    pub totals: SystemTotals,
    pub permissions: Vec<PermissionUsage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub totals: SystemTotals,
    pub top_risks: Vec<PermissionRisk>,
    pub suggestions: Vec<OptimizationSuggestion>,
    pub pending_requests: i64,
    pub expiring_soon: Vec<TemporaryPermissionResponse>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    pool: PgPool,
    expiring_soon_hours: i64,
}

impl AnalyticsService {
    pub fn new(pool: PgPool, expiring_soon_hours: i64) -> Self {
        Self {
            pool,
            expiring_soon_hours,
        }
    }

    pub async fn user_analytics(&self, user_id: Uuid) -> ServiceResult<UserPermissionAnalytics> {
        let mut conn = self.pool.acquire().await?;
        let user: User = db::users::find_user(&mut *conn, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        let sources = load_sources(&mut conn, user_id).await?;
        let effective = sources.effective();
        let active_assignments = db::assignments::count_active_for_user(&mut *conn, user_id).await?;
        let temporary_grants_total = db::temporary_permissions::count_for_user(&mut *conn, user_id).await?;
        let pending_requests = db::requests::count_pending(&mut *conn, Some(user_id)).await?;

        let highest_risk = effective
            .to_vec()
            .iter()
            .map(|p| assess_permission(p, 1))
            .max_by_key(|r| r.score);

        Ok(UserPermissionAnalytics {
            user_id,
            email: user.email,
            is_admin: effective.is_admin(),
            effective_permissions: effective.to_vec(),
            role_permissions: sources.role.into_iter().collect(),
            direct_permissions: sources.direct.into_iter().collect(),
            temporary_permissions: sources.temporary.into_iter().collect(),
            active_assignments,
            temporary_grants_total,
            pending_requests,
            highest_risk,
        })
    }

    pub async fn system_usage(&self) -> ServiceResult<SystemUsage> {
        let totals = db::analytics::system_totals(&self.pool).await?;
        let holders = db::analytics::permission_holders(&self.pool).await?;
        Ok(SystemUsage {
            totals,
            permissions: holders
                .into_iter()
                .map(|h| PermissionUsage {
                    permission: h.permission,
                    holder_count: h.holder_count,
                })
                .collect(),
        })
    }

    pub async fn department_distribution(&self) -> ServiceResult<Vec<DepartmentUsage>> {
        Ok(db::analytics::department_usage(&self.pool).await?)
    }

    pub async fn risk_assessment(&self) -> ServiceResult<Vec<PermissionRisk>> {
        let holders = db::analytics::permission_holders(&self.pool).await?;
        Ok(rank_risks(&holders))
    }

    pub async fn optimization_suggestions(&self) -> ServiceResult<Vec<OptimizationSuggestion>> {
        let role_defined = db::analytics::role_defined_permissions(&self.pool).await?;
        let holders = db::analytics::permission_holders(&self.pool).await?;
        let since = Utc::now() - Duration::days(TEMPORARY_LOOKBACK_DAYS);
        let recent = db::analytics::temporary_grant_counts(&self.pool, since).await?;
        Ok(build_suggestions(&role_defined, &holders, &recent))
    }

    pub async fn dashboard(&self) -> ServiceResult<Dashboard> {
        let totals = db::analytics::system_totals(&self.pool).await?;
        let holders = db::analytics::permission_holders(&self.pool).await?;
        let mut top_risks = rank_risks(&holders);
        top_risks.truncate(DASHBOARD_TOP_RISKS);

        let suggestions = self.optimization_suggestions().await?;
        let until = expiry_horizon(Utc::now(), self.expiring_soon_hours)?;
        let expiring_soon = db::temporary_permissions::list_expiring(&self.pool, until)
            .await?
            .into_iter()
            .map(TemporaryPermissionResponse::from)
            .collect();

        Ok(Dashboard {
            pending_requests: totals.pending_requests,
            totals,
            top_risks,
            suggestions,
            expiring_soon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holders(rows: &[(&str, i64)]) -> Vec<PermissionHolders> {
        rows.iter()
            .map(|(p, c)| PermissionHolders {
                permission: p.to_string(),
                holder_count: *c,
            })
            .collect()
    }

    #[test]
    fn keyword_weights_add_up() {
        let risk = assess_permission("delete_patient", 1);
        assert_eq!(risk.score, 30);
        assert_eq!(risk.level, RiskLevel::Medium);

        let risk = assess_permission("manage_system_settings", 1);
        assert_eq!(risk.score, 60);
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn write_group_counts_once() {
        let risk = assess_permission("edit_update_notes", 1);
        assert_eq!(risk.score, 10);
        assert_eq!(risk.level, RiskLevel::Low);
    }

    #[test]
    fn wide_holding_adds_bonus_and_score_is_capped() {
        assert_eq!(assess_permission("view_reports", 21).score, 10);
        assert_eq!(assess_permission("view_reports", 20).score, 0);

        let risk = assess_permission("admin_system_delete_grant", 100);
        assert_eq!(risk.score, 100);
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(RiskLevel::from_score(70), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(69), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(45), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(44), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::Low);
    }

    #[test]
    fn underused_role_permissions_are_flagged() {
        let role_defined = vec!["view_reports".to_string(), "sign_discharge".to_string()];
        let held = holders(&[("view_reports", 12), ("sign_discharge", 1)]);
        let suggestions = build_suggestions(&role_defined, &held, &[]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::Underused);
        assert_eq!(suggestions[0].permission, "sign_discharge");
    }

    #[test]
    fn overused_requires_high_risk() {
        let held = holders(&[("view_reports", 80), ("manage_system", 50)]);
        let suggestions = build_suggestions(&[], &held, &[]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::Overused);
        assert_eq!(suggestions[0].permission, "manage_system");
    }

    #[test]
    fn frequent_temporary_grants_suggest_a_role() {
        let recent = vec![
            PermissionGrantCount {
                permission: "view_reports".to_string(),
                grant_count: 5,
            },
            PermissionGrantCount {
                permission: "edit_notes".to_string(),
                grant_count: 4,
            },
        ];
        let suggestions = build_suggestions(&[], &[], &recent);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::ExcessivelyTemporary);
        assert_eq!(suggestions[0].metric, 5);
    }

    #[test]
    fn risks_are_ranked_highest_first() {
        let held = holders(&[("view_reports", 1), ("admin", 1), ("delete_records", 1)]);
        let ranked = rank_risks(&held);
        let order: Vec<_> = ranked.iter().map(|r| r.permission.as_str()).collect();
        assert_eq!(order, vec!["admin", "delete_records", "view_reports"]);
    }
}
