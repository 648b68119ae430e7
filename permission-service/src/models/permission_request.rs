//! Permission request model - requests for a temporary permission that need
//! sign-off from designated approvers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Request status. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" => Ok(RequestStatus::Cancelled),
            "expired" => Ok(RequestStatus::Expired),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
            Urgency::Urgent => "urgent",
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            "urgent" => Ok(Urgency::Urgent),
            other => Err(format!("unknown urgency '{}'", other)),
        }
    }
}

/// Decision of a single approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApproverStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApproverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverStatus::Pending => "pending",
            ApproverStatus::Approved => "approved",
            ApproverStatus::Rejected => "rejected",
        }
    }

    /// Apply a vote. Only a pending approver may vote, and only once.
    pub fn cast(self, vote: ApproverStatus) -> Result<ApproverStatus, String> {
        match (self, vote) {
            (_, ApproverStatus::Pending) => Err("a vote must approve or reject".to_string()),
            (ApproverStatus::Pending, decided) => Ok(decided),
            (current, _) => Err(format!("approver has already {}", current.as_str())),
        }
    }
}

impl FromStr for ApproverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ApproverStatus::Pending),
            "approved" => Ok(ApproverStatus::Approved),
            "rejected" => Ok(ApproverStatus::Rejected),
            other => Err(format!("unknown approver status '{}'", other)),
        }
    }
}

/// The pieces of an approver row that drive aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproverVote {
    pub status: ApproverStatus,
    pub required: bool,
}

/// Aggregate transition function for a request.
///
/// Terminal states never move. Any rejection rejects the request. Otherwise
/// the request is approved once every required approver has approved; with no
/// required approvers, a single approval suffices.
pub fn next_request_status(current: RequestStatus, votes: &[ApproverVote]) -> RequestStatus {
    if current.is_terminal() {
        return current;
    }

    if votes.iter().any(|v| v.status == ApproverStatus::Rejected) {
        return RequestStatus::Rejected;
    }

    let mut required = votes.iter().filter(|v| v.required).peekable();
    let approved = if required.peek().is_some() {
        required.all(|v| v.status == ApproverStatus::Approved)
    } else {
        votes.iter().any(|v| v.status == ApproverStatus::Approved)
    };

    if approved {
        RequestStatus::Approved
    } else {
        RequestStatus::Pending
    }
}

/// Permission request entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionRequest {
    pub request_id: Uuid,
    pub requester_id: Uuid,
    pub permission: String,
    pub reason: String,
    pub urgency_code: String,
    pub status_code: String,
    pub requested_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub decided_utc: Option<DateTime<Utc>>,
    pub granted_temp_permission_id: Option<Uuid>,
    pub updated_utc: DateTime<Utc>,
}

impl PermissionRequest {
    pub fn new(
        requester_id: Uuid,
        permission: String,
        reason: String,
        urgency: Urgency,
        expires_utc: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4(),
            requester_id,
            permission,
            reason,
            urgency_code: urgency.as_str().to_string(),
            status_code: RequestStatus::Pending.as_str().to_string(),
            requested_utc: now,
            expires_utc,
            decided_utc: None,
            granted_temp_permission_id: None,
            updated_utc: now,
        }
    }

    /// Unknown codes read as `Expired` so a corrupt row can never be approved.
    pub fn status(&self) -> RequestStatus {
        self.status_code.parse().unwrap_or(RequestStatus::Expired)
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency_code.parse().unwrap_or_default()
    }

    pub fn is_past_expiry_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_utc.is_some_and(|exp| exp <= now)
    }
}

/// Approver entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionApprover {
    pub approver_id: Uuid,
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub role_code: String,
    pub status_code: String,
    pub is_required: bool,
    pub comments: Option<String>,
    pub decided_utc: Option<DateTime<Utc>>,
    pub position: i32,
}

impl PermissionApprover {
    pub fn new(request_id: Uuid, user_id: Uuid, position: i32) -> Self {
        Self {
            approver_id: Uuid::new_v4(),
            request_id,
            user_id,
            role_code: "APPROVER".to_string(),
            status_code: ApproverStatus::Pending.as_str().to_string(),
            is_required: true,
            comments: None,
            decided_utc: None,
            position,
        }
    }

    pub fn status(&self) -> ApproverStatus {
        self.status_code.parse().unwrap_or(ApproverStatus::Pending)
    }

    pub fn vote(&self) -> ApproverVote {
        ApproverVote {
            status: self.status(),
            required: self.is_required,
        }
    }
}

/// Approver response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApproverResponse {
    pub approver_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: ApproverStatus,
    pub required: bool,
    pub comments: Option<String>,
    pub decided_utc: Option<DateTime<Utc>>,
}

impl From<PermissionApprover> for ApproverResponse {
    fn from(a: PermissionApprover) -> Self {
        Self {
            status: a.status(),
            approver_id: a.approver_id,
            user_id: a.user_id,
            role: a.role_code,
            required: a.is_required,
            comments: a.comments,
            decided_utc: a.decided_utc,
        }
    }
}

/// Request with its ordered approvers.
#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionRequestResponse {
    pub request_id: Uuid,
    pub requester_id: Uuid,
    pub permission: String,
    pub reason: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub requested_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub decided_utc: Option<DateTime<Utc>>,
    pub granted_temp_permission_id: Option<Uuid>,
    pub approvers: Vec<ApproverResponse>,
}

impl PermissionRequestResponse {
    pub fn new(request: PermissionRequest, approvers: Vec<PermissionApprover>) -> Self {
        Self {
            urgency: request.urgency(),
            status: request.status(),
            request_id: request.request_id,
            requester_id: request.requester_id,
            permission: request.permission,
            reason: request.reason,
            requested_utc: request.requested_utc,
            expires_utc: request.expires_utc,
            decided_utc: request.decided_utc,
            granted_temp_permission_id: request.granted_temp_permission_id,
            approvers: approvers.into_iter().map(ApproverResponse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(status: ApproverStatus) -> ApproverVote {
        ApproverVote {
            status,
            required: true,
        }
    }

    #[test]
    fn first_of_two_approvals_keeps_pending() {
        let votes = [vote(ApproverStatus::Approved), vote(ApproverStatus::Pending)];
        assert_eq!(
            next_request_status(RequestStatus::Pending, &votes),
            RequestStatus::Pending
        );
    }

    #[test]
    fn all_required_approvals_approve() {
        let votes = [vote(ApproverStatus::Approved), vote(ApproverStatus::Approved)];
        assert_eq!(
            next_request_status(RequestStatus::Pending, &votes),
            RequestStatus::Approved
        );
    }

    #[test]
    fn any_rejection_rejects_regardless_of_other_votes() {
        let votes = [vote(ApproverStatus::Approved), vote(ApproverStatus::Rejected)];
        assert_eq!(
            next_request_status(RequestStatus::Pending, &votes),
            RequestStatus::Rejected
        );

        let optional_reject = [
            vote(ApproverStatus::Approved),
            ApproverVote {
                status: ApproverStatus::Rejected,
                required: false,
            },
        ];
        assert_eq!(
            next_request_status(RequestStatus::Pending, &optional_reject),
            RequestStatus::Rejected
        );
    }

    #[test]
    fn terminal_states_are_sticky() {
        let votes = [vote(ApproverStatus::Approved)];
        for status in [
            RequestStatus::Cancelled,
            RequestStatus::Expired,
            RequestStatus::Rejected,
        ] {
            assert_eq!(next_request_status(status, &votes), status);
        }
    }

    #[test]
    fn optional_only_needs_one_approval() {
        let votes = [
            ApproverVote {
                status: ApproverStatus::Pending,
                required: false,
            },
            ApproverVote {
                status: ApproverStatus::Approved,
                required: false,
            },
        ];
        assert_eq!(
            next_request_status(RequestStatus::Pending, &votes),
            RequestStatus::Approved
        );
        assert_eq!(
            next_request_status(RequestStatus::Pending, &[]),
            RequestStatus::Pending
        );
    }

    #[test]
    fn approver_cannot_vote_twice() {
        assert_eq!(
            ApproverStatus::Pending.cast(ApproverStatus::Approved),
            Ok(ApproverStatus::Approved)
        );
        assert!(ApproverStatus::Approved.cast(ApproverStatus::Rejected).is_err());
        assert!(ApproverStatus::Pending.cast(ApproverStatus::Pending).is_err());
    }

    #[test]
    fn unknown_status_code_is_terminal() {
        let mut req = PermissionRequest::new(
            Uuid::new_v4(),
            "view_reports".to_string(),
            "audit".to_string(),
            Urgency::High,
            None,
        );
        assert_eq!(req.status(), RequestStatus::Pending);
        req.status_code = "garbled".to_string();
        assert!(req.status().is_terminal());
    }
}
