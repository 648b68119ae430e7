pub mod permission;
pub mod permission_request;
pub mod role;
pub mod role_assignment;
pub mod staff;
pub mod temporary_permission;

pub use permission::{EffectivePermissions, PermissionSources};
pub use permission_request::{
    next_request_status, ApproverResponse, ApproverStatus, ApproverVote, PermissionApprover,
    PermissionRequest, PermissionRequestResponse, RequestStatus, Urgency,
};
pub use role::{Role, RoleResponse};
pub use role_assignment::{
    AssignmentDetail, AssignmentResponse, AssignmentScope, Lifecycle, StaffRoleAssignment,
};
pub use staff::{StaffMember, User};
pub use temporary_permission::{
    AuditAction, AuditEntryResponse, PermissionAuditEntry, TemporaryPermission,
    TemporaryPermissionResponse,
};
