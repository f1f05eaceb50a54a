pub mod directory;
pub mod leave;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::scope::AccessScope,
    error::AppError,
    model::leave_request::{Decision, LeaveChanges, LeaveDraft, LeaveFilter, LeaveRequest},
};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Page number, starting at 1
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (max 100)
    #[param(example = 10)]
    pub per_page: Option<u64>,
}

impl Pagination {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Saturates instead of wrapping, so an absurd page number yields an
    /// empty page.
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeavePage {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: u64,
}

/// Persistence of leave requests.
///
/// Implementations own the overlap rule: a create or an interval-changing
/// update must fail with [`AppError::Overlap`] when the owner already has a
/// pending or approved request sharing a day with the candidate, and the
/// check must be atomic with the write.
#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, AppError>;

    /// Every request matching scope and filter, newest first.
    async fn list(&self, scope: &AccessScope, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError>;

    async fn list_page(
        &self,
        scope: &AccessScope,
        filter: &LeaveFilter,
        page: &Pagination,
    ) -> Result<LeavePage, AppError> {
        let all = self.list(scope, filter).await?;
        let total = all.len() as u64;
        let data = all
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page() as usize)
            .collect();

        Ok(LeavePage {
            data,
            page: page.page(),
            per_page: page.per_page(),
            total,
        })
    }

    async fn create(&self, owner_id: u64, draft: LeaveDraft, today: NaiveDate) -> Result<LeaveRequest, AppError>;

    /// Owner-only edit of a pending request.
    async fn update(
        &self,
        id: u64,
        caller_id: u64,
        changes: LeaveChanges,
        today: NaiveDate,
    ) -> Result<LeaveRequest, AppError>;

    /// Owner-only removal of a pending request.
    async fn delete(&self, id: u64, caller_id: u64) -> Result<(), AppError>;

    /// Moves a pending request to approved or rejected exactly once.
    /// Callers check [`can_approve`](crate::auth::scope::can_approve) first.
    async fn transition_status(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError>;
}
