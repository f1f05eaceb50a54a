//! In-process [`LeaveStore`] used by the unit and HTTP tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::{
    auth::scope::AccessScope,
    error::AppError,
    model::leave_request::{
        Decision, LeaveChanges, LeaveDraft, LeaveFilter, LeaveInterval, LeaveRequest, LeaveStatus,
        conflicting_intervals,
    },
    store::LeaveStore,
};

const NOT_FOUND: &str = "Leave request not found";

#[derive(Default)]
struct State {
    next_id: u64,
    requests: Vec<LeaveRequest>,
}

impl State {
    fn find_mut(&mut self, id: u64) -> Result<&mut LeaveRequest, AppError> {
        self.requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AppError::NotFound(NOT_FOUND))
    }

    fn blocking(&self, owner_id: u64) -> Vec<(u64, LeaveInterval)> {
        self.requests
            .iter()
            .filter(|r| r.user_id == owner_id && r.status.blocks_calendar())
            .map(|r| (r.id, r.interval()))
            .collect()
    }
}

/// Same predicate the MySQL store renders as SQL.
fn filter_matches(filter: &LeaveFilter, request: &LeaveRequest) -> bool {
    filter.status.is_none_or(|s| request.status == s)
        && filter.user_id.is_none_or(|u| request.user_id == u)
        && filter.from_date.is_none_or(|d| request.from_date >= d)
        && filter.to_date.is_none_or(|d| request.to_date <= d)
}

pub struct MemoryLeaveStore {
    /// user id -> (full name, department id)
    users: HashMap<u64, (String, u64)>,
    state: Mutex<State>,
}

impl MemoryLeaveStore {
    pub fn new(users: &[(u64, &str, u64)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|&(id, name, department)| (id, (name.to_string(), department)))
                .collect(),
            state: Mutex::new(State {
                next_id: 1,
                requests: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl LeaveStore for MemoryLeaveStore {
    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, scope: &AccessScope, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<LeaveRequest> = state
            .requests
            .iter()
            .filter(|r| scope.includes(r) && filter_matches(filter, r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }

    async fn create(&self, owner_id: u64, draft: LeaveDraft, today: NaiveDate) -> Result<LeaveRequest, AppError> {
        let leave = draft.validate(today)?;
        let (name, department_id) = self
            .users
            .get(&owner_id)
            .cloned()
            .ok_or(AppError::NotFound("User not found"))?;

        let mut state = self.state.lock().unwrap();
        let conflicts = conflicting_intervals(state.blocking(owner_id), &leave.interval, None);
        if !conflicts.is_empty() {
            return Err(AppError::Overlap(conflicts));
        }

        let id = state.next_id;
        state.next_id += 1;
        let now = Utc::now();
        let request = LeaveRequest {
            id,
            user_id: owner_id,
            requester_name: name,
            department_id,
            from_date: leave.interval.from(),
            to_date: leave.interval.to(),
            reason: leave.reason,
            status: LeaveStatus::Pending,
            approved_by: None,
            approver_name: None,
            leave_days: leave.interval.days(),
            created_at: now,
            updated_at: now,
        };
        state.requests.push(request.clone());
        Ok(request)
    }

    async fn update(
        &self,
        id: u64,
        caller_id: u64,
        changes: LeaveChanges,
        today: NaiveDate,
    ) -> Result<LeaveRequest, AppError> {
        let mut state = self.state.lock().unwrap();

        let current = state.find_mut(id)?.clone();
        current.ensure_owned_by(caller_id)?;
        current.ensure_pending()?;

        let applied = changes.apply_to(&current, today)?;
        if applied.interval_changed {
            let conflicts = conflicting_intervals(state.blocking(current.user_id), &applied.interval, Some(id));
            if !conflicts.is_empty() {
                return Err(AppError::Overlap(conflicts));
            }
        }

        let request = state.find_mut(id)?;
        request.from_date = applied.interval.from();
        request.to_date = applied.interval.to();
        request.leave_days = applied.interval.days();
        request.reason = applied.reason;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn delete(&self, id: u64, caller_id: u64) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();

        let current = state.find_mut(id)?;
        current.ensure_owned_by(caller_id)?;
        current.ensure_pending()?;

        state.requests.retain(|r| r.id != id);
        Ok(())
    }

    async fn transition_status(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError> {
        let approver_name = self.users.get(&approver_id).map(|(name, _)| name.clone());
        let mut state = self.state.lock().unwrap();

        let request = state.find_mut(id)?;
        request.ensure_pending()?;
        request.status = decision.status();
        request.approved_by = Some(approver_id);
        request.approver_name = approver_name;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::scope::{can_approve, resolve_scope, tests::caller},
        model::{leave_request::tests::day, role::Role},
        store::Pagination,
    };

    const U1: u64 = 1;
    const U2: u64 = 2;
    const U3: u64 = 3;

    fn store() -> MemoryLeaveStore {
        MemoryLeaveStore::new(&[(U1, "User One", 1), (U2, "User Two", 1), (U3, "User Three", 2)])
    }

    fn today() -> NaiveDate {
        day(2025, 6, 1)
    }

    fn draft(from: NaiveDate, to: NaiveDate) -> LeaveDraft {
        LeaveDraft {
            from_date: Some(from),
            to_date: Some(to),
            reason: Some("Family trip to the coast".into()),
        }
    }

    #[actix_web::test]
    async fn disjoint_requests_succeed_in_either_order() {
        let a = (day(2025, 7, 1), day(2025, 7, 3));
        let b = (day(2025, 7, 4), day(2025, 7, 6));

        for (first, second) in [(a, b), (b, a)] {
            let store = store();
            store.create(U1, draft(first.0, first.1), today()).await.unwrap();
            store.create(U1, draft(second.0, second.1), today()).await.unwrap();
        }
    }

    #[actix_web::test]
    async fn overlapping_request_lists_the_blocking_range() {
        let store = store();
        store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 5)), today())
            .await
            .unwrap();

        match store.create(U1, draft(day(2025, 7, 4), day(2025, 7, 10)), today()).await {
            Err(AppError::Overlap(conflicts)) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].to_string(), "2025-07-01 to 2025-07-05");
            }
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn overlap_is_per_owner() {
        let store = store();
        store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 5)), today())
            .await
            .unwrap();
        store
            .create(U2, draft(day(2025, 7, 1), day(2025, 7, 5)), today())
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn approved_requests_still_block() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 5)), today())
            .await
            .unwrap();
        store.transition_status(r1.id, U2, Decision::Approve).await.unwrap();

        assert!(matches!(
            store.create(U1, draft(day(2025, 7, 5), day(2025, 7, 5)), today()).await,
            Err(AppError::Overlap(_))
        ));
    }

    #[actix_web::test]
    async fn rejected_request_never_blocks() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 5)), today())
            .await
            .unwrap();
        store.transition_status(r1.id, U2, Decision::Reject).await.unwrap();

        let r2 = store
            .create(U1, draft(day(2025, 7, 2), day(2025, 7, 4)), today())
            .await
            .unwrap();
        assert_eq!(r2.status, LeaveStatus::Pending);
    }

    #[actix_web::test]
    async fn editing_to_own_interval_succeeds() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();

        let edited = store
            .update(
                r1.id,
                U1,
                LeaveChanges {
                    from_date: Some(day(2025, 7, 1)),
                    to_date: Some(day(2025, 7, 3)),
                    reason: Some("Family trip, dates confirmed".into()),
                },
                today(),
            )
            .await
            .unwrap();
        assert_eq!(edited.reason, "Family trip, dates confirmed");
    }

    #[actix_web::test]
    async fn extending_into_own_other_request_overlaps() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();
        store
            .create(U1, draft(day(2025, 7, 10), day(2025, 7, 12)), today())
            .await
            .unwrap();

        let changes = LeaveChanges {
            to_date: Some(day(2025, 7, 10)),
            ..Default::default()
        };
        assert!(matches!(
            store.update(r1.id, U1, changes, today()).await,
            Err(AppError::Overlap(_))
        ));
    }

    #[actix_web::test]
    async fn only_owner_edits_and_only_while_pending() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();

        let changes = || LeaveChanges {
            reason: Some("Changed my plans a bit".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(r1.id, U2, changes(), today()).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            store.update(99, U1, changes(), today()).await,
            Err(AppError::NotFound(_))
        ));

        store.transition_status(r1.id, U2, Decision::Approve).await.unwrap();
        assert!(matches!(
            store.update(r1.id, U1, changes(), today()).await,
            Err(AppError::NotPending)
        ));
    }

    #[actix_web::test]
    async fn leader_approves_then_owner_cannot_delete() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();

        let leader = caller(U2, 1, &[Role::DepartmentLeader]);
        assert!(can_approve(&leader, &r1));

        let decided = store.transition_status(r1.id, U2, Decision::Approve).await.unwrap();
        assert_eq!(decided.status, LeaveStatus::Approved);
        assert_eq!(decided.approved_by, Some(U2));
        assert_eq!(decided.approver_name.as_deref(), Some("User Two"));

        assert!(matches!(store.delete(r1.id, U1).await, Err(AppError::NotPending)));
    }

    #[actix_web::test]
    async fn decision_happens_exactly_once() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();

        store.transition_status(r1.id, U2, Decision::Reject).await.unwrap();
        assert!(matches!(
            store.transition_status(r1.id, U2, Decision::Approve).await,
            Err(AppError::NotPending)
        ));
        assert!(matches!(
            store.transition_status(42, U2, Decision::Approve).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn owner_deletes_pending_request() {
        let store = store();
        let r1 = store
            .create(U1, draft(day(2025, 7, 1), day(2025, 7, 3)), today())
            .await
            .unwrap();

        assert!(matches!(store.delete(r1.id, U2).await, Err(AppError::Forbidden)));
        store.delete(r1.id, U1).await.unwrap();
        assert!(store.get(r1.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn listing_honours_scope_and_pages() {
        let store = store();
        for (owner, month) in [(U1, 7), (U2, 8), (U3, 9)] {
            store
                .create(owner, draft(day(2025, month, 1), day(2025, month, 2)), today())
                .await
                .unwrap();
        }

        let director = caller(9, 3, &[Role::Director]);
        let all = store.list(&resolve_scope(&director), &LeaveFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].user_id, U3);

        let leader = caller(U2, 1, &[Role::DepartmentLeader]);
        let department = store.list(&resolve_scope(&leader), &LeaveFilter::default()).await.unwrap();
        assert!(department.iter().all(|r| r.department_id == 1));
        assert_eq!(department.len(), 2);

        let employee = caller(U3, 2, &[Role::Employee]);
        let own = store.list(&resolve_scope(&employee), &LeaveFilter::default()).await.unwrap();
        assert_eq!(own.len(), 1);

        let page = store
            .list_page(
                &AccessScope::All,
                &LeaveFilter::default(),
                &Pagination {
                    page: Some(2),
                    per_page: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!((page.total, page.data.len()), (3, 1));
        assert_eq!(page.data[0].user_id, U1);

        let beyond = store
            .list_page(
                &AccessScope::All,
                &LeaveFilter::default(),
                &Pagination {
                    page: Some(u64::MAX),
                    per_page: Some(100),
                },
            )
            .await
            .unwrap();
        assert_eq!((beyond.total, beyond.data.len()), (3, 0));
    }

    #[actix_web::test]
    async fn filter_window_keeps_contained_requests() {
        let store = store();
        for (from, to) in [
            (day(2025, 7, 2), day(2025, 7, 4)),
            (day(2025, 6, 29), day(2025, 7, 1)),
            (day(2025, 7, 30), day(2025, 8, 2)),
        ] {
            store.create(U1, draft(from, to), today()).await.unwrap();
        }

        let filter = LeaveFilter {
            from_date: Some(day(2025, 7, 1)),
            to_date: Some(day(2025, 7, 31)),
            ..Default::default()
        };
        let found = store.list(&AccessScope::All, &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].from_date, day(2025, 7, 2));
    }

    #[actix_web::test]
    async fn past_start_is_rejected_on_create() {
        let store = store();
        assert!(matches!(
            store.create(U1, draft(day(2025, 5, 30), day(2025, 6, 2)), today()).await,
            Err(AppError::Validation(_))
        ));
    }
}
