use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, FieldError};

pub const REASON_MIN_CHARS: usize = 10;
pub const REASON_MAX_CHARS: usize = 500;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Pending and approved requests occupy their days; rejected ones don't.
    pub fn blocks_calendar(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }

    /// Every status for which [`blocks_calendar`](Self::blocks_calendar) holds.
    pub fn blocking() -> Vec<LeaveStatus> {
        Self::iter().filter(|s| s.blocks_calendar()).collect()
    }
}

/// Outcome chosen by an approver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }
}

/// Inclusive calendar-day range, `from <= to`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
pub struct LeaveInterval {
    #[serde(rename = "from_date")]
    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    from: NaiveDate,
    #[serde(rename = "to_date")]
    #[schema(example = "2026-07-05", format = "date", value_type = String)]
    to: NaiveDate,
}

impl LeaveInterval {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, FieldError> {
        if from > to {
            return Err(FieldError::new(
                "to_date",
                "to_date cannot be before from_date",
            ));
        }
        Ok(Self { from, to })
    }

    /// Rows read back from `leave_requests`, already guarded by a CHECK constraint.
    pub(crate) fn stored(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn overlaps(&self, other: &LeaveInterval) -> bool {
        self.from <= other.to && self.to >= other.from
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

impl fmt::Display for LeaveInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Intervals among `existing` that intersect `candidate`, earliest first.
/// `exclude` drops the request being edited from its own check.
pub fn conflicting_intervals<I>(existing: I, candidate: &LeaveInterval, exclude: Option<u64>) -> Vec<LeaveInterval>
where
    I: IntoIterator<Item = (u64, LeaveInterval)>,
{
    let mut conflicts: Vec<LeaveInterval> = existing
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .map(|(_, interval)| interval)
        .filter(|interval| interval.overlaps(candidate))
        .collect();
    conflicts.sort_by_key(|i| (i.from, i.to));
    conflicts
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_id": 7,
    "requester_name": "Nguyen Van A",
    "department_id": 1,
    "from_date": "2026-07-01",
    "to_date": "2026-07-03",
    "reason": "Family trip to the coast",
    "status": "pending",
    "approved_by": null,
    "approver_name": null,
    "leave_days": 3,
    "created_at": "2026-06-20T08:00:00Z",
    "updated_at": "2026-06-20T08:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    /// owner of the request
    pub user_id: u64,
    pub requester_name: String,
    /// owner's department
    pub department_id: u64,
    #[schema(format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub to_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub approved_by: Option<u64>,
    pub approver_name: Option<String>,
    pub leave_days: i64,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn interval(&self) -> LeaveInterval {
        LeaveInterval::stored(self.from_date, self.to_date)
    }

    pub fn ensure_owned_by(&self, caller_id: u64) -> Result<(), AppError> {
        if self.user_id == caller_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn ensure_pending(&self) -> Result<(), AppError> {
        if self.status == LeaveStatus::Pending {
            Ok(())
        } else {
            Err(AppError::NotPending)
        }
    }
}

/// Raw row of the joined leave query.
#[derive(Debug, FromRow)]
pub struct LeaveRow {
    pub id: u64,
    pub user_id: u64,
    pub requester_name: String,
    pub department_id: u64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    pub status: String,
    pub approved_by: Option<u64>,
    pub approver_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<LeaveStatus>().map_err(|_| {
            AppError::Internal(anyhow::anyhow!(
                "leave request {} has unknown status {:?}",
                row.id,
                row.status
            ))
        })?;

        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            requester_name: row.requester_name,
            department_id: row.department_id,
            from_date: row.from_date,
            to_date: row.to_date,
            reason: row.reason,
            status,
            approved_by: row.approved_by,
            approver_name: row.approver_name,
            leave_days: LeaveInterval::stored(row.from_date, row.to_date).days(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn validate_reason(raw: &str) -> Result<String, FieldError> {
    let reason = raw.trim();
    let len = reason.chars().count();

    if len == 0 {
        return Err(FieldError::new("reason", "reason is required"));
    }
    if len < REASON_MIN_CHARS {
        return Err(FieldError::new(
            "reason",
            format!("reason must be at least {REASON_MIN_CHARS} characters"),
        ));
    }
    if len > REASON_MAX_CHARS {
        return Err(FieldError::new(
            "reason",
            format!("reason must be at most {REASON_MAX_CHARS} characters"),
        ));
    }
    Ok(reason.to_string())
}

fn past_start(from: NaiveDate, today: NaiveDate) -> Option<FieldError> {
    (from < today).then(|| FieldError::new("from_date", "from_date cannot be in the past"))
}

/// Body of `POST /leave`. The owner is always the authenticated caller.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaveDraft {
    #[serde(default, alias = "FromDate")]
    #[schema(example = "2026-07-01", format = "date", value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    #[serde(default, alias = "ToDate")]
    #[schema(example = "2026-07-03", format = "date", value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    #[serde(default, alias = "Reason")]
    #[schema(example = "Family trip to the coast")]
    pub reason: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone)]
pub struct NewLeave {
    pub interval: LeaveInterval,
    pub reason: String,
}

impl LeaveDraft {
    pub fn validate(self, today: NaiveDate) -> Result<NewLeave, AppError> {
        let mut errors = Vec::new();

        if self.from_date.is_none() {
            errors.push(FieldError::new("from_date", "from_date is required"));
        }
        if self.to_date.is_none() {
            errors.push(FieldError::new("to_date", "to_date is required"));
        }

        let mut interval = None;
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            match LeaveInterval::new(from, to) {
                Ok(i) => interval = Some(i),
                Err(e) => errors.push(e),
            }
            errors.extend(past_start(from, today));
        }

        let reason = match validate_reason(self.reason.as_deref().unwrap_or_default()) {
            Ok(r) => Some(r),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        match (interval, reason) {
            (Some(interval), Some(reason)) if errors.is_empty() => Ok(NewLeave { interval, reason }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Body of `PUT /leave/{id}`; every field optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaveChanges {
    #[serde(default, alias = "FromDate")]
    #[schema(example = "2026-07-02", format = "date", value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    #[serde(default, alias = "ToDate")]
    #[schema(example = "2026-07-04", format = "date", value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    #[serde(default, alias = "Reason")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppliedChanges {
    pub interval: LeaveInterval,
    pub reason: String,
    pub interval_changed: bool,
}

impl LeaveChanges {
    /// Merges the edit into `current`. The past-date rule only applies to a
    /// start date that actually moves.
    pub fn apply_to(self, current: &LeaveRequest, today: NaiveDate) -> Result<AppliedChanges, AppError> {
        if self.from_date.is_none() && self.to_date.is_none() && self.reason.is_none() {
            return Err(AppError::BadRequest("No fields provided for update".into()));
        }

        let mut errors = Vec::new();
        let from = self.from_date.unwrap_or(current.from_date);
        let to = self.to_date.unwrap_or(current.to_date);

        if from != current.from_date {
            errors.extend(past_start(from, today));
        }

        let interval = match LeaveInterval::new(from, to) {
            Ok(i) => Some(i),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let reason = match self.reason.as_deref().map(validate_reason) {
            Some(Ok(r)) => Some(r),
            Some(Err(e)) => {
                errors.push(e);
                None
            }
            None => Some(current.reason.clone()),
        };

        match (interval, reason) {
            (Some(interval), Some(reason)) if errors.is_empty() => Ok(AppliedChanges {
                interval_changed: interval != current.interval(),
                interval,
                reason,
            }),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Optional list filters, combined with the caller's scope.
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by leave status
    #[param(value_type = Option<String>, example = "pending")]
    #[schema(value_type = Option<String>, example = "pending")]
    pub status: Option<LeaveStatus>,
    /// Filter by owner
    #[param(example = 7)]
    pub user_id: Option<u64>,
    /// Only requests starting on or after this date
    #[param(value_type = Option<String>, format = "date", example = "2026-07-01")]
    #[schema(value_type = Option<String>, format = "date")]
    pub from_date: Option<NaiveDate>,
    /// Only requests ending on or before this date
    #[param(value_type = Option<String>, format = "date", example = "2026-07-31")]
    #[schema(value_type = Option<String>, format = "date")]
    pub to_date: Option<NaiveDate>,
}
