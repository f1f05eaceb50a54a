//! Read-only aggregates over leave requests: the director's timeline and the
//! dashboard figures. Everything here is pure; handlers fetch the scoped
//! requests and pass them in.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{
    leave_request::{LeaveFilter, LeaveInterval, LeaveRequest, LeaveStatus},
    user::UserProfile,
};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;
pub const MAX_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl StatusCounts {
    pub fn tally<'a, I: IntoIterator<Item = &'a LeaveRequest>>(requests: I) -> Self {
        let mut counts = Self::default();
        for request in requests {
            counts.total += 1;
            match request.status {
                LeaveStatus::Pending => counts.pending += 1,
                LeaveStatus::Approved => counts.approved += 1,
                LeaveStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

fn approved_days<'a, I: IntoIterator<Item = &'a LeaveRequest>>(requests: I) -> i64 {
    requests
        .into_iter()
        .filter(|r| r.status == LeaveStatus::Approved)
        .map(|r| r.leave_days)
        .sum()
}

// ---------- timeline ----------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimelineQuery {
    /// Only requests starting on or after this date
    #[param(value_type = Option<String>, format = "date", example = "2026-07-01")]
    pub from_date: Option<NaiveDate>,
    /// Only requests ending on or before this date
    #[param(value_type = Option<String>, format = "date", example = "2026-07-31")]
    pub to_date: Option<NaiveDate>,
}

impl TimelineQuery {
    pub fn filter(&self) -> LeaveFilter {
        LeaveFilter {
            from_date: self.from_date,
            to_date: self.to_date,
            ..Default::default()
        }
    }
}

/// One bar on the calendar, positioned in percent of the whole span.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelineEntry {
    pub id: u64,
    #[schema(format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub to_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub leave_days: i64,
    #[schema(example = 12.5)]
    pub offset_percent: f64,
    #[schema(example = 25.0)]
    pub width_percent: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelineUser {
    pub user_id: u64,
    pub full_name: String,
    pub department_id: u64,
    pub leaves: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Timeline {
    /// Earliest start among the returned requests
    #[schema(format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    /// Latest end among the returned requests
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub span_days: i64,
    pub users: Vec<TimelineUser>,
}

/// Lays `requests` out on one calendar. Every active user in `people` gets a
/// row, even without leave; owners of listed requests get one regardless.
pub fn build_timeline(requests: &[LeaveRequest], people: &[UserProfile]) -> Timeline {
    let mut by_user: HashMap<u64, TimelineUser> = people
        .iter()
        .filter(|p| p.is_active)
        .map(|p| {
            let row = TimelineUser {
                user_id: p.id,
                full_name: p.full_name.clone(),
                department_id: p.department_id,
                leaves: Vec::new(),
            };
            (p.id, row)
        })
        .collect();

    let start = requests.iter().map(|r| r.from_date).min();
    let end = requests.iter().map(|r| r.to_date).max();
    let span = start.zip(end).map(|(start, end)| LeaveInterval::stored(start, end));
    let span_days = span.map_or(0, |s| s.days());
    let percent = |days: i64| days as f64 / span_days as f64 * 100.0;

    for request in requests {
        let offset = (request.from_date - start.unwrap_or(request.from_date)).num_days();
        let row = by_user.entry(request.user_id).or_insert_with(|| TimelineUser {
            user_id: request.user_id,
            full_name: request.requester_name.clone(),
            department_id: request.department_id,
            leaves: Vec::new(),
        });

        row.leaves.push(TimelineEntry {
            id: request.id,
            from_date: request.from_date,
            to_date: request.to_date,
            reason: request.reason.clone(),
            status: request.status,
            leave_days: request.leave_days,
            offset_percent: percent(offset),
            width_percent: percent(request.leave_days),
        });
    }

    let mut users: Vec<TimelineUser> = by_user.into_values().collect();
    users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.user_id.cmp(&b.user_id)));
    for user in &mut users {
        user.leaves.sort_by_key(|l| (l.from_date, l.id));
    }

    Timeline {
        start_date: start,
        end_date: end,
        span_days,
        users,
    }
}

// ---------- dashboard ----------

/// Directory-wide figures, only shown to directors.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct OrganizationStats {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub total_departments: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub requests: StatusCounts,
    pub this_month_requests: u64,
    pub approved_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationStats>,
}

fn same_month(at: DateTime<Utc>, today: NaiveDate) -> bool {
    let date = at.date_naive();
    date.year() == today.year() && date.month() == today.month()
}

pub fn dashboard_stats(requests: &[LeaveRequest], today: NaiveDate) -> DashboardStats {
    DashboardStats {
        requests: StatusCounts::tally(requests),
        this_month_requests: requests.iter().filter(|r| same_month(r.created_at, today)).count() as u64,
        approved_days: approved_days(requests),
        organization: None,
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthlyQuery {
    /// Calendar year, defaults to the current one
    #[param(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthStats {
    #[schema(example = 7)]
    pub month: u32,
    #[schema(example = "July")]
    pub month_name: &'static str,
    pub requests: StatusCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyStats {
    pub year: i32,
    pub months: Vec<MonthStats>,
}

/// Twelve buckets by creation month.
pub fn monthly_stats(requests: &[LeaveRequest], year: i32) -> MonthlyStats {
    let mut months = Vec::with_capacity(12);
    let mut month = Month::January;

    for number in 1..=12u32 {
        let created_in = requests.iter().filter(|r| {
            let created = r.created_at.date_naive();
            created.year() == year && created.month() == number
        });

        months.push(MonthStats {
            month: number,
            month_name: month.name(),
            requests: StatusCounts::tally(created_in),
        });
        month = month.succ();
    }

    MonthlyStats { year, months }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserStats {
    pub user_id: u64,
    pub requests: StatusCounts,
    pub year: i32,
    /// Approved leave days falling inside `year`
    pub approved_days: i64,
    pub annual_allowance: i64,
    /// May go negative when approvals exceed the allowance
    pub remaining_days: i64,
}

/// Number of days of `request` that fall inside `year`.
fn days_in_year(request: &LeaveRequest, year: i32) -> i64 {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };

    let from = request.from_date.max(first);
    let to = request.to_date.min(last);
    if from > to { 0 } else { LeaveInterval::stored(from, to).days() }
}

/// `requests` must all belong to `user_id`.
pub fn user_stats(user_id: u64, requests: &[LeaveRequest], year: i32, annual_allowance: i64) -> UserStats {
    let approved_days = requests
        .iter()
        .filter(|r| r.status == LeaveStatus::Approved)
        .map(|r| days_in_year(r, year))
        .sum();

    UserStats {
        user_id,
        requests: StatusCounts::tally(requests),
        year,
        approved_days,
        annual_allowance,
        remaining_days: annual_allowance - approved_days,
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Number of entries, 1 to 50 (default 10)
    #[param(example = 10)]
    pub limit: Option<usize>,
}

impl ActivityQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, MAX_ACTIVITY_LIMIT)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Activity {
    pub id: u64,
    pub user_id: u64,
    pub requester_name: String,
    #[schema(example = "Nguyen Van An submitted a leave request")]
    pub title: String,
    #[schema(example = "From 2026-07-01 to 2026-07-03")]
    pub description: String,
    pub status: LeaveStatus,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<LeaveRequest> for Activity {
    fn from(request: LeaveRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            title: format!("{} submitted a leave request", request.requester_name),
            description: format!("From {} to {}", request.from_date, request.to_date),
            requester_name: request.requester_name,
            status: request.status,
            created_at: request.created_at,
        }
    }
}

/// Newest `limit` requests; `requests` must already be newest first.
pub fn recent_activity(requests: Vec<LeaveRequest>, limit: usize) -> Vec<Activity> {
    requests.into_iter().take(limit).map(Activity::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::tests::day;
    use chrono::TimeZone;

    fn request(id: u64, user_id: u64, name: &str, from: NaiveDate, to: NaiveDate, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id,
            user_id,
            requester_name: name.into(),
            department_id: 1,
            from_date: from,
            to_date: to,
            reason: "Family trip to the coast".into(),
            status,
            approved_by: None,
            approver_name: None,
            leave_days: LeaveInterval::stored(from, to).days(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn timeline_positions_bars_relative_to_global_span() {
        let requests = vec![
            request(1, 1, "Binh", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Approved),
            request(2, 2, "An", day(2025, 7, 8), day(2025, 7, 10), LeaveStatus::Pending),
        ];

        let timeline = build_timeline(&requests, &[]);
        assert_eq!(timeline.start_date, Some(day(2025, 7, 1)));
        assert_eq!(timeline.end_date, Some(day(2025, 7, 10)));
        assert_eq!(timeline.span_days, 10);

        assert_eq!(timeline.users[0].full_name, "An");
        let an = &timeline.users[0].leaves[0];
        assert!((an.offset_percent - 70.0).abs() < 1e-9);
        assert!((an.width_percent - 30.0).abs() < 1e-9);

        let binh = &timeline.users[1].leaves[0];
        assert!(binh.offset_percent.abs() < 1e-9);
        assert!((binh.width_percent - 30.0).abs() < 1e-9);
    }

    #[test]
    fn timeline_groups_requests_per_user() {
        let requests = vec![
            request(3, 1, "Binh", day(2025, 7, 20), day(2025, 7, 20), LeaveStatus::Pending),
            request(1, 1, "Binh", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Rejected),
        ];

        let timeline = build_timeline(&requests, &[]);
        assert_eq!(timeline.users.len(), 1);
        let ids: Vec<_> = timeline.users[0].leaves.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let last = &timeline.users[0].leaves[1];
        assert!((last.offset_percent + last.width_percent - 100.0).abs() < 1e-9);
    }

    fn person(id: u64, name: &str, is_active: bool) -> UserProfile {
        UserProfile {
            id,
            username: name.to_lowercase(),
            full_name: name.into(),
            department_id: 1,
            department_name: None,
            is_active,
            roles: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_timeline_has_no_span() {
        let timeline = build_timeline(&[], &[]);
        assert_eq!(timeline.span_days, 0);
        assert!(timeline.users.is_empty());
        assert!(timeline.start_date.is_none());
    }

    #[test]
    fn every_active_user_gets_a_row() {
        let people = vec![person(1, "Binh", true), person(2, "An", true), person(3, "Cuong", false)];
        let requests = vec![request(1, 1, "Binh", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Approved)];

        let timeline = build_timeline(&requests, &people);
        let names: Vec<_> = timeline.users.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["An", "Binh"]);
        assert!(timeline.users[0].leaves.is_empty());
        assert_eq!(timeline.users[1].leaves.len(), 1);

        let quiet = build_timeline(&[], &people);
        assert_eq!(quiet.span_days, 0);
        assert_eq!(quiet.users.len(), 2);
        assert!(quiet.users.iter().all(|u| u.leaves.is_empty()));
    }

    #[test]
    fn inactive_owner_of_a_listed_request_still_shows() {
        let people = vec![person(3, "Cuong", false)];
        let requests = vec![request(4, 3, "Cuong", day(2025, 7, 1), day(2025, 7, 1), LeaveStatus::Pending)];

        let timeline = build_timeline(&requests, &people);
        assert_eq!(timeline.users.len(), 1);
        assert_eq!(timeline.users[0].user_id, 3);
    }

    #[test]
    fn dashboard_counts_statuses_and_approved_days() {
        let requests = vec![
            request(1, 1, "An", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Approved),
            request(2, 1, "An", day(2025, 7, 8), day(2025, 7, 9), LeaveStatus::Approved),
            request(3, 2, "Binh", day(2025, 7, 1), day(2025, 7, 1), LeaveStatus::Pending),
            request(4, 2, "Binh", day(2025, 8, 1), day(2025, 8, 5), LeaveStatus::Rejected),
        ];

        let stats = dashboard_stats(&requests, day(2025, 6, 20));
        assert_eq!(
            stats.requests,
            StatusCounts {
                total: 4,
                pending: 1,
                approved: 2,
                rejected: 1
            }
        );
        assert_eq!(stats.this_month_requests, 4);
        assert_eq!(stats.approved_days, 5);

        assert_eq!(dashboard_stats(&requests, day(2025, 7, 1)).this_month_requests, 0);
    }

    #[test]
    fn monthly_stats_bucket_by_creation_month() {
        let requests = vec![
            request(1, 1, "An", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Approved),
            request(2, 1, "An", day(2025, 7, 8), day(2025, 7, 9), LeaveStatus::Pending),
        ];

        let stats = monthly_stats(&requests, 2025);
        assert_eq!(stats.months.len(), 12);
        assert_eq!(stats.months[5].month_name, "June");
        assert_eq!(stats.months[5].requests.total, 2);
        assert_eq!(stats.months[0].requests.total, 0);

        let other_year = monthly_stats(&requests, 2024);
        assert!(other_year.months.iter().all(|m| m.requests.total == 0));
    }

    #[test]
    fn user_stats_count_only_days_inside_the_year() {
        let requests = vec![
            request(1, 1, "An", day(2024, 12, 30), day(2025, 1, 2), LeaveStatus::Approved),
            request(2, 1, "An", day(2025, 7, 1), day(2025, 7, 5), LeaveStatus::Approved),
            request(3, 1, "An", day(2025, 8, 1), day(2025, 8, 10), LeaveStatus::Rejected),
        ];

        let stats = user_stats(1, &requests, 2025, 20);
        assert_eq!(stats.approved_days, 7);
        assert_eq!(stats.remaining_days, 13);
        assert_eq!(stats.requests.rejected, 1);
    }

    #[test]
    fn activity_limit_is_bounded() {
        assert_eq!(ActivityQuery::default().limit(), 10);
        assert_eq!(ActivityQuery { limit: Some(500) }.limit(), 50);
        assert_eq!(ActivityQuery { limit: Some(0) }.limit(), 1);

        let requests = vec![
            request(2, 1, "An", day(2025, 7, 8), day(2025, 7, 9), LeaveStatus::Pending),
            request(1, 1, "An", day(2025, 7, 1), day(2025, 7, 3), LeaveStatus::Approved),
        ];
        let activity = recent_activity(requests, 1);
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].title, "An submitted a leave request");
        assert_eq!(activity[0].description, "From 2025-07-08 to 2025-07-09");
    }
}
