//! Pure filtering and pagination over collection snapshots.
//!
//! Every function takes a borrowed snapshot and returns new vectors; the
//! source is never reordered or modified. Filters compose by AND and a filter
//! field that is `None` or blank is ignored.

use crate::core::{Material, Record, RecordId, Request, RequestStatus, Role, User};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialFilter {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestFilter {
    pub search: Option<String>,
    pub status: Option<RequestStatus>,
    /// Matches the UTC calendar day of `created_at`.
    pub date: Option<NaiveDate>,
    pub user_id: Option<RecordId>,
}

fn needle(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn matches_search<T: Record>(record: &T, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => record.search_text().to_lowercase().contains(needle.as_str()),
        None => true,
    }
}

pub fn filter_materials(materials: &[Material], filter: &MaterialFilter) -> Vec<Material> {
    let needle = needle(&filter.search);
    materials
        .iter()
        .filter(|m| matches_search(*m, &needle))
        .cloned()
        .collect()
}

pub fn filter_users(users: &[User], filter: &UserFilter) -> Vec<User> {
    let needle = needle(&filter.search);
    users
        .iter()
        .filter(|u| matches_search(*u, &needle))
        .filter(|u| filter.role.is_none_or(|role| u.role == role))
        .cloned()
        .collect()
}

pub fn filter_requests(requests: &[Request], filter: &RequestFilter) -> Vec<Request> {
    let needle = needle(&filter.search);
    requests
        .iter()
        .filter(|r| matches_search(*r, &needle))
        .filter(|r| filter.status.is_none_or(|status| r.status == status))
        .filter(|r| filter.date.is_none_or(|day| r.created_at.date_naive() == day))
        .filter(|r| filter.user_id.is_none_or(|user_id| r.user_id == user_id))
        .cloned()
        .collect()
}

/// Approved and confirmed requests, approved first, newest first within a status.
pub fn purchasing_queue(requests: &[Request]) -> Vec<Request> {
    fn rank(status: RequestStatus) -> u8 {
        match status {
            RequestStatus::Approved => 0,
            _ => 1,
        }
    }

    let mut queue: Vec<Request> = requests
        .iter()
        .filter(|r| matches!(r.status, RequestStatus::Approved | RequestStatus::Confirmed))
        .cloned()
        .collect();
    queue.sort_by(|a, b| match rank(a.status).cmp(&rank(b.status)) {
        Ordering::Equal => b.created_at.cmp(&a.created_at),
        other => other,
    });
    queue
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slices `[(page-1)*size, page*size)` out of `items`.
///
/// `page` is 1-based and is not clamped: an out-of-range page simply yields
/// an empty `data`. `total_pages` is at least 1.
pub fn paginate<T: Clone>(items: &[T], page: usize, size: usize) -> Page<T> {
    let total_items = items.len();
    let total_pages = if size == 0 {
        1
    } else {
        total_items.div_ceil(size).max(1)
    };

    let data = match page.checked_sub(1) {
        Some(index) if size > 0 => {
            let start = index.saturating_mul(size).min(total_items);
            let end = start.saturating_add(size).min(total_items);
            items[start..end].to_vec()
        }
        _ => Vec::new(),
    };

    Page {
        data,
        current_page: page,
        total_pages,
        total_items,
    }
}

/// Brings a consumer's page number back into `[1, total_pages]`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}
