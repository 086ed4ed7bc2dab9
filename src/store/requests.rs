use super::{RecordStore, StoreState};
use crate::core::{
    NewRequest, RecordId, Request, RequestPatch, RequestStatus, Result, StoreError,
};
use crate::query::{self, RequestFilter};
use chrono::Utc;

pub const JUSTIFICATION_MIN_CHARS: usize = 10;
pub const JUSTIFICATION_MAX_CHARS: usize = 250;

fn check_justification(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if !(JUSTIFICATION_MIN_CHARS..=JUSTIFICATION_MAX_CHARS).contains(&chars) {
        return Err(StoreError::validation(format!(
            "justification must be {}-{} characters, got {}",
            JUSTIFICATION_MIN_CHARS, JUSTIFICATION_MAX_CHARS, chars
        )));
    }
    Ok(trimmed.to_string())
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(StoreError::validation("quantity must be at least 1"));
    }
    Ok(())
}

/// Explicit unit, else the catalog unit of the named material, else the
/// configured default.
fn resolve_unit(state: &StoreState, draft: &NewRequest, default_unit: &str) -> String {
    if let Some(unit) = draft.unit.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return unit.to_string();
    }
    state
        .materials
        .records()
        .iter()
        .find(|m| m.name == draft.material_name && !m.unit.is_empty())
        .map(|m| m.unit.clone())
        .unwrap_or_else(|| default_unit.to_string())
}

impl RecordStore {
    /// Files a new request in `pending` state.
    pub async fn add_request(&self, mut draft: NewRequest) -> Result<Request> {
        check_quantity(draft.quantity)?;
        let justification = check_justification(&draft.justification)?;
        draft.material_name = draft.material_name.trim().to_string();
        if draft.material_name.is_empty() {
            return Err(StoreError::validation("material name must not be empty"));
        }
        let default_unit = self.config().default_unit.clone();

        self.insert_with(move |id, state| {
            if state.users.get(draft.user_id).is_none() {
                return Err(StoreError::validation(format!(
                    "user {} does not exist",
                    draft.user_id
                )));
            }
            let unit = resolve_unit(state, &draft, &default_unit);
            Ok(Request {
                id,
                user_id: draft.user_id,
                material_name: draft.material_name,
                quantity: draft.quantity,
                unit,
                required_date: draft.required_date,
                justification,
                status: RequestStatus::Pending,
                rejection_comment: None,
                created_at: Utc::now(),
                updated_at: None,
            })
        })
        .await
    }

    /// Field-wise merge that always stamps `updated_at`. Status changes are
    /// not checked here; use the workflow methods for that.
    pub async fn update_request(
        &self,
        id: RecordId,
        mut patch: RequestPatch,
    ) -> Result<Option<Request>> {
        if let Some(quantity) = patch.quantity {
            check_quantity(quantity)?;
        }
        if let Some(text) = patch.justification.take() {
            patch.justification = Some(check_justification(&text)?);
        }
        self.update_with(id, move |request: &mut Request, _| {
            patch.apply_to(request);
            request.updated_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn delete_request(&self, id: RecordId) -> Result<bool> {
        self.remove::<Request>(id).await
    }

    pub async fn approve_request(&self, id: RecordId) -> Result<Option<Request>> {
        self.transition(id, RequestStatus::Approved, None).await
    }

    /// Rejection requires a non-blank comment.
    pub async fn reject_request(&self, id: RecordId, comment: &str) -> Result<Option<Request>> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(StoreError::validation("rejection comment must not be empty"));
        }
        self.transition(id, RequestStatus::Rejected, Some(comment.to_string()))
            .await
    }

    pub async fn confirm_request(&self, id: RecordId) -> Result<Option<Request>> {
        self.transition(id, RequestStatus::Confirmed, None).await
    }

    async fn transition(
        &self,
        id: RecordId,
        to: RequestStatus,
        comment: Option<String>,
    ) -> Result<Option<Request>> {
        self.update_with(id, move |request: &mut Request, _| {
            if !request.status.can_transition_to(to) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: request.status,
                    to,
                });
            }
            request.status = to;
            if comment.is_some() {
                request.rejection_comment = comment;
            }
            request.updated_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn request_by_id(&self, id: RecordId) -> Option<Request> {
        self.fetch_one(id).await
    }

    pub async fn all_requests(&self) -> Vec<Request> {
        self.fetch_all().await
    }

    pub async fn requests_for_user(&self, user_id: RecordId) -> Vec<Request> {
        self.filter_requests(&RequestFilter {
            user_id: Some(user_id),
            ..RequestFilter::default()
        })
        .await
    }

    pub async fn requests_by_status(&self, status: RequestStatus) -> Vec<Request> {
        self.filter_requests(&RequestFilter {
            status: Some(status),
            ..RequestFilter::default()
        })
        .await
    }

    pub async fn filter_requests(&self, filter: &RequestFilter) -> Vec<Request> {
        self.ready().await;
        query::filter_requests(self.read_state().requests.records(), filter)
    }
}
