use super::{Result, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type RecordId = u64;

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Users,
    Materials,
    Requests,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [Self::Users, Self::Materials, Self::Requests];

    /// Cache key, durable file stem and `<collection>Changed` prefix.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Materials => "materials",
            Self::Requests => "requests",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.key())
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CollectionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| StoreError::validation(format!("unknown collection '{}'", s)))
    }
}

/// A record held by one of the store's collections.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: CollectionKind;

    fn id(&self) -> RecordId;

    /// Display field matched by the case-insensitive search filter.
    fn search_text(&self) -> &str;
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Purchasing,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Purchasing => "purchasing",
            Self::Admin => "admin",
        }
    }

    /// Department assigned when a user is created without one.
    pub fn default_department(&self) -> &'static str {
        match self {
            Self::Employee | Self::Manager => "Sales",
            Self::Purchasing => "Purchasing",
            Self::Admin => "Administration",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub full_name: String,
    pub role: Role,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub department: String,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const KIND: CollectionKind = CollectionKind::Users;

    fn id(&self) -> RecordId {
        self.id
    }

    fn search_text(&self) -> &str {
        &self.full_name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub role: Role,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub department: Option<String>,
}

impl UserPatch {
    pub fn apply_to(self, user: &mut User) {
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(login) = self.login {
            user.login = login;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(department) = self.department {
            user.department = department;
        }
    }
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(default)]
    pub unit: String,
}

impl Record for Material {
    const KIND: CollectionKind = CollectionKind::Materials;

    fn id(&self) -> RecordId {
        self.id
    }

    fn search_text(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMaterial {
    pub name: String,
    pub specifications: Option<String>,
    pub unit: Option<String>,
}

impl NewMaterial {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn specifications(mut self, specifications: impl Into<String>) -> Self {
        self.specifications = Some(specifications.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub specifications: Option<String>,
    pub unit: Option<String>,
}

impl MaterialPatch {
    pub fn apply_to(self, material: &mut Material) {
        if let Some(name) = self.name {
            material.name = name;
        }
        if let Some(specifications) = self.specifications {
            material.specifications = Some(specifications);
        }
        if let Some(unit) = self.unit {
            material.unit = unit;
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Confirmed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Confirmed => "confirmed",
        }
    }

    /// pending -> {approved, rejected}, approved -> confirmed.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Confirmed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RecordId,
    pub user_id: RecordId,
    /// Copied from the catalog at creation; not a foreign key.
    pub material_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit: String,
    pub required_date: NaiveDate,
    pub justification: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Request {
    const KIND: CollectionKind = CollectionKind::Requests;

    fn id(&self) -> RecordId {
        self.id
    }

    fn search_text(&self) -> &str {
        &self.material_name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub user_id: RecordId,
    pub material_name: String,
    pub quantity: u32,
    /// Falls back to the catalog unit of `material_name`, then the configured unit.
    #[serde(default)]
    pub unit: Option<String>,
    pub required_date: NaiveDate,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestPatch {
    pub material_name: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub required_date: Option<NaiveDate>,
    pub justification: Option<String>,
    pub status: Option<RequestStatus>,
    pub rejection_comment: Option<String>,
}

impl RequestPatch {
    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(self, request: &mut Request) {
        if let Some(material_name) = self.material_name {
            request.material_name = material_name;
        }
        if let Some(quantity) = self.quantity {
            request.quantity = quantity;
        }
        if let Some(unit) = self.unit {
            request.unit = unit;
        }
        if let Some(required_date) = self.required_date {
            request.required_date = required_date;
        }
        if let Some(justification) = self.justification {
            request.justification = justification;
        }
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(comment) = self.rejection_comment {
            request.rejection_comment = Some(comment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_kind_round_trips_through_key() {
        for kind in CollectionKind::ALL {
            assert_eq!(kind.key().parse::<CollectionKind>().unwrap(), kind);
        }
        assert!("orders".parse::<CollectionKind>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Approved));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Rejected));
        assert!(RequestStatus::Approved.can_transition_to(RequestStatus::Confirmed));
        assert!(!RequestStatus::Rejected.can_transition_to(RequestStatus::Confirmed));
        assert!(!RequestStatus::Confirmed.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Confirmed));
    }

    #[test]
    fn test_request_reads_legacy_json() {
        let raw = r#"{
            "id": 3,
            "userId": 1,
            "materialName": "Bolt M8",
            "quantity": 40,
            "unit": "pcs",
            "requiredDate": "2024-05-20",
            "justification": "Assembly line restock",
            "status": "pending",
            "createdAt": "2024-05-01T09:30:00.000Z"
        }"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(request.id, 3);
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.updated_at.is_none());

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["materialName"], "Bolt M8");
        assert!(encoded.get("rejectionComment").is_none());
    }

    #[test]
    fn test_patch_keeps_unspecified_fields() {
        let mut material = Material {
            id: 1,
            name: "Bolt".to_string(),
            specifications: None,
            unit: "pcs".to_string(),
        };
        MaterialPatch {
            unit: Some("box".to_string()),
            ..MaterialPatch::default()
        }
        .apply_to(&mut material);
        assert_eq!(material.name, "Bolt");
        assert_eq!(material.unit, "box");
    }
}
