use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// The role of an identity. Assigned at creation, never self-escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "lowercase")]
#[postgres(name = "user_role")]
pub enum Role {
    #[default]
    #[postgres(name = "user")]
    User,
    #[postgres(name = "admin")]
    Admin,
}

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's full name.
    pub name: String,
    /// The user's email address, stored lower-cased.
    pub email: String,
    /// The user's role.
    pub role: Role,
    /// The university the user studies at.
    pub university: String,
    /// The user's department.
    pub department: String,
    /// The user's contact number.
    pub contact_number: Option<String>,
    /// The user's hashed password.
    pub password_hash: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for User {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            role: row.get("role"),
            university: row.get("university"),
            department: row.get("department"),
            contact_number: row.get("contact_number"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }
    }
}

impl User {
    /// The read-only projection handed to clients.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            university: self.university.clone(),
            department: self.department.clone(),
            contact_number: self.contact_number.clone(),
            created_at: self.created_at,
        }
    }

    /// The seller fields exposed alongside a book.
    pub fn seller_summary(&self, with_email: bool) -> SellerSummary {
        SellerSummary {
            id: self.id,
            name: self.name.clone(),
            email: with_email.then(|| self.email.clone()),
            university: self.university.clone(),
            department: self.department.clone(),
        }
    }
}

/// A user record that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub university: String,
    pub department: String,
    pub contact_number: Option<String>,
    pub password_hash: String,
}

/// Profile fields a user may change on their own record.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub contact_number: Option<String>,
}

/// The identity projection returned by the API. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub university: String,
    pub department: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Seller fields populated into book responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub university: String,
    pub department: String,
}
