use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::user::UserProfile;

/// The request payload for user registration. Any `role` sent by the client
/// is ignored: new identities are always plain users.
#[derive(Deserialize, Serialize, Validate, Default, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(length(min = 1, max = 200))]
    pub university: String,
    #[garde(length(min = 1, max = 200))]
    pub department: String,
    #[garde(length(max = 30))]
    pub contact_number: Option<String>,
}

/// The request payload for user login.
#[derive(Deserialize, Serialize, Validate, Default, Clone)]
#[serde(default)]
pub struct LoginRequest {
    #[garde(length(min = 1))]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// Profile fields a user may change. Role is deliberately absent.
#[derive(Deserialize, Serialize, Validate, Default, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateDetailsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 200))]
    pub university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 200))]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(max = 30))]
    pub contact_number: Option<String>,
}

/// The request payload for changing a user's password.
#[derive(Deserialize, Serialize, Validate, Default, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[garde(length(min = 1))]
    pub current_password: String,
    #[garde(length(min = 8, max = 128))]
    pub new_password: String,
}

/// The response payload for requests that issue a credential.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// The `{ success, data }` envelope used by read responses.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// The body of every error response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
}
