use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::{
    error::{AppError, Result},
    models::{
        auth::{LoginRequest, RegisterRequest, UpdateDetailsRequest, UpdatePasswordRequest},
        user::{NewUser, ProfileChanges, Role, User},
    },
    services::authz::Caller,
    state::AppState,
    validation::auth::{non_blank, normalize_email, validate_payload},
};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 2;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;

/// The message for any failed login, so callers cannot tell which accounts exist.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the hashed password.
fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    salt_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Registers a new identity and issues its first credential.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The registration payload.
///
/// # Returns
///
/// A `Result` containing the created `User` and its token.
pub async fn register(state: &AppState, mut req: RegisterRequest) -> Result<(User, String)> {
    validate_payload(&req)?;

    let new_user = NewUser {
        name: non_blank("name", &req.name)?,
        email: normalize_email(&req.email),
        university: non_blank("university", &req.university)?,
        department: non_blank("department", &req.department)?,
        contact_number: req
            .contact_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        password_hash: hash_password(&req.password)?,
    };
    req.password.zeroize();

    tracing::debug!("🔐 Creating user: {}", new_user.email);
    let user = state.users.create(new_user).await?;
    let token = state.tokens.issue(user.id)?;

    tracing::info!("✅ User registered: {}", user.id);
    Ok((user, token))
}

/// Checks an email/password pair and issues a credential.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The login payload.
///
/// # Returns
///
/// A `Result` containing the authenticated `User` and a fresh token.
pub async fn login(state: &AppState, mut req: LoginRequest) -> Result<(User, String)> {
    if validate_payload(&req).is_err() {
        return Err(AppError::BadRequest(
            "Please provide an email and password".to_string(),
        ));
    }

    let email = normalize_email(&req.email);
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

    let valid = verify_password(&req.password, &user.password_hash)?;
    req.password.zeroize();
    if !valid {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    let token = state.tokens.issue(user.id)?;
    tracing::info!("✅ User authenticated: {}", user.id);
    Ok((user, token))
}

/// Loads the identity behind a caller.
pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthenticated)
}

/// Resolves a bearer token to the caller it identifies. Tokens for identities
/// that no longer exist are rejected.
pub async fn resolve_caller(state: &AppState, token: &str) -> Result<Caller> {
    let user_id = state.tokens.verify(token)?;
    let user = current_user(state, user_id).await?;
    Ok(Caller::from(&user))
}

/// Updates the caller's own profile fields.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user_id` - The ID of the caller.
/// * `req` - The fields to change.
///
/// # Returns
///
/// A `Result` containing the updated `User`.
pub async fn update_details(
    state: &AppState,
    user_id: Uuid,
    req: UpdateDetailsRequest,
) -> Result<User> {
    validate_payload(&req)?;

    let changes = ProfileChanges {
        name: req.name.as_deref().map(|v| non_blank("name", v)).transpose()?,
        email: req.email.as_deref().map(normalize_email),
        university: req
            .university
            .as_deref()
            .map(|v| non_blank("university", v))
            .transpose()?,
        department: req
            .department
            .as_deref()
            .map(|v| non_blank("department", v))
            .transpose()?,
        contact_number: req.contact_number.map(|n| n.trim().to_string()),
    };

    let user = state.users.update_profile(user_id, changes).await?;
    tracing::info!("✅ Profile updated for user: {}", user_id);
    Ok(user)
}

/// Changes the caller's password after checking the current one, and issues
/// a fresh credential.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user_id` - The ID of the caller.
/// * `req` - The current and new passwords.
///
/// # Returns
///
/// A `Result` containing the new token.
pub async fn update_password(
    state: &AppState,
    user_id: Uuid,
    mut req: UpdatePasswordRequest,
) -> Result<String> {
    tracing::info!("🔑 Changing password for user: {}", user_id);
    validate_payload(&req)?;

    let user = current_user(state, user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::Authentication("Password is incorrect".to_string()));
    }

    let new_hash = hash_password(&req.new_password)?;
    req.current_password.zeroize();
    req.new_password.zeroize();

    state.users.update_password(user_id, new_hash).await?;
    let token = state.tokens.issue(user_id)?;

    tracing::info!("✅ Password changed for user: {}", user_id);
    Ok(token)
}

/// Grants the admin role to the listed, already registered, email addresses.
/// Unknown addresses are logged and skipped.
pub async fn promote_admins(state: &AppState, emails: &[String]) -> Result<()> {
    for email in emails {
        match state.users.find_by_email(&normalize_email(email)).await? {
            Some(user) if user.role == Role::Admin => {}
            Some(user) => {
                state.users.set_role(user.id, Role::Admin).await?;
                tracing::info!("✅ Granted admin role to {}", user.id);
            }
            None => tracing::warn!("⚠️ Admin email {} is not registered", email),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
