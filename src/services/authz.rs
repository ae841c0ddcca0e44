//! Owner-or-admin authorization for mutating resource operations.
//!
//! Read operations (get, list, search) are public and never consult this
//! module. Update, delete and photo replacement always do.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::book::Book;
use crate::models::user::{Role, User};

/// The identity attached to an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// A resource with a single owning identity.
pub trait Owned {
    fn owner(&self) -> Uuid;
}

impl Owned for Book {
    fn owner(&self) -> Uuid {
        self.seller
    }
}

/// The outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden,
}

/// Decides whether `caller` may mutate `resource`.
///
/// - No IO
/// - No panics
pub fn decide<R: Owned + ?Sized>(caller: Option<&Caller>, resource: &R) -> Decision {
    match caller {
        None => Decision::DenyUnauthenticated,
        Some(caller) if caller.role == Role::Admin => Decision::Allow,
        Some(caller) if caller.id == resource.owner() => Decision::Allow,
        Some(_) => Decision::DenyForbidden,
    }
}

/// Runs [`decide`] and turns a denial into the matching error.
/// `action` completes the sentence "not authorized to ... this book".
pub fn authorize<R: Owned + ?Sized>(
    caller: Option<&Caller>,
    resource: &R,
    action: &str,
) -> Result<()> {
    match decide(caller, resource) {
        Decision::Allow => Ok(()),
        Decision::DenyUnauthenticated => Err(AppError::Unauthenticated),
        Decision::DenyForbidden => {
            let caller_id = caller.map(|c| c.id.to_string()).unwrap_or_default();
            tracing::warn!("🚫 User {} denied {} on {}", caller_id, action, resource.owner());
            Err(AppError::Forbidden(format!(
                "User {} is not authorized to {} this book",
                caller_id, action
            )))
        }
    }
}
