pub mod config;
pub mod db;
pub mod error;
pub mod router;
pub mod state;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod auth;
    pub mod book;
    pub mod user;
}

pub mod repositories {
    pub mod book;
    pub mod memory;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod authz;
    pub mod books;
    pub mod photos;
    pub mod search;
}

pub mod handlers {
    pub mod auth;
    pub mod books;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
    pub mod book;
}

pub mod client {
    pub mod credential_store;
    pub mod session;
    pub mod transport;
}

pub use config::Config;
pub use error::{AppError, Result};
pub use router::router;
pub use state::AppState;
