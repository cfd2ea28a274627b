pub mod auth;

pub use auth::TrustedUser;
