//! Login credential checks and session token generation

pub mod auth;

pub use auth::{Authenticator, PasswordAuthenticator, constant_time_eq, generate_token, hash_password};
