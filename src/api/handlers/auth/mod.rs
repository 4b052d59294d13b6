//! Authentication core: passwords, sessions, tokens, and authorization gates.
//!
//! ## Identity Resolution
//!
//! Requests authenticate through one of two strategies sharing the
//! [`session::Authenticator`] contract: a session cookie backed by the
//! session store, or a bearer access token checked purely by signature and
//! expiry. Both re-fetch the credential from the store per request, so tier
//! changes and verification take effect immediately.
//!
//! ## Gate Ordering
//!
//! Protected handlers evaluate gates in a fixed order: session, then email
//! verification, then admin tier, then token subject. Each gate
//! short-circuits with a distinct response so clients can tell re-login
//! apart from re-verification.

pub(crate) mod gates;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod register;
pub(crate) mod session;
mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod token;
pub(crate) mod types;
pub(crate) mod verification;

pub use state::{AppState, AuthConfig};
