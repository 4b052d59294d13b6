//! # Blogga (Blog Platform Backend)
//!
//! `blogga` is a multi-tenant blog platform backend. Users register and
//! authenticate, author posts and drafts, and manage profile preferences;
//! published content is readable by anyone with pagination.
//!
//! ## Identity Model (Credentials, Sessions, Tokens)
//!
//! A **credential** is the persisted user record: unique email and username,
//! bcrypt password digest, `Member`/`Admin` tier, and a one-way `verified`
//! flag confirmed through an email round trip.
//!
//! - **Sessions** are server-side state keyed by a random 256-bit token; the
//!   store keeps only its SHA-256 hash. The expiry window is rolling and is
//!   renewed on every resolved request.
//! - **Tokens** are stateless HS256 JWTs bound to a subject and a purpose
//!   (`access` or `verify-email`). They are never persisted and expire on
//!   their own; admin resources require one alongside the session as a
//!   second factor.
//! - Requests resolve identity through either proof: session cookie first,
//!   bearer access token second. The full user record is re-fetched from the
//!   store on each request, so authorization always sees current state.
//!
//! ## Authorization
//!
//! Handlers compose gates in a fixed order: session, then verified, then
//! admin tier, then token subject match. Login failures never reveal whether
//! the email or the password was wrong.

pub mod api;
pub mod cli;
pub mod domain;
pub mod store;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
