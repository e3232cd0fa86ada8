//! Domain services used by the login flow and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `profile` owns username derivation and the profile merge-write; `session`
//! owns session tokens and the per-session auth-state channel.

pub mod profile;
pub mod session;
