//! Login page behavior independent of HTTP.
//!
//! ARCHITECTURE
//! ============
//! `form` holds the credential form, `dispatch` runs sign-in attempts against
//! the injected identity provider and document store, and `gate` decides what
//! the dashboard shows. Route handlers in `crate::routes` translate these into
//! HTML, cookies and redirects.

pub mod dispatch;
pub mod form;
pub mod gate;
