//! Authoritative GSLB DNS server: view-based responses, active health
//! checks, and a packed-message rotation cache over a hot-reloadable
//! zone store.
//!
//! Grounded on `examples/fwxs-hunk`'s module layout (`error/`, a thin
//! `cli`/`main` pair, `actix-web` for the HTTP side) generalized from a
//! single-purpose exfiltration listener to the GSLB core described in
//! `SPEC_FULL.md`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod dns;
pub mod error;
pub mod health;
pub mod state;
