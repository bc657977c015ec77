//! Client toolkit for a hosted storefront backend.
//!
//! ARCHITECTURE
//! ============
//! Every hard operation (credential exchange, row access control, file
//! storage) is owned by the remote service. This crate supplies the typed
//! contracts for that service (`net`), a REST implementation of them
//! (`net::rest`), the auth/session/role state container consumers read
//! (`state::auth`), and the storefront domain services built on the
//! contracts (`services`).
//!
//! DESIGN
//! ======
//! Contracts are traits so the state container and services can be driven
//! by mock backends in tests. The container is injected with its
//! collaborators rather than reaching for module-level globals.

pub mod config;
pub mod net;
pub mod services;
pub mod state;
