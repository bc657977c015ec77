//! Client-side state containers.
//!
//! DESIGN
//! ======
//! State is owned by containers injected with their remote collaborators,
//! not by module-level singletons. Consumers read snapshots and subscribe
//! to changes; only the container itself mutates.

pub mod auth;
