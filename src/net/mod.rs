//! Remote backend boundary.
//!
//! ARCHITECTURE
//! ============
//! The hosted service is consumed through four narrow contracts
//! (`backend`): session lifecycle, profile lookup, record access and
//! object storage. `rest` implements all four against the service's HTTP
//! surface; `types` holds the wire DTOs shared across them.

pub mod backend;
pub mod rest;
pub mod types;

#[cfg(test)]
pub mod testing;
