//! Domain services built on the backend contracts.
//!
//! ARCHITECTURE
//! ============
//! Service modules own storefront logic (role resolution, catalog reads,
//! product publishing) so the state container and the CLI stay focused on
//! lifecycle and presentation.

pub mod catalog;
pub mod products;
pub mod profile;
