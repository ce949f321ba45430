//! Session State & Repository (spec.md §4.7).

pub mod checksum;
pub mod repository;

pub use repository::SessionRepository;
