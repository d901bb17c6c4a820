//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for inserts and patches
//! - Filter/query structs consumed by the matching repository

pub mod annotation;
pub mod change;
pub mod vocabulary;
