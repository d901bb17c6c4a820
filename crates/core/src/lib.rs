//! Domain logic for the ADE annotation service.
//!
//! Everything in this crate is pure: no database, no async, no I/O. The
//! `db` and `api` crates build on these types.

pub mod change;
pub mod differ;
pub mod entities;
pub mod error;
pub mod export;
pub mod highlight;
pub mod jsonl;
pub mod locator;
pub mod paging;
pub mod stats;
pub mod types;
pub mod vocabulary;
