//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod annotation_change_repo;
pub mod annotation_repo;
pub mod vocabulary_repo;

pub use annotation_change_repo::AnnotationChangeRepo;
pub use annotation_repo::AnnotationRepo;
pub use vocabulary_repo::VocabularyRepo;
