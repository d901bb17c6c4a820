pub mod annotations;
pub mod changes;
pub mod stats;
pub mod transfer;
pub mod vocabulary;
