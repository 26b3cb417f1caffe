pub mod metadata;
pub mod retention;
