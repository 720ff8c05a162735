#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{AnswerStore, InMemoryAnswerStore, LocalStorage, StorageError, answers_key};
