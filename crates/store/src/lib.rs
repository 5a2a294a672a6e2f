pub mod catalog;
pub mod cursor_store;
pub mod error;
pub mod mem;
pub mod query;
pub mod sink;
pub mod source;
