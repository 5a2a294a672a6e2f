pub mod error;
pub mod extract;
pub mod pipeline;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod transfer;
