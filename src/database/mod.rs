pub mod manager;
pub mod memory;
pub mod models;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryFeedbackStore;
pub use models::{Feedback, NewFeedback};
pub use store::{FeedbackStore, PgFeedbackStore, StoreError};
