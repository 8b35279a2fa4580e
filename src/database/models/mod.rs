pub mod feedback;

pub use feedback::{Feedback, NewFeedback};
