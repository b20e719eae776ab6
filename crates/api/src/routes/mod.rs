pub mod chat;
pub mod health;
pub mod research;
pub mod search;

pub use chat::chat;
pub use health::health_check;
pub use research::{cancel_research, list_messages, list_sections, submit_research};
pub use search::search;
