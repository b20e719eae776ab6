pub mod consumer;
pub mod errors;
pub mod models;
pub mod prompt;
pub mod service;

pub use consumer::{FrameEffect, StreamConsumer};
pub use errors::ResearchError;
pub use models::{ChatSection, Message, Role, SectionPhase};
pub use prompt::{build_messages, compose_prompt, ACKNOWLEDGEMENT};
pub use service::{ActiveResearch, ResearchSession, SearchOptions};
