pub mod mock;
pub mod ports;
pub mod tavily;

pub use mock::MockSearchProvider;
pub use ports::*;
pub use tavily::{normalize, TavilySearchProvider};
