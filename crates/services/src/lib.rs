pub mod research;
pub mod search;

pub use research::{ChatSection, Message, ResearchError, ResearchSession, SectionPhase};
pub use search::{SearchError, SearchProviderTrait, SearchResponse, TavilySearchProvider};
