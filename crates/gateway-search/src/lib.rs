//! Query Planner (§4.14): HyDE query expansion, filter compilation,
//! vector search, optional reranking, and response assembly. This is the
//! one crate the HTTP server's search endpoints call into directly.

pub mod error;
pub mod generative;
pub mod hyde;
pub mod match_reasons;
pub mod planner;
pub mod reranker;
pub mod types;

pub use error::{SearchError, SearchResult};
pub use generative::{GenerativeProvider, OpenAiGenerativeProvider};
pub use hyde::{HydeCache, HydeExpander, HydeExpansion};
pub use planner::QueryPlanner;
pub use reranker::{HttpReranker, NoopReranker, Reranker};
pub use types::{
    AgentSummary, ChainBreakdown, HydeMetadata, RerankerMetadata, SearchRequest, SearchResponse, SortField,
    SortOrder, SortSpec, DEFAULT_LIMIT, MAX_LIMIT,
};
