//! GraphQL client for the upstream chain indexer: the `agents` pull
//! (§4.10 step 1) and the `feedbacks` pull (§4.12).

pub mod agents;
pub mod client;
pub mod error;
pub mod feedback;
mod lenient;

pub use agents::{pull_agents, AgentsPull, ParsedAgent, AGENTS_PAGE_SIZE, AGENTS_SAFETY_CAP};
pub use client::UpstreamClient;
pub use error::{UpstreamError, UpstreamResult};
pub use feedback::{pull_feedback, FeedbackPull, ParsedFeedback, FEEDBACK_PAGE_SIZE, FEEDBACK_SAFETY_CAP};
pub use lenient::ParseWarning;
