//! Capability Fetcher (§4.4): SSRF-hardened A2A agent-card and MCP
//! JSON-RPC probes, plus the bounded-concurrency batch runner that both
//! the graph-sync worker and the classification path reuse.

pub mod a2a;
pub mod batch;
pub mod mcp;
pub mod ssrf;

pub use a2a::{fetch_a2a_agent_card, A2aFetchResult};
pub use batch::{run_bounded, DEFAULT_CONCURRENCY};
pub use mcp::{fetch_mcp_capabilities, McpFetchResult, McpResource};
pub use ssrf::{admit, AdmissionError};
