//! Embedding Client (§4.5): batched text-to-vector conversion via a
//! primary/fallback provider pair, shared text assembly, and cosine
//! similarity as a first-class utility.

mod client;
mod error;
mod provider;
mod similarity;
mod text;

pub use client::{EmbeddingClient, BATCH_CHUNK_SIZE};
pub use error::{EmbeddingError, EmbeddingResult};
pub use provider::{EmbeddingProvider, EmbeddingResponse, OpenAiEmbeddingProvider};
pub use similarity::cosine_similarity;
pub use text::{assemble_embed_text, MAX_EMBED_TEXT_CHARS};
