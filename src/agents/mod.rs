pub mod divergence;
pub mod rag;

pub use divergence::{DivergenceReviewAgent, DivergenceReviewInput};
pub use rag::{RagAgent, RagAgentInput, RagAgentOutput, RetrievalClient, MockRetrievalClient};
