//! Text generation providers.

pub mod openrouter;
pub mod traits;

pub use openrouter::OpenRouterGenerator;
pub use traits::{Critique, Draft, LlmError, LlmResult, TextGenerator};
