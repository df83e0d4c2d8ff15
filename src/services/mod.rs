pub mod lead_finder;
pub mod openai_client;
pub mod query_orchestrator;

pub use lead_finder::*;
pub use openai_client::*;
pub use query_orchestrator::*;
