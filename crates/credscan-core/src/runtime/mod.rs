pub mod admission;
pub mod dispatcher;
pub mod orchestrator;
pub mod pipeline;
pub mod storage;
pub mod types;
