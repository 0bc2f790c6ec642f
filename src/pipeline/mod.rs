pub mod audit;
pub mod checksum;
pub mod classification;
pub mod consensus;
pub mod example_store;
pub mod extraction;
pub mod judgment;
pub mod ollama;
pub mod ports;
pub mod processor; // Document processing orchestrator
pub mod registry;
pub mod response;
pub mod retry;
pub mod trail;

pub use processor::{DocumentProcessor, ProcessingResult, ProcessorError};
