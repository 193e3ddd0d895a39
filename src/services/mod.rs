pub mod classifier;
pub mod ingest;
pub mod queue;
pub mod shutdown;
pub mod status;
pub mod synthesizer;
