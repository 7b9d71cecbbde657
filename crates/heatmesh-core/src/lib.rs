pub mod frame;
pub mod ingest;
pub mod registry;
pub mod wire;
