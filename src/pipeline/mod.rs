//! Job update pipeline.
//!
//! Every `POST /update` flows through:
//! 1. `RecordStore::find()`: current record by job number
//! 2. `Extractor::extract()`: LLM turns email text into structured fields
//! 3. `compute::derive_update()`: normalisation and the update payload
//! 4. `RecordStore::patch()`: write back only what changed

pub mod compute;
pub mod extraction;
pub mod processor;
pub mod types;

pub use processor::UpdateProcessor;
