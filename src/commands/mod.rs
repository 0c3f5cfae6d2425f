//! Diff engine: ingestion controllers, classification and the run loop.

pub mod compare;
pub mod diff;
pub mod ingest;

pub use compare::{
    reference_set, Comparator, Mode, ReferenceReader, ReferenceSet, ReferenceWriter, Verdict,
};
pub use diff::{run, DiffCommand, DiffStats};
pub use ingest::{ingest_primary, ingest_reference, EndReason, IngestController, Phase, SideReport};
