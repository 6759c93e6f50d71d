//! Result registry for matbench: canonical keying, dual indexing,
//! deduplication and rollup of rolling settings, plus ingestion of result
//! directories written by the local backend.

mod duplicates;
mod export;
mod filters;
mod registry;
mod rewrite;
pub mod scan;

pub use duplicates::{Duplicate, DuplicateHandler, LogDuplicates, RemoveDuplicates};
pub use export::export_csv;
pub use filters::FilterSpec;
pub use registry::{
    AddOutcome, CollisionPolicy, EntryId, EntryResults, MatrixEntry, Registry, RegistryBuilder,
    DISAMBIGUATION_KEY,
};
pub use rewrite::{IdentityRewrite, RewriteSettings};
pub use scan::{
    scan_results, CleanMode, DirectoryListing, ParsedResult, ResultParser, ScanOptions,
    ScanSummary,
};
