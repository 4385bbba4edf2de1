//! Batch tooling for turning a line-delimited record dump into per-record
//! artifacts, running each artifact through an external summariser, and
//! attaching the generated text back onto the rows of a CSV table.

pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod naming;
pub mod runlog;
pub mod split;
pub mod stats;
pub mod table;
pub mod transform;

pub use artifact::{ArtifactFile, ArtifactKind, TransformJob};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{DispatchError, JobError, MergeError, SplitError, TableError};
pub use merge::{merge, merge_file, MatchStrategy, MergeMode, MergeOptions, MergeStats};
pub use naming::{sanitize_identifier, DuplicateResolver};
pub use runlog::RunLog;
pub use split::{split_records, SplitOptions, SplitStats};
pub use stats::ProcessingStats;
pub use table::{ColumnHandle, LineEnding, Table};
pub use transform::{CommandTransformer, Transformer};
