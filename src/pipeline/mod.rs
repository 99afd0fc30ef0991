//! Data-preparation stages. Each one is a bounded batch loop over a SQLite
//! table that commits once per batch and can be rerun after a crash.

pub mod annotate;
pub mod features;
pub mod guard;
pub mod import;
pub mod merge;

pub use annotate::{AnnotationSummary, annotate_table, annotate_with_uci};
pub use features::{FeatureSummary, add_feature_columns};
pub use guard::{Outcome, ProgressGuard};
pub use import::{ImportSummary, import_csv};
pub use merge::{MergeSummary, merge_and_shuffle};
