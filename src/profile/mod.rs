//! Profile Engine (§4.8): live (interpreter-probe) and offline
//! (delimited-file) tabular profiling sharing one `TableProfile` model.

pub mod live;
pub mod offline;
pub mod types;

pub use live::{discover_tabular_variables, profile_variable, TabularVariableSummary};
pub use offline::profile_file;
pub use types::{ColumnProfile, NumericStats, TableProfile};
