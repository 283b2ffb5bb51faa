pub mod column;
pub mod controller;
pub mod error;
pub mod filter;
pub mod record;
pub mod schema;
pub mod selection;
pub mod sort;
pub mod value;

pub use column::{get_columns, Column, ColumnKind, ColumnRegistry, RecordType};
pub use controller::GridController;
pub use error::{ColumnError, SchemaError, ValidationError};
pub use filter::{FilterState, FilterValue};
pub use record::{Fields, Record, RecordId};
pub use selection::SelectionSet;
pub use sort::{SortDirection, SortState};
pub use value::Value;
