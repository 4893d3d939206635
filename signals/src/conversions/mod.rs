//! Conversions from decoded signals to destination rows.

mod row;

pub use row::signal_to_row;
