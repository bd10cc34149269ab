pub mod cell_table;

pub use cell_table::{mix64, CellSlot, CellTable};
