pub mod locked_cell;

pub use locked_cell::LockedRefCell;
