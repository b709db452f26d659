pub mod defer;
pub mod sync_cell;
