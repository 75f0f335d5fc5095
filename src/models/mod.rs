pub mod listing;
pub mod table;
