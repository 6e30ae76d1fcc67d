pub mod sqlite;

pub use sqlite::CostStore;
