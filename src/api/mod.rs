pub mod query;
pub mod sync;
