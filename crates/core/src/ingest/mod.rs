pub mod cache;
pub mod csv_file;
pub mod sheets;
pub mod source;
pub mod stats;
