pub mod fields;
pub mod logging;

pub use logging::short_file_name;
