pub mod json_loader;

pub use json_loader::{load_rows_from_file, parse_rows, FileFormat};
