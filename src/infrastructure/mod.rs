pub mod dataset_source;
pub mod file_source;
pub mod hf_source;
pub mod result_sink;

pub use dataset_source::{count_rows, open_source, DatasetSource};
pub use file_source::FileSource;
pub use hf_source::HuggingFaceSource;
pub use result_sink::{JsonFileSink, ResultSink};
