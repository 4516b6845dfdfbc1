pub mod loaders;
pub mod outcome;
pub mod profile;
pub mod question;
pub mod result_tree;
pub mod task;

pub use loaders::{load_rows_from_file, FileFormat};
pub use outcome::{Failure, FailureKind, Outcome};
pub use profile::{AnswerFormat, DatasetProfile};
pub use question::{partition_label, ModelInput, Partition, QuestionId, QuestionIdSource, Row};
pub use result_tree::{ResultTree, SplitResults};
pub use task::TaskMode;
