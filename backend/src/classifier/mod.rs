pub mod error;
pub mod models;
pub mod orchestrator;
pub mod sink;

pub use error::ClassifyError;
pub use models::{ClassificationRequest, ClassificationResult, Prediction, Requested};
pub use orchestrator::{Classifier, postprocess};
pub use sink::{LogResultSink, ResultSink};
