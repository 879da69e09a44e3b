//! 推理层：后端抽象、模拟后端与降级选择器

pub mod mock;
pub mod router;
pub mod traits;

pub use mock::MockBackend;
pub use router::{InferenceResult, InferenceSelector, TaskClassifier, TaskComplexity};
pub use traits::{InferenceBackend, LlmError};
