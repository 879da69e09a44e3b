//! 记忆层：进程内上下文存储

pub mod context;

pub use context::ContextStore;
