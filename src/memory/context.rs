//! 上下文存储：跨请求共享的键值对（如最近一次推理结果）
//!
//! 单把 std Mutex，读写都很短，不跨 await 持锁。

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

#[derive(Debug, Default)]
pub struct ContextStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖写入
    pub fn store_context(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if let Ok(mut entries) = self.entries.lock() {
            tracing::debug!(%key, "Context stored");
            entries.insert(key, value.into());
        }
    }

    pub fn get_context(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_store_and_get() {
        let store = ContextStore::new();
        assert!(store.is_empty());
        store.store_context("last_inference", "hello");
        store.store_context("last_inference", "world");
        assert_eq!(store.get_context("last_inference"), Some(Value::from("world")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove("last_inference"), Some(Value::from("world")));
        assert!(store.get_context("last_inference").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = Arc::new(ContextStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.store_context(format!("k{i}"), i);
                    store.get_context(&format!("k{i}"))
                })
            })
            .collect();
        for (i, h) in futures_util::future::join_all(handles).await.into_iter().enumerate() {
            assert_eq!(h.unwrap(), Some(Value::from(i)));
        }
        assert_eq!(store.len(), 16);
    }
}
