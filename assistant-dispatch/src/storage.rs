use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{dispatcher::Dispatcher, error::Result};

/// Trait for storing and retrieving live conversations
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, dispatcher: Arc<Dispatcher>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Arc<Dispatcher>>>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<String>>;
}

/// In-memory implementation of SessionStorage
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Arc<Dispatcher>>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, dispatcher: Arc<Dispatcher>) -> Result<()> {
        self.sessions.insert(dispatcher.id().to_string(), dispatcher);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<Dispatcher>>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.sessions.iter().map(|entry| entry.key().clone()).collect())
    }
}
