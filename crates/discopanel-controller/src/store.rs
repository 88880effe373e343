//! Persistence seam for Servers. The backing store is an external
//! collaborator (§6); this trait is the shape the Controller depends on.

use async_trait::async_trait;
use discopanel_types::{Error, Result, Server};
use tokio::sync::RwLock;

#[async_trait]
pub trait ServerStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Server>>;
    async fn get(&self, id: &str) -> Result<Server>;
    async fn upsert(&self, server: &Server) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// A non-persistent, process-lifetime `ServerStore`. Drives the
/// controller's tests and gives the `discopanel` binary crate a runnable
/// default, since an on-disk schema is explicitly out of scope (§1).
#[derive(Default)]
pub struct InMemoryServerStore {
    servers: RwLock<std::collections::HashMap<String, Server>>,
}

#[async_trait]
impl ServerStore for InMemoryServerStore {
    async fn list(&self) -> Result<Vec<Server>> {
        Ok(self.servers.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Server> {
        self.servers.read().await.get(id).cloned().ok_or_else(|| Error::not_found("server", id))
    }

    async fn upsert(&self, server: &Server) -> Result<()> {
        self.servers.write().await.insert(server.id.clone(), server.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.servers.write().await.remove(id);
        Ok(())
    }
}
