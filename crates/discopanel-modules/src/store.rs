//! Persistence seams for Modules and Module Templates. The backing store is
//! an external collaborator (§6); these traits are the shape the Module
//! Manager depends on, mirroring the Runtime Adapter's "trait abstracts the
//! collaborator" pattern.

use async_trait::async_trait;
use discopanel_types::{Error, Module, ModuleTemplate, Result};
use tokio::sync::RwLock;

#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn list_for_server(&self, server_id: &str) -> Result<Vec<Module>>;
    async fn get(&self, id: &str) -> Result<Module>;
    async fn upsert(&self, module: &Module) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<ModuleTemplate>;
}

/// A non-persistent, process-lifetime `ModuleStore`/`TemplateStore`. Useful
/// to drive the manager's tests and to give the `discopanel` binary crate a
/// runnable default, since an on-disk schema is explicitly out of scope.
#[derive(Default)]
pub struct InMemoryModuleStore {
    modules: RwLock<std::collections::HashMap<String, Module>>,
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn list_for_server(&self, server_id: &str) -> Result<Vec<Module>> {
        Ok(self.modules.read().await.values().filter(|m| m.server_id == server_id).cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Module> {
        self.modules.read().await.get(id).cloned().ok_or_else(|| Error::not_found("module", id))
    }

    async fn upsert(&self, module: &Module) -> Result<()> {
        self.modules.write().await.insert(module.id.clone(), module.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.modules.write().await.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<std::collections::HashMap<String, ModuleTemplate>>,
}

impl InMemoryTemplateStore {
    pub async fn insert(&self, template: ModuleTemplate) {
        self.templates.write().await.insert(template.id.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get(&self, id: &str) -> Result<ModuleTemplate> {
        self.templates.read().await.get(id).cloned().ok_or_else(|| Error::not_found("module_template", id))
    }
}
