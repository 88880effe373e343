//! A hand-written in-memory `RuntimeAdapter`, so the Controller and Module
//! Manager state machines are testable without a live Docker daemon (see
//! SPEC_FULL.md §E). Gated behind the `test-util` feature so it ships only
//! to dependents' dev-dependencies.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use discopanel_types::{Error, Result};
use tokio::sync::Mutex;

use crate::adapter::{ContainerStats, InspectResult, LogFrameStream, RuntimeAdapter, RuntimeStatus};
use crate::spec::ContainerSpec;

#[derive(Debug, Clone)]
struct MockContainer {
    status: RuntimeStatus,
    network_ip: IpAddr,
}

/// An in-memory stand-in for a container runtime. Every container is
/// immediately "running" on create; `fail_create`/`fail_exec` let tests
/// exercise the controller's failure-handling paths.
#[derive(Default)]
pub struct MockAdapter {
    containers: Mutex<HashMap<String, MockContainer>>,
    next_id: AtomicU64,
    next_ip_octet: AtomicU64,
    pub fail_create: std::sync::atomic::AtomicBool,
    pub exec_responses: Mutex<HashMap<String, String>>,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_ip_octet: AtomicU64::new(2),
            ..Default::default()
        })
    }

    pub async fn set_status(&self, id: &str, status: RuntimeStatus) {
        if let Some(c) = self.containers.lock().await.get_mut(id) {
            c.status = status;
        }
    }

    pub async fn queue_exec_response(&self, id: &str, response: impl Into<String>) {
        self.exec_responses.lock().await.insert(id.to_owned(), response.into());
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.containers.lock().await.contains_key(id)
    }
}

#[async_trait]
impl RuntimeAdapter for MockAdapter {
    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::ImageUnavailable(spec.image.clone()));
        }
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let octet = self.next_ip_octet.fetch_add(1, Ordering::SeqCst) as u8;
        self.containers.lock().await.insert(
            id.clone(),
            MockContainer {
                status: RuntimeStatus::Stopped,
                network_ip: IpAddr::V4(Ipv4Addr::new(172, 20, 0, octet)),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut containers = self.containers.lock().await;
        let container = containers.get_mut(id).ok_or_else(|| Error::not_found("container", id))?;
        container.status = RuntimeStatus::Running;
        Ok(())
    }

    async fn stop(&self, id: &str, _grace: Duration) -> Result<bool> {
        let mut containers = self.containers.lock().await;
        match containers.get_mut(id) {
            Some(c) => {
                c.status = RuntimeStatus::Stopped;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.containers.lock().await.remove(id);
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<InspectResult> {
        let containers = self.containers.lock().await;
        let container = containers.get(id).ok_or_else(|| Error::not_found("container", id))?;
        let mut networks = HashMap::new();
        networks.insert("discopanel".to_owned(), container.network_ip);
        Ok(InspectResult {
            status: container.status,
            networks,
            entrypoint: vec!["/start".to_owned()],
        })
    }

    async fn stats(&self, id: &str) -> Result<ContainerStats> {
        if !self.containers.lock().await.contains_key(id) {
            return Err(Error::not_found("container", id));
        }
        Ok(ContainerStats {
            cpu_percent: 3.5,
            memory_mb: 512.0,
            memory_limit_mb: 2048.0,
        })
    }

    async fn exec(&self, id: &str, argv: &[String]) -> Result<String> {
        if !self.containers.lock().await.contains_key(id) {
            return Err(Error::not_found("container", id));
        }
        let key = argv.join(" ");
        Ok(self.exec_responses.lock().await.get(&key).cloned().unwrap_or_default())
    }

    async fn logs(&self, id: &str) -> Result<LogFrameStream> {
        if !self.containers.lock().await.contains_key(id) {
            return Err(Error::not_found("container", id));
        }
        Ok(Box::pin(futures_util::stream::empty()))
    }

    async fn ensure_network(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn list_orphans(&self, tracked: &HashSet<String>) -> Result<Vec<String>> {
        let containers = self.containers.lock().await;
        Ok(containers.keys().filter(|id| !tracked.contains(*id)).cloned().collect())
    }
}
