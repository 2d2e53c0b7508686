// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project state store contract (spec §3, §5 "State store": "treated as
//! read-through with an implementation-provided snapshot/reload boundary;
//! writes are performed only via `setProject`"). The concrete persistence
//! (file, database, remote service) is an external collaborator; the core
//! only depends on [`ProjectStore`].

use async_trait::async_trait;

use crate::data::ProjectRecord;

/// Read-through project record lookup, with the single write path the core
/// is allowed to use.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, project_name: &str) -> Option<ProjectRecord>;
    async fn list_projects(&self) -> Vec<ProjectRecord>;
    async fn set_project(&self, record: ProjectRecord);
}

/// An in-memory [`ProjectStore`] snapshot, reloadable from an external
/// source. Suitable as the production store when project records are
/// bootstrapped once at startup and mutated only through `setProject`.
pub struct InMemoryProjectStore {
    projects: tokio::sync::RwLock<std::collections::BTreeMap<String, ProjectRecord>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self { projects: tokio::sync::RwLock::new(std::collections::BTreeMap::new()) }
    }

    /// Replace the entire snapshot, e.g. after a reload from disk.
    pub async fn reload(&self, records: impl IntoIterator<Item = ProjectRecord>) {
        let mut projects = self.projects.write().await;
        projects.clear();
        for record in records {
            projects.insert(record.project_name.clone(), record);
        }
    }
}

impl Default for InMemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn get_project(&self, project_name: &str) -> Option<ProjectRecord> {
        self.projects.read().await.get(project_name).cloned()
    }

    async fn list_projects(&self) -> Vec<ProjectRecord> {
        self.projects.read().await.values().cloned().collect()
    }

    async fn set_project(&self, record: ProjectRecord) {
        self.projects.write().await.insert(record.project_name.clone(), record);
    }
}

#[cfg(test)]
#[path = "project_store_tests.rs"]
mod tests;
