use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use super::scope_role::ScopeRoleResolver;
use crate::errors::AppResult;
use crate::models::scope::ScopeRef;
use crate::store::MembershipStore;

/// Collects an actor's roles across the applications sharing a role space
/// with the target application.
///
/// Applications in project-service mode act as one mesh: a role on any
/// sibling counts on all of them. Other applications only see their own roles.
#[derive(Clone)]
pub struct AppRoleAggregator {
    store: Arc<dyn MembershipStore>,
    scope_roles: ScopeRoleResolver,
    fanout_limit: usize,
    task_timeout: Duration,
}

impl AppRoleAggregator {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        scope_roles: ScopeRoleResolver,
        fanout_limit: usize,
        task_timeout: Duration,
    ) -> Self {
        Self {
            store,
            scope_roles,
            fanout_limit: fanout_limit.max(1),
            task_timeout,
        }
    }

    /// Application ids whose roles apply to `app_id`, target included.
    pub async fn role_space(&self, app_id: u64) -> AppResult<Vec<u64>> {
        let mut ids = BTreeSet::from([app_id]);
        if let Some(app) = self.store.application(app_id).await? {
            if app.is_project_service() {
                let siblings = self.store.applications_by_mode(app.project_id, &app.mode).await?;
                ids.extend(siblings.into_iter().map(|sibling| sibling.id));
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Union of the roles resolved on every application of the role space.
    ///
    /// A sibling that errors or exceeds the timeout contributes no roles.
    pub async fn roles(&self, user_id: &str, app_id: u64) -> AppResult<Vec<String>> {
        let apps = self.role_space(app_id).await?;

        let collected = Arc::new(Mutex::new(BTreeSet::<String>::new()));
        let permits = Arc::new(Semaphore::new(self.fanout_limit));
        let mut tasks = JoinSet::new();

        for sibling in apps {
            let resolver = self.scope_roles.clone();
            let collected = Arc::clone(&collected);
            let permits = Arc::clone(&permits);
            let user_id = user_id.to_string();
            let task_timeout = self.task_timeout;

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let scope = ScopeRef::app(sibling);
                match tokio::time::timeout(task_timeout, resolver.roles(&user_id, scope)).await {
                    Ok(Ok(roles)) => collected.lock().await.extend(roles),
                    Ok(Err(err)) => {
                        tracing::warn!(user_id = %user_id, app_id = sibling, error = %err, "sibling role lookup failed");
                    }
                    Err(_) => {
                        tracing::warn!(user_id = %user_id, app_id = sibling, "sibling role lookup timed out");
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(user_id, error = %err, "sibling role task aborted");
            }
        }

        let roles = collected.lock().await;
        tracing::debug!(user_id, app_id, roles = ?*roles, "aggregated application roles");
        Ok(roles.iter().cloned().collect())
    }
}
