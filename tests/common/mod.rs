#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use warden::{
    AccessValidator, Clock, Config, IdentityResolver, MemorySink, ResourceProbe, Role, SessionId,
    UserContext, WardenError,
};

/// Identity resolver backed by a fixed user→role map.
pub struct MapIdentityResolver {
    users: HashMap<String, Role>,
}

impl MapIdentityResolver {
    pub fn new(users: &[(&str, Role)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(id, role)| (id.to_string(), *role))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for MapIdentityResolver {
    async fn resolve(
        &self,
        user_id: &str,
        session_id: Option<&SessionId>,
    ) -> Result<Option<UserContext>, WardenError> {
        Ok(self.users.get(user_id).map(|role| {
            let mut ctx = UserContext::new(user_id, *role);
            ctx.session_id = session_id.copied();
            ctx
        }))
    }
}

/// Identity resolver that never answers within any reasonable timeout.
pub struct HangingIdentityResolver;

#[async_trait]
impl IdentityResolver for HangingIdentityResolver {
    async fn resolve(
        &self,
        _user_id: &str,
        _session_id: Option<&SessionId>,
    ) -> Result<Option<UserContext>, WardenError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(None)
    }
}

/// Resource probe with a fixed answer.
pub struct StaticResourceProbe {
    pub exists: bool,
}

#[async_trait]
impl ResourceProbe for StaticResourceProbe {
    async fn exists(&self, _resource_id: &str) -> Result<bool, WardenError> {
        Ok(self.exists)
    }
}

/// Resource probe whose backing store is down.
pub struct FailingResourceProbe;

#[async_trait]
impl ResourceProbe for FailingResourceProbe {
    async fn exists(&self, _resource_id: &str) -> Result<bool, WardenError> {
        Err(WardenError::Internal("object store unreachable".to_string()))
    }
}

/// Resource probe that never answers.
pub struct HangingResourceProbe;

#[async_trait]
impl ResourceProbe for HangingResourceProbe {
    async fn exists(&self, _resource_id: &str) -> Result<bool, WardenError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(true)
    }
}

/// Validator over map-backed identities and an always-there resource,
/// recording audit events into a memory sink.
pub fn build_validator(
    users: &[(&str, Role)],
    clock: Clock,
) -> (AccessValidator, Arc<MemorySink>) {
    build_validator_with(
        users,
        Arc::new(StaticResourceProbe { exists: true }),
        clock,
    )
}

pub fn build_validator_with(
    users: &[(&str, Role)],
    resources: Arc<dyn ResourceProbe>,
    clock: Clock,
) -> (AccessValidator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(256));
    let validator = AccessValidator::with_clock(
        &Config::test_config(),
        Arc::new(MapIdentityResolver::new(users)),
        resources,
        sink.clone(),
        clock,
    )
    .expect("validator construction");
    (validator, sink)
}
