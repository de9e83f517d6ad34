//! Component health for the stats engine.
//!
//! Two components are tracked. The store gates everything: without it no
//! event can be recorded. The scheduler only affects how fresh rollups are,
//! so a failing daily job degrades the engine rather than taking it down.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Overall engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Events are recorded but rollups may be stale.
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Whether tracking calls can still be served.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ComponentState {
    /// Not reported yet.
    Pending,
    Up,
    Down(String),
}

#[derive(Debug)]
struct Observed {
    state: ComponentState,
    since: Option<DateTime<Utc>>,
}

/// Last reported state of one component.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    observed: RwLock<Observed>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            observed: RwLock::new(Observed {
                state: ComponentState::Pending,
                since: None,
            }),
        }
    }

    pub fn set_healthy(&self) {
        self.transition(ComponentState::Up);
    }

    pub fn set_unhealthy(&self, reason: impl Into<String>) {
        self.transition(ComponentState::Down(reason.into()));
    }

    // `since` moves only when the state actually changes
    fn transition(&self, next: ComponentState) {
        let mut observed = self.observed.write();
        if observed.state != next {
            observed.state = next;
            observed.since = Some(Utc::now());
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.observed.read().state == ComponentState::Up
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Failure reason, if the component is down.
    pub fn message(&self) -> Option<String> {
        match &self.observed.read().state {
            ComponentState::Down(reason) => Some(reason.clone()),
            ComponentState::Pending => Some("not checked yet".to_string()),
            ComponentState::Up => None,
        }
    }

    /// When the component entered its current state.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.observed.read().since
    }

    fn report(&self) -> ComponentHealthReport {
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: self.is_healthy(),
            message: self.message(),
            since: self.since(),
        }
    }
}

/// Engine health with per-component detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Health of the store and the scheduler.
pub struct HealthRegistry {
    pub store: ComponentHealth,
    pub scheduler: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            store: ComponentHealth::new("store"),
            scheduler: ComponentHealth::new("scheduler"),
        }
    }

    pub fn report(&self) -> HealthReport {
        let status = match (self.store.is_healthy(), self.scheduler.is_healthy()) {
            (false, _) => HealthStatus::Unhealthy,
            (true, false) => HealthStatus::Degraded,
            (true, true) => HealthStatus::Healthy,
        };

        HealthReport {
            status,
            components: vec![self.store.report(), self.scheduler.report()],
        }
    }

    /// Tracking calls need the store.
    pub fn is_ready(&self) -> bool {
        self.store.is_healthy()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static HEALTH: HealthRegistry = HealthRegistry::new();

/// Process-wide health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
