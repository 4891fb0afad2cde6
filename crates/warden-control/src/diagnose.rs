//! Container lookup diagnosis.
//!
//! Answers "why can't warden find its container?": whether the runtime
//! answers at all, whether the configured name is among the containers it
//! lists, and which listed names look like near misses.

use serde::Serialize;
use tracing::{info, warn};

use warden_core::{ContainerDriver, ContainerStatus, ContainerSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub target: String,
    pub runtime_reachable: bool,
    pub target_found: bool,
    pub target_status: Option<ContainerStatus>,
    pub containers: Vec<ContainerSummary>,
    /// Containers whose name contains the target or is contained by it,
    /// ignoring case. The exact match is not included.
    pub similar: Vec<ContainerSummary>,
    pub error: Option<String>,
}

pub async fn diagnose(driver: &dyn ContainerDriver) -> Diagnosis {
    let target = driver.container_name().to_string();

    let containers = match driver.list().await {
        Ok(containers) => containers,
        Err(e) => {
            warn!(%target, error = %e, "container listing failed");
            return Diagnosis {
                target,
                runtime_reachable: false,
                target_found: false,
                target_status: None,
                containers: Vec::new(),
                similar: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    let found = containers.iter().find(|c| c.name == target);
    let target_status = found.map(|c| c.status);
    let similar = containers
        .iter()
        .filter(|c| c.name != target && is_similar(&c.name, &target))
        .cloned()
        .collect::<Vec<_>>();

    info!(
        %target,
        found = found.is_some(),
        total = containers.len(),
        similar = similar.len(),
        "container diagnosis"
    );

    Diagnosis {
        target_found: found.is_some(),
        target,
        runtime_reachable: true,
        target_status,
        containers,
        similar,
        error: None,
    }
}

fn is_similar(name: &str, target: &str) -> bool {
    let name = name.to_lowercase();
    let target = target.to_lowercase();
    name.contains(&target) || target.contains(&name)
}
