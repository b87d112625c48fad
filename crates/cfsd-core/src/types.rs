//! Domain types for service discovery.
//!
//! Platform records (`Workload`, `OrgUnit`, `SubUnit`, `RuntimeInstance`)
//! are read-only views pulled from the platform API once per refresh
//! cycle. `TargetGroup` and `Snapshot` are what gets published for the
//! monitoring system to scrape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a workload (an app GUID on Cloud Foundry).
pub type WorkloadId = String;

/// Unique identifier for an organization.
pub type OrgUnitId = String;

/// Unique identifier for a space.
pub type SubUnitId = String;

/// Label carrying the workload name.
pub const LABEL_JOB: &str = "job";
/// Label carrying the platform API address the targets were discovered from.
pub const LABEL_PLATFORM: &str = "cf";
/// Label carrying the owning space name.
pub const LABEL_SPACE: &str = "space";
/// Label carrying the owning organization name.
pub const LABEL_ORG: &str = "org";

// ── Platform records ──────────────────────────────────────────────

/// Desired state of a workload as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkloadState {
    Started,
    Stopped,
    #[serde(other)]
    Unknown,
}

/// One application instance group deployed on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    pub name: String,
    pub state: WorkloadState,
    /// Space that owns this workload.
    pub sub_unit_id: SubUnitId,
}

impl Workload {
    pub fn new(id: &str, name: &str, state: WorkloadState, sub_unit_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            state,
            sub_unit_id: sub_unit_id.to_string(),
        }
    }

    /// Only started workloads are scraped.
    pub fn is_running(&self) -> bool {
        self.state == WorkloadState::Started
    }
}

/// Top-level organizational grouping (a Cloud Foundry org).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: OrgUnitId,
    pub name: String,
}

/// Grouping nested under an org (a Cloud Foundry space).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubUnit {
    pub id: SubUnitId,
    pub name: String,
    pub org_unit_id: OrgUnitId,
}

/// One running copy of a workload, reachable at `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInstance {
    pub host: String,
    pub port: u16,
}

impl RuntimeInstance {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Scrape address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Published records ─────────────────────────────────────────────

/// A scrape-target record in the Prometheus file_sd format.
///
/// `targets` is always serialized, even when empty, so a workload whose
/// instances could not be fetched still shows up with its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    /// Build the group for a workload.
    ///
    /// Every label is always present; unresolved space or org names are
    /// passed in as empty strings.
    pub fn for_workload(
        workload: &Workload,
        instances: &[RuntimeInstance],
        platform_address: &str,
        space: &str,
        org: &str,
    ) -> Self {
        let labels = BTreeMap::from([
            (LABEL_JOB.to_string(), workload.name.clone()),
            (LABEL_PLATFORM.to_string(), platform_address.to_string()),
            (LABEL_SPACE.to_string(), space.to_string()),
            (LABEL_ORG.to_string(), org.to_string()),
        ]);

        Self {
            targets: instances.iter().map(RuntimeInstance::address).collect(),
            labels,
        }
    }

    /// Value of a label, if set.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// The full published artifact: every target group from one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub groups: Vec<TargetGroup>,
}

impl Snapshot {
    pub fn new(groups: Vec<TargetGroup>) -> Self {
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of scrape addresses across all groups.
    pub fn target_count(&self) -> usize {
        self.groups.iter().map(|g| g.targets.len()).sum()
    }

    /// Pretty-printed JSON array, the on-disk artifact format.
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
