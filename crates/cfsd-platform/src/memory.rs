//! In-memory platform.
//!
//! `StaticPlatform` serves a fixed set of workloads, orgs, spaces and
//! instances. Failures, delays and hung calls can be injected per listing
//! or per workload, and the number of concurrent instance fetches is
//! tracked so callers can check their fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use cfsd_core::{OrgUnit, RuntimeInstance, SubUnit, Workload, WorkloadId};

use crate::api::PlatformApi;
use crate::error::{PlatformError, PlatformResult};

#[derive(Default)]
struct Fixture {
    workloads: Vec<Workload>,
    org_units: Vec<OrgUnit>,
    sub_units: Vec<SubUnit>,
    instances: HashMap<WorkloadId, Vec<RuntimeInstance>>,
    fail_workload_listing: bool,
    fail_org_listing: bool,
    fail_sub_unit_listing: bool,
    failing_workloads: HashSet<WorkloadId>,
    hanging_workloads: HashSet<WorkloadId>,
}

/// A `PlatformApi` backed by in-memory data.
#[derive(Default)]
pub struct StaticPlatform {
    fixture: RwLock<Fixture>,
    fetch_delay: Option<Duration>,
    fetch_calls: AtomicUsize,
    workload_listings: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workload and the instances its stats call returns.
    pub fn with_workload(mut self, workload: Workload, instances: Vec<RuntimeInstance>) -> Self {
        let fixture = self.fixture.get_mut();
        fixture.instances.insert(workload.id.clone(), instances);
        fixture.workloads.push(workload);
        self
    }

    pub fn with_org_unit(mut self, id: &str, name: &str) -> Self {
        self.fixture.get_mut().org_units.push(OrgUnit {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_sub_unit(mut self, id: &str, name: &str, org_unit_id: &str) -> Self {
        self.fixture.get_mut().sub_units.push(SubUnit {
            id: id.to_string(),
            name: name.to_string(),
            org_unit_id: org_unit_id.to_string(),
        });
        self
    }

    /// Every instance fetch sleeps this long before answering.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn failing_workload_listing(mut self) -> Self {
        self.fixture.get_mut().fail_workload_listing = true;
        self
    }

    pub fn failing_org_listing(mut self) -> Self {
        self.fixture.get_mut().fail_org_listing = true;
        self
    }

    pub fn failing_sub_unit_listing(mut self) -> Self {
        self.fixture.get_mut().fail_sub_unit_listing = true;
        self
    }

    /// Instance fetches for this workload return an error.
    pub fn failing_instances_for(mut self, workload_id: &str) -> Self {
        self.fixture
            .get_mut()
            .failing_workloads
            .insert(workload_id.to_string());
        self
    }

    /// Instance fetches for this workload never complete.
    pub fn hanging_instances_for(mut self, workload_id: &str) -> Self {
        self.fixture
            .get_mut()
            .hanging_workloads
            .insert(workload_id.to_string());
        self
    }

    /// Replace the workload listing served by subsequent calls.
    pub async fn set_workloads(&self, workloads: Vec<(Workload, Vec<RuntimeInstance>)>) {
        let mut fixture = self.fixture.write().await;
        fixture.workloads.clear();
        fixture.instances.clear();
        for (workload, instances) in workloads {
            fixture.instances.insert(workload.id.clone(), instances);
            fixture.workloads.push(workload);
        }
    }

    /// Stop (or resume) hanging on a workload's instance fetch.
    pub async fn set_hanging(&self, workload_id: &str, hanging: bool) {
        let mut fixture = self.fixture.write().await;
        if hanging {
            fixture.hanging_workloads.insert(workload_id.to_string());
        } else {
            fixture.hanging_workloads.remove(workload_id);
        }
    }

    /// Total instance fetches served (including failed ones).
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of times the workload listing was requested.
    pub fn workload_listings(&self) -> usize {
        self.workload_listings.load(Ordering::SeqCst)
    }

    /// Highest number of instance fetches observed running at once.
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl PlatformApi for StaticPlatform {
    async fn list_workloads(&self) -> PlatformResult<Vec<Workload>> {
        self.workload_listings.fetch_add(1, Ordering::SeqCst);
        let fixture = self.fixture.read().await;
        if fixture.fail_workload_listing {
            return Err(PlatformError::Unavailable("workload listing".to_string()));
        }
        Ok(fixture.workloads.clone())
    }

    async fn list_org_units(&self) -> PlatformResult<Vec<OrgUnit>> {
        let fixture = self.fixture.read().await;
        if fixture.fail_org_listing {
            return Err(PlatformError::Unavailable("org listing".to_string()));
        }
        Ok(fixture.org_units.clone())
    }

    async fn list_sub_units(&self) -> PlatformResult<Vec<SubUnit>> {
        let fixture = self.fixture.read().await;
        if fixture.fail_sub_unit_listing {
            return Err(PlatformError::Unavailable("space listing".to_string()));
        }
        Ok(fixture.sub_units.clone())
    }

    async fn fetch_runtime_instances(&self, workload_id: &str) -> PlatformResult<Vec<RuntimeInstance>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let hanging = self.fixture.read().await.hanging_workloads.contains(workload_id);
        if hanging {
            std::future::pending::<()>().await;
        }

        let result = {
            let fixture = self.fixture.read().await;
            if fixture.failing_workloads.contains(workload_id) {
                Err(PlatformError::Unavailable(format!("stats for {workload_id}")))
            } else {
                Ok(fixture.instances.get(workload_id).cloned().unwrap_or_default())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
