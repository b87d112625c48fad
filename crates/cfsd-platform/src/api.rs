//! The platform capability consumed by the refresh engine.

use std::future::Future;

use cfsd_core::{OrgUnit, RuntimeInstance, SubUnit, Workload};

use crate::error::PlatformResult;

/// Read-only view of the platform.
///
/// Implementations are shared across the stats workers of a cycle, so
/// every call must be safe to issue concurrently.
pub trait PlatformApi: Send + Sync + 'static {
    /// All workloads, in any state.
    fn list_workloads(&self) -> impl Future<Output = PlatformResult<Vec<Workload>>> + Send;

    /// All orgs.
    fn list_org_units(&self) -> impl Future<Output = PlatformResult<Vec<OrgUnit>>> + Send;

    /// All spaces.
    fn list_sub_units(&self) -> impl Future<Output = PlatformResult<Vec<SubUnit>>> + Send;

    /// Running instances of one workload.
    fn fetch_runtime_instances(
        &self,
        workload_id: &str,
    ) -> impl Future<Output = PlatformResult<Vec<RuntimeInstance>>> + Send;
}
