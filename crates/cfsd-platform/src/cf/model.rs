//! Wire types for the Cloud Foundry v2 API and UAA token endpoint.

use std::collections::HashMap;

use serde::Deserialize;

use cfsd_core::{OrgUnit, RuntimeInstance, SubUnit, Workload, WorkloadState};

/// `GET /v2/info`
#[derive(Debug, Deserialize)]
pub(crate) struct Info {
    pub token_endpoint: String,
}

/// UAA `POST /oauth/token` response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// One page of a v2 listing.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<E> {
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default = "Vec::new")]
    pub resources: Vec<Resource<E>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Resource<E> {
    pub metadata: Metadata,
    pub entity: E,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Metadata {
    pub guid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppEntity {
    pub name: String,
    pub state: WorkloadState,
    pub space_guid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrgEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpaceEntity {
    pub name: String,
    pub organization_guid: String,
}

/// `GET /v2/apps/:guid/stats`, keyed by instance index.
pub(crate) type AppStats = HashMap<String, InstanceStats>;

#[derive(Debug, Deserialize)]
pub(crate) struct InstanceStats {
    #[serde(default)]
    pub stats: Option<StatsBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsBody {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl From<Resource<AppEntity>> for Workload {
    fn from(r: Resource<AppEntity>) -> Self {
        Workload {
            id: r.metadata.guid,
            name: r.entity.name,
            state: r.entity.state,
            sub_unit_id: r.entity.space_guid,
        }
    }
}

impl From<Resource<OrgEntity>> for OrgUnit {
    fn from(r: Resource<OrgEntity>) -> Self {
        OrgUnit {
            id: r.metadata.guid,
            name: r.entity.name,
        }
    }
}

impl From<Resource<SpaceEntity>> for SubUnit {
    fn from(r: Resource<SpaceEntity>) -> Self {
        SubUnit {
            id: r.metadata.guid,
            name: r.entity.name,
            org_unit_id: r.entity.organization_guid,
        }
    }
}

/// Flatten a stats response into instances ordered by index.
///
/// Instances that are down report no host and are skipped.
pub(crate) fn instances_from_stats(stats: AppStats) -> Vec<RuntimeInstance> {
    let mut indexed: Vec<(u32, RuntimeInstance)> = stats
        .into_iter()
        .filter_map(|(index, entry)| {
            let body = entry.stats?;
            let host = body.host.filter(|h| !h.is_empty())?;
            let index = index.parse::<u32>().unwrap_or(u32::MAX);
            Some((
                index,
                RuntimeInstance {
                    host,
                    port: body.port.unwrap_or(0),
                },
            ))
        })
        .collect();

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, inst)| inst).collect()
}
