//! Org/space lookup index.
//!
//! Built once per cycle from the org and space listings so that stats
//! workers can label targets without per-workload API calls.

use std::collections::HashMap;

use cfsd_core::{OrgUnit, SubUnit, SubUnitId};

/// Resolved names for one space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceInfo {
    pub name: String,
    pub org_name: String,
}

/// Space id → (space name, org name).
///
/// Immutable once built; shared read-only by every worker of a cycle.
#[derive(Debug, Default)]
pub struct LookupIndex {
    spaces: HashMap<SubUnitId, SpaceInfo>,
}

impl LookupIndex {
    /// Build the index from this cycle's listings.
    ///
    /// A space whose org is missing from `org_units` gets an empty org name.
    pub fn build(org_units: &[OrgUnit], sub_units: &[SubUnit]) -> Self {
        let orgs: HashMap<&str, &str> = org_units
            .iter()
            .map(|org| (org.id.as_str(), org.name.as_str()))
            .collect();

        let spaces = sub_units
            .iter()
            .map(|space| {
                let info = SpaceInfo {
                    name: space.name.clone(),
                    org_name: orgs
                        .get(space.org_unit_id.as_str())
                        .map(|name| name.to_string())
                        .unwrap_or_default(),
                };
                (space.id.clone(), info)
            })
            .collect();

        Self { spaces }
    }

    /// Space and org names for a space id. Unknown ids resolve to empty names.
    pub fn resolve(&self, sub_unit_id: &str) -> (&str, &str) {
        self.spaces
            .get(sub_unit_id)
            .map(|info| (info.name.as_str(), info.org_name.as_str()))
            .unwrap_or(("", ""))
    }

    /// Number of indexed spaces.
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
