//! Conflict resolution between a resident marker and an incoming reference.
//!
//! | resident          | incoming revision | overwrite | decision   |
//! |-------------------|-------------------|-----------|------------|
//! | none              | any               | any       | `Fetch`    |
//! | same revision     | same              | false     | `Skip`     |
//! | same revision     | same              | true      | `Refetch`  |
//! | other revision    | different         | false     | `Conflict` |
//! | other revision    | different         | true      | `Overwrite`|
//!
//! The resolver is pure; the engine performs whatever it decides.

use crate::identifier::RemoteReference;
use crate::store::SyncMarker;

/// What to do with one incoming reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing resident, fetch for the first time
    Fetch,
    /// Requested revision already resident
    Skip,
    /// Requested revision resident, restore pristine content
    Refetch,
    /// Another revision is resident and overwrite was not requested
    Conflict { resident: String, requested: String },
    /// Another revision is resident, replace it
    Overwrite { previous: String },
}

impl Decision {
    /// Whether this decision needs the provider to fetch content.
    pub fn fetches(&self) -> bool {
        matches!(self, Self::Fetch | Self::Refetch | Self::Overwrite { .. })
    }
}

/// Decide what to do with `incoming` given the resident marker.
pub fn decide(existing: Option<&SyncMarker>, incoming: &RemoteReference, overwrite: bool) -> Decision {
    let Some(marker) = existing else {
        return Decision::Fetch;
    };

    let decision = match (marker.revision == incoming.revision(), overwrite) {
        (true, false) => Decision::Skip,
        (true, true) => Decision::Refetch,
        (false, false) => Decision::Conflict {
            resident: marker.revision.clone(),
            requested: incoming.revision().to_string(),
        },
        (false, true) => Decision::Overwrite {
            previous: marker.revision.clone(),
        },
    };
    tracing::debug!(module = %incoming, resident = %marker.revision, ?decision, "resolved");
    decision
}
