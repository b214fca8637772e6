//! Merging aggregator output into a dataset.
//!
//! Contributions are deduplicated by `(repository, contributor, metric,
//! source)` before summing, so the same upstream event delivered twice (by
//! overlapping pages or by merging the same output again) counts once.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::aggregate::RepoOutcome;
use crate::models::{
    ContributionRecord, Dataset, Metric, Mode, RepoId, RepoStatus, RepositoryEntry, TimeWindow,
};
use crate::store::SCHEMA_VERSION;

/// Run-level fields of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetHeader {
    pub generated_at: DateTime<Utc>,
    pub orgs: Vec<String>,
    pub window: TimeWindow,
    pub mode: Mode,
}

/// Aggregation result for one repository.
#[derive(Debug, Clone)]
pub struct RepoResult {
    pub repo: RepoId,
    pub outcome: RepoOutcome,
}

pub fn merge(header: DatasetHeader, results: &[RepoResult]) -> Dataset {
    let mut statuses: BTreeMap<RepoId, RepoStatus> = BTreeMap::new();
    for result in results {
        let status = match &result.outcome {
            RepoOutcome::Collected(_) => RepoStatus::Complete,
            RepoOutcome::Partial { reason, .. } => RepoStatus::Partial {
                reason: reason.clone(),
            },
            RepoOutcome::Degraded { reason } => RepoStatus::Degraded {
                reason: reason.clone(),
            },
        };
        let merged = match statuses.remove(&result.repo) {
            Some(current) => current.worst(status),
            None => status,
        };
        statuses.insert(result.repo.clone(), merged);
    }

    let mut seen = BTreeSet::new();
    let mut totals: BTreeMap<(RepoId, String, Metric), u64> = BTreeMap::new();
    let mut duplicates = 0usize;

    for result in results {
        let contributions = match &result.outcome {
            RepoOutcome::Collected(contributions) => contributions,
            RepoOutcome::Partial { contributions, .. } => contributions,
            RepoOutcome::Degraded { .. } => continue,
        };
        if statuses.get(&result.repo).is_some_and(RepoStatus::is_degraded) {
            continue;
        }
        for c in contributions {
            let key = (
                c.repo.clone(),
                c.contributor.clone(),
                c.metric,
                c.source.clone(),
            );
            if !seen.insert(key) {
                duplicates += 1;
                continue;
            }
            *totals
                .entry((c.repo.clone(), c.contributor.clone(), c.metric))
                .or_default() += c.value;
        }
    }
    if duplicates > 0 {
        debug!("Dropped {} duplicate contributions", duplicates);
    }

    let records = totals
        .into_iter()
        .filter(|(_, value)| *value > 0)
        .map(|((repo, contributor, metric), value)| ContributionRecord {
            org: repo.org,
            repo: repo.name,
            contributor,
            metric,
            value,
        })
        .collect();

    let repositories = statuses
        .into_iter()
        .map(|(id, status)| RepositoryEntry {
            org: id.org,
            name: id.name,
            status,
        })
        .collect();

    Dataset {
        schema_version: SCHEMA_VERSION,
        generated_at: header.generated_at,
        orgs: header.orgs,
        window: header.window,
        mode: header.mode,
        repositories,
        records,
    }
}
