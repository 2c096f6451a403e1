//! Product deduplication: apply a classifier grouping to product lines
//!
//! A dedupe never touches a line's own name or counters. It only writes
//! `canonical_group_id`, and all of those writes for a scope commit together
//! or not at all. Undo clears them, which restores the listing exactly.

use lsa_common::{uuid_utils, Clock, SingleFlight};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use super::product_classifier::{ClassifierError, NameGroup, ProductClassifier};
use super::scope::ReportScope;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{ActivityDetails, DedupResult, MergeGroup, MergedGroupSummary, ProductLine, UndoResult};

/// In-flight classifier calls keyed by owner and scope
pub type ClassifierFlights = SingleFlight<(Uuid, String), Result<Vec<NameGroup>, ClassifierError>>;

/// Upper bound on ids bound into one UPDATE statement
const BIND_CHUNK: usize = 500;

pub struct ProductDeduplicator {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    classifier: Arc<dyn ProductClassifier>,
    flights: Arc<ClassifierFlights>,
    timeout: Duration,
}

/// Distinct names in first-seen order
fn distinct_names(lines: &[ProductLine]) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|line| seen.insert(line.name.as_str()))
        .map(|line| line.name.clone())
        .collect()
}

/// Reject groupings that reference unknown names, overlap or reuse a canonical name
///
/// Group ids derive from the canonical name, so two groups sharing one would
/// collapse into a single merge record.
pub fn validate_groups(names: &[String], groups: &[NameGroup]) -> Result<(), ClassifierError> {
    let known: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut canonical: HashSet<&str> = HashSet::new();

    for group in groups {
        if group.canonical_name.trim().is_empty() {
            return Err(ClassifierError::Malformed("group without canonical name".to_string()));
        }
        if !canonical.insert(group.canonical_name.as_str()) {
            return Err(ClassifierError::Malformed(format!(
                "canonical name '{}' used by more than one group",
                group.canonical_name
            )));
        }
        if group.names.is_empty() {
            return Err(ClassifierError::Malformed(format!(
                "group '{}' has no names",
                group.canonical_name
            )));
        }
        for name in &group.names {
            if !known.contains(name.as_str()) {
                return Err(ClassifierError::Malformed(format!("unknown name '{}'", name)));
            }
            if !assigned.insert(name.as_str()) {
                return Err(ClassifierError::Malformed(format!(
                    "name '{}' assigned more than once",
                    name
                )));
            }
        }
    }
    Ok(())
}

async fn clear_in_chunks(conn: &mut SqliteConnection, line_ids: &[Uuid]) -> ApiResult<u64> {
    let mut cleared = 0;
    for chunk in line_ids.chunks(BIND_CHUNK) {
        cleared += db::products::clear_groups(&mut *conn, chunk).await?;
    }
    Ok(cleared)
}

impl ProductDeduplicator {
    pub fn new(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        classifier: Arc<dyn ProductClassifier>,
        flights: Arc<ClassifierFlights>,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            clock,
            classifier,
            flights,
            timeout,
        }
    }

    async fn lines_in_scope(&self, scope: &ReportScope) -> ApiResult<Vec<ProductLine>> {
        let lines = db::products::list_in_scope(&self.db, &scope.product_filter()).await?;
        Ok(lines
            .into_iter()
            .filter(|line| scope.matches_product_name(&line.name))
            .collect())
    }

    /// Call the classifier once per owner and scope, bounded by the timeout
    async fn classify(&self, owner_id: Uuid, scope_key: &str, names: Vec<String>) -> ApiResult<Vec<NameGroup>> {
        let classifier = Arc::clone(&self.classifier);
        let timeout = self.timeout;
        let started = Instant::now();
        let count = names.len();

        let outcome = self
            .flights
            .run((owner_id, scope_key.to_string()), || async move {
                match tokio::time::timeout(timeout, classifier.classify(&names)).await {
                    Ok(result) => result,
                    Err(_) => Err(ClassifierError::Timeout(timeout.as_millis() as u64)),
                }
            })
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(groups) => {
                info!(
                    owner_id = %owner_id,
                    classifier = self.classifier.name(),
                    names = count,
                    groups = groups.len(),
                    elapsed_ms,
                    "Product names classified"
                );
                Ok(groups)
            }
            Err(e) => {
                warn!(
                    owner_id = %owner_id,
                    classifier = self.classifier.name(),
                    elapsed_ms,
                    error = %e,
                    "Product classification failed"
                );
                Err(ApiError::UpstreamUnavailable(e.to_string()))
            }
        }
    }

    /// Group the scope's product lines into canonical products
    ///
    /// Re-running with the same classifier output reproduces the same
    /// assignments and merge records.
    pub async fn dedupe(&self, scope: &ReportScope) -> ApiResult<DedupResult> {
        let scope_key = scope.scope_key();
        let lines = self.lines_in_scope(scope).await?;
        let names = distinct_names(&lines);
        if names.is_empty() {
            return Ok(DedupResult {
                total_original: 0,
                total_groups: 0,
                merged_groups: Vec::new(),
            });
        }

        let groups = self.classify(scope.owner_id, &scope_key, names.clone()).await?;
        validate_groups(&names, &groups).map_err(|e| ApiError::UpstreamUnavailable(e.to_string()))?;

        let merged: Vec<&NameGroup> = groups.iter().filter(|g| g.names.len() > 1).collect();
        let now = self.clock.now();
        let owner = scope.owner_id.to_string();
        let all_ids: Vec<Uuid> = lines.iter().map(|line| line.id).collect();

        let mut tx = self.db.begin().await?;
        clear_in_chunks(&mut tx, &all_ids).await?;

        let mut summaries = Vec::with_capacity(merged.len());
        for group in &merged {
            let members: HashSet<&str> = group.names.iter().map(String::as_str).collect();
            let member_ids: Vec<Uuid> = lines
                .iter()
                .filter(|line| members.contains(line.name.as_str()))
                .map(|line| line.id)
                .collect();

            let group_id = uuid_utils::stable_id(&[&owner, &scope_key, &group.canonical_name]);
            for chunk in member_ids.chunks(BIND_CHUNK) {
                db::products::assign_group(&mut tx, &group_id, chunk).await?;
            }
            db::products::upsert_group(
                &mut tx,
                &MergeGroup {
                    id: group_id,
                    owner_id: scope.owner_id,
                    scope_key: scope_key.clone(),
                    canonical_name: group.canonical_name.clone(),
                    merged_names: group.names.clone(),
                    member_count: member_ids.len() as i64,
                    created_at: now,
                },
            )
            .await?;

            summaries.push(MergedGroupSummary {
                canonical_name: group.canonical_name.clone(),
                merged_names: group.names.clone(),
                count: group.names.len(),
            });
        }

        let pruned = db::products::prune_orphan_groups(&mut tx, scope.owner_id).await?;
        db::activity::record(
            &mut *tx,
            scope.owner_id,
            &ActivityDetails::Dedup {
                scope_key: scope_key.clone(),
                merged_groups: summaries.len(),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        let absorbed: usize = merged.iter().map(|g| g.names.len() - 1).sum();
        let result = DedupResult {
            total_original: names.len(),
            total_groups: names.len() - absorbed,
            merged_groups: summaries,
        };

        info!(
            owner_id = %scope.owner_id,
            scope_key = %scope_key,
            lines = lines.len(),
            total_original = result.total_original,
            total_groups = result.total_groups,
            merged_groups = result.merged_groups.len(),
            pruned_groups = pruned,
            "Products deduplicated"
        );

        Ok(result)
    }

    /// Clear every canonical assignment in scope
    pub async fn undo(&self, scope: &ReportScope) -> ApiResult<UndoResult> {
        let scope_key = scope.scope_key();
        let grouped: Vec<Uuid> = self
            .lines_in_scope(scope)
            .await?
            .into_iter()
            .filter(|line| line.canonical_group_id.is_some())
            .map(|line| line.id)
            .collect();
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let cleared_lines = clear_in_chunks(&mut tx, &grouped).await?;
        let removed_groups = db::products::prune_orphan_groups(&mut tx, scope.owner_id).await?;
        db::activity::record(
            &mut *tx,
            scope.owner_id,
            &ActivityDetails::UndoDedup {
                scope_key: scope_key.clone(),
                cleared_lines,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            owner_id = %scope.owner_id,
            scope_key = %scope_key,
            cleared_lines,
            removed_groups,
            "Product deduplication undone"
        );

        Ok(UndoResult {
            cleared_lines,
            removed_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn group(canonical: &str, members: &[&str]) -> NameGroup {
        NameGroup {
            canonical_name: canonical.to_string(),
            names: names(members),
        }
    }

    #[test]
    fn test_valid_grouping_accepted() {
        let input = names(&["A", "a", "B"]);
        assert!(validate_groups(&input, &[group("A", &["A", "a"]), group("B", &["B"])]).is_ok());
        // Names left out of every group are allowed
        assert!(validate_groups(&input, &[group("A", &["A", "a"])]).is_ok());
    }

    #[test]
    fn test_unknown_name_rejected() {
        let input = names(&["A", "B"]);
        let err = validate_groups(&input, &[group("A", &["A", "Z"])]).unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[test]
    fn test_overlapping_groups_rejected() {
        let input = names(&["A", "B", "C"]);
        assert!(validate_groups(&input, &[group("A", &["A", "B"]), group("C", &["C", "B"])]).is_err());
        assert!(validate_groups(&input, &[group("A", &["A", "A"])]).is_err());
    }

    #[test]
    fn test_repeated_canonical_name_rejected() {
        let input = names(&["A", "a", "B", "b"]);
        let err = validate_groups(&input, &[group("A", &["A", "a"]), group("A", &["B", "b"])]).unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[test]
    fn test_empty_group_rejected() {
        let input = names(&["A"]);
        assert!(validate_groups(&input, &[group("A", &[])]).is_err());
        assert!(validate_groups(&input, &[group(" ", &["A"])]).is_err());
    }
}
