//! Snapshot of journal history shared by every analytics component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisResult, ValidationError};
use crate::storage::{Category, DecisionEntry, DecisionStore, OutcomeRecord};
use crate::timeframe::{TimeRange, Timeframe};

/// Optional narrowing applied after the timeframe selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Only decisions in this category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Only decisions carrying this tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl EntryFilter {
    /// Restrict to one category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Restrict to decisions carrying a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Whether an entry passes the filter.
    pub fn matches(&self, entry: &DecisionEntry) -> bool {
        self.category.map_or(true, |c| entry.category == c)
            && self.tag.as_ref().map_or(true, |t| entry.tags.contains(t))
    }
}

/// Everything that shapes which entries an operation sees, apart from the
/// timeframe itself.
#[derive(Debug, Clone, Default)]
pub struct AnalysisScope {
    /// Entry filter
    pub filter: EntryFilter,
    /// Fixed "now" for relative timeframes; the wall clock when unset
    pub reference_time: Option<DateTime<Utc>>,
}

impl AnalysisScope {
    /// Resolve a timeframe into the concrete range to query.
    pub fn resolve(&self, timeframe: &Timeframe) -> Result<TimeRange, ValidationError> {
        timeframe.resolve(self.reference_time.unwrap_or_else(Utc::now))
    }
}

/// A decision paired with its outcome, if one has been recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDecision {
    /// The decision as recorded
    pub entry: DecisionEntry,
    /// Its outcome, when attached
    pub outcome: Option<OutcomeRecord>,
}

impl ObservedDecision {
    /// Decision id
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// Correctness judgment, `None` without an outcome or while unresolved.
    pub fn correct(&self) -> Option<bool> {
        self.outcome.as_ref().and_then(|o| o.correct.as_bool())
    }
}

/// The decisions inside one analysis window, in timestamp order.
#[derive(Debug, Clone)]
pub struct JournalSnapshot {
    range: TimeRange,
    decisions: Vec<ObservedDecision>,
}

impl JournalSnapshot {
    /// Read the window from the store, apply the filter, and re-check every
    /// record. A record that fails validation aborts the load.
    pub async fn load<S: DecisionStore + ?Sized>(
        store: &S,
        range: TimeRange,
        filter: &EntryFilter,
    ) -> AnalysisResult<Self> {
        let entries = store.entries_in_range(range.start, range.end).await?;

        let mut decisions = Vec::with_capacity(entries.len());
        for entry in entries {
            if !filter.matches(&entry) {
                continue;
            }
            let outcome = store.outcome_for(&entry.id).await?;
            decisions.push(ObservedDecision { entry, outcome });
        }

        let snapshot = Self::from_decisions(range, decisions)?;
        debug!(
            start = %range.start,
            end = %range.end,
            decisions = snapshot.decisions.len(),
            "Journal snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Build a snapshot from records already in memory.
    ///
    /// Records outside `range` are dropped; the rest are validated and sorted
    /// by timestamp then id.
    pub fn from_decisions(
        range: TimeRange,
        decisions: Vec<ObservedDecision>,
    ) -> Result<Self, ValidationError> {
        let mut kept = Vec::with_capacity(decisions.len());
        for decision in decisions {
            if !range.contains(&decision.entry.timestamp) {
                continue;
            }
            decision.entry.validate()?;
            if let Some(outcome) = &decision.outcome {
                outcome.validate_against(&decision.entry)?;
            }
            kept.push(decision);
        }
        kept.sort_by(|a, b| {
            a.entry
                .timestamp
                .cmp(&b.entry.timestamp)
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        Ok(Self {
            range,
            decisions: kept,
        })
    }

    /// The window this snapshot covers.
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// Every decision in the window.
    pub fn decisions(&self) -> &[ObservedDecision] {
        &self.decisions
    }

    /// Decisions with an outcome attached, judged or not.
    pub fn with_outcome(&self) -> impl Iterator<Item = (&ObservedDecision, &OutcomeRecord)> {
        self.decisions
            .iter()
            .filter_map(|d| d.outcome.as_ref().map(|o| (d, o)))
    }

    /// Decisions whose correctness has been judged.
    pub fn resolved(&self) -> impl Iterator<Item = (&ObservedDecision, bool)> {
        self.decisions
            .iter()
            .filter_map(|d| d.correct().map(|c| (d, c)))
    }

    /// Resolved decisions that carry a stated confidence.
    pub fn calibration_samples(&self) -> impl Iterator<Item = (&ObservedDecision, f64, bool)> {
        self.resolved()
            .filter_map(|(d, correct)| d.entry.confidence.map(|c| (d, c, correct)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, StorageError};
    use crate::storage::MockDecisionStore;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn range() -> TimeRange {
        TimeRange::new(base(), base() + Duration::days(30)).unwrap()
    }

    fn decision(title: &str, offset_days: i64) -> DecisionEntry {
        DecisionEntry::new(title, Category::Technical, "Expected")
            .with_timestamp(base() + Duration::days(offset_days))
    }

    #[test]
    fn test_filter_matches() {
        let entry = decision("a", 0).with_tag("infra");
        assert!(EntryFilter::default().matches(&entry));
        assert!(EntryFilter::default()
            .with_category(Category::Technical)
            .matches(&entry));
        assert!(!EntryFilter::default()
            .with_category(Category::People)
            .matches(&entry));
        assert!(EntryFilter::default().with_tag("infra").matches(&entry));
        assert!(!EntryFilter::default().with_tag("hiring").matches(&entry));
    }

    #[test]
    fn test_from_decisions_drops_out_of_range_and_sorts() {
        let late = decision("late", 5);
        let early = decision("early", 1);
        let outside = decision("outside", 45);
        let snapshot = JournalSnapshot::from_decisions(
            range(),
            vec![late, outside, early]
                .into_iter()
                .map(|entry| ObservedDecision {
                    entry,
                    outcome: None,
                })
                .collect(),
        )
        .unwrap();

        let titles: Vec<_> = snapshot
            .decisions()
            .iter()
            .map(|d| d.entry.title.as_str())
            .collect();
        assert_eq!(titles, vec!["early", "late"]);
    }

    #[test]
    fn test_outcome_states_are_distinct() {
        let judged = decision("judged", 1);
        let pending = decision("pending", 2);
        let bare = decision("bare", 3).with_confidence(0.5);
        let decisions = vec![
            ObservedDecision {
                outcome: Some(
                    OutcomeRecord::new(judged.id.clone(), "ok", 7, 7)
                        .with_correct(true)
                        .with_resolved_at(base() + Duration::days(10)),
                ),
                entry: judged.with_confidence(0.6),
            },
            ObservedDecision {
                outcome: Some(
                    OutcomeRecord::new(pending.id.clone(), "tbd", 4, 6)
                        .with_resolved_at(base() + Duration::days(10)),
                ),
                entry: pending,
            },
            ObservedDecision {
                entry: bare,
                outcome: None,
            },
        ];
        let snapshot = JournalSnapshot::from_decisions(range(), decisions).unwrap();

        assert_eq!(snapshot.decisions().len(), 3);
        assert_eq!(snapshot.with_outcome().count(), 2);
        assert_eq!(snapshot.resolved().count(), 1);
        assert_eq!(snapshot.calibration_samples().count(), 1);
    }

    #[test]
    fn test_invalid_record_aborts_snapshot() {
        let entry = decision("bad", 1);
        let outcome = OutcomeRecord::new(entry.id.clone(), "x", 5, 5)
            .with_resolved_at(base() - Duration::days(1));
        let err = JournalSnapshot::from_decisions(
            range(),
            vec![ObservedDecision {
                entry,
                outcome: Some(outcome),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::ResolvedBeforeDecision { .. }));
    }

    #[tokio::test]
    async fn test_load_skips_outcome_lookup_for_filtered_entries() {
        let kept = decision("kept", 1).with_tag("q2");
        let skipped = decision("skipped", 2);
        let kept_id = kept.id.clone();

        let mut store = MockDecisionStore::new();
        let entries = vec![kept, skipped];
        store
            .expect_entries_in_range()
            .times(1)
            .returning(move |_, _| Ok(entries.clone()));
        store
            .expect_outcome_for()
            .withf(move |id| id == kept_id)
            .times(1)
            .returning(|_| Ok(None));

        let snapshot = JournalSnapshot::load(&store, range(), &EntryFilter::default().with_tag("q2"))
            .await
            .unwrap();
        assert_eq!(snapshot.decisions().len(), 1);
    }

    #[tokio::test]
    async fn test_load_propagates_store_errors() {
        let mut store = MockDecisionStore::new();
        store.expect_entries_in_range().returning(|_, _| {
            Err(StorageError::Query {
                message: "disk I/O error".to_string(),
            })
        });

        let err = JournalSnapshot::load(&store, range(), &EntryFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Storage(StorageError::Query { .. })));
    }
}
