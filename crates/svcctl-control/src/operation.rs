//! Operation aggregation for report batching
//!
//! Many operations sharing one accounting key are folded into a single
//! operation before they are reported. Log entries are concatenated, the
//! time range widens, and metric values belonging to the same time series
//! (same metric name and [`metric_value::sign`] signature) are merged
//! according to the metric's kind.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use svcctl_common::{MergeError, MetricKind, MetricValue, MetricValueSet, Operation};
use tracing::{debug, warn};

use crate::metric_value::{self, earliest, latest_of, MergeRules};
use crate::signing::Signature;

/// Kind assumed for metric names missing from the kind mapping
pub const DEFAULT_KIND: MetricKind = MetricKind::Delta;

/// Values of one metric name, in insertion order, indexed by signature
#[derive(Debug, Default)]
struct MetricSeries {
    values: Vec<MetricValue>,
    by_signature: HashMap<Signature, usize>,
}

#[derive(Debug)]
struct Accumulated {
    /// Held operation with `metric_value_sets` kept empty
    operation: Operation,
    series: BTreeMap<String, MetricSeries>,
}

/// Folds operations into one
pub struct OperationAggregator {
    kinds: HashMap<String, MetricKind>,
    rules: MergeRules,
    state: Mutex<Accumulated>,
}

impl OperationAggregator {
    /// Start from `initial`; metric names absent from `kinds` merge as DELTA
    pub fn new(initial: Operation, kinds: Option<HashMap<String, MetricKind>>) -> Self {
        Self::with_rules(initial, kinds, MergeRules::default())
    }

    pub fn with_rules(
        mut initial: Operation,
        kinds: Option<HashMap<String, MetricKind>>,
        rules: MergeRules,
    ) -> Self {
        let value_sets = std::mem::take(&mut initial.metric_value_sets);
        let aggregator = Self {
            kinds: kinds.unwrap_or_default(),
            rules,
            state: Mutex::new(Accumulated {
                operation: initial,
                series: BTreeMap::new(),
            }),
        };

        {
            let mut state = aggregator.state.lock();
            for set in &value_sets {
                aggregator.merge_value_set(&mut state, set);
            }
        }
        aggregator
    }

    /// Kind used to merge values of `metric_name`
    pub fn kind_of(&self, metric_name: &str) -> MetricKind {
        self.kinds.get(metric_name).copied().unwrap_or(DEFAULT_KIND)
    }

    /// Fold `other` into the accumulated operation.
    ///
    /// Identity fields of `other` (name, consumer, labels) are not compared;
    /// callers group operations by accounting key before adding.
    pub fn add(&self, other: &Operation) {
        let mut state = self.state.lock();

        let held = &mut state.operation;
        held.log_entries.extend(other.log_entries.iter().cloned());
        held.start_time = earliest(held.start_time, other.start_time);
        held.end_time = latest_of(held.end_time, other.end_time);

        for set in &other.metric_value_sets {
            self.merge_value_set(&mut state, set);
        }

        debug!(
            operation_id = ?other.operation_id,
            metric_sets = other.metric_value_sets.len(),
            "Merged operation"
        );
    }

    /// Snapshot of the accumulated operation; metric names come out sorted
    pub fn as_operation(&self) -> Operation {
        let state = self.state.lock();
        let mut operation = state.operation.clone();
        operation.metric_value_sets = state
            .series
            .iter()
            .map(|(name, series)| MetricValueSet::new(name.clone(), series.values.clone()))
            .collect();
        operation
    }

    fn merge_value_set(&self, state: &mut Accumulated, set: &MetricValueSet) {
        let kind = self.kind_of(&set.metric_name);
        let series = state.series.entry(set.metric_name.clone()).or_default();

        for value in &set.metric_values {
            let signature = metric_value::sign(value);
            match series.by_signature.get(&signature) {
                Some(&idx) => {
                    let prior = &mut series.values[idx];
                    match self.rules.merge(kind, prior, value) {
                        Ok(merged) => *prior = merged,
                        // the increment is dropped, the running total kept
                        Err(e @ MergeError::Overflow(_)) => warn!(
                            metric = %set.metric_name,
                            error = %e,
                            "Metric total would overflow; keeping the accumulated value"
                        ),
                        Err(e) => {
                            warn!(
                                metric = %set.metric_name,
                                error = %e,
                                "Cannot merge metric values; keeping the latest"
                            );
                            *prior = value.clone();
                        }
                    }
                }
                None => {
                    series.by_signature.insert(signature, series.values.len());
                    series.values.push(value.clone());
                }
            }
        }
    }
}
