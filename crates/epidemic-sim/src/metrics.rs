//! The residue metric: how far replica stores have diverged.

use epidemic_core::model::Record;
use std::collections::BTreeMap;

/// Count how many keys disagree across a set of replica stores.
///
/// A key is divergent if the `(deleted, value, ts)` tuple differs across
/// any two replicas that hold it — and "absent" counts as its own distinct
/// value, so a replica that hasn't received a key yet while another has
/// already applied it is itself a divergence, not a pass.
/// Residue of zero means full convergence.
#[must_use]
pub fn residue(stores: &[&BTreeMap<String, Record>]) -> usize {
    if stores.is_empty() {
        return 0;
    }

    let mut keys: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for store in stores {
        keys.extend(store.keys().map(String::as_str));
    }

    let mut diff = 0;
    for key in keys {
        let mut baseline: Option<Option<(bool, Option<serde_json::Value>, u64, &str)>> = None;
        for store in stores {
            let tup = store.get(key).map(Record::divergence_key);
            match &baseline {
                None => baseline = Some(tup),
                Some(base) if *base != tup => {
                    diff += 1;
                    break;
                }
                Some(_) => {}
            }
        }
    }
    diff
}

/// One line of the metrics time series a run emits every `metrics_every` ticks.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSample {
    pub tick: u64,
    pub residue: usize,
    pub msgs_sent: u64,
    pub msgs_dropped: u64,
    pub ops_sent: u64,
}
