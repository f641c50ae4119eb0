//! Frequency distributions over free-text and categorical answers.
//!
//! Raw cells are cleaned, split on a multi-value delimiter, mapped to a
//! canonical label, counted, optionally threshold-filtered, ordered and
//! truncated. The result keeps display order.

use crate::util::{clean_cell, collapse_whitespace, is_null_like, percent, title_case};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Case-insensitive `raw -> canonical label` lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynonymTable {
    map: HashMap<String, String>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `variant` (any case, any spacing) as a spelling of `canonical`.
    pub fn insert(&mut self, variant: &str, canonical: &str) {
        self.map
            .insert(lookup_key(variant), collapse_whitespace(canonical));
    }

    /// Canonical labels register themselves, so every canonical label is also
    /// a lookup key.
    pub fn from_groups(groups: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::new();
        for (canonical, variants) in groups {
            table.insert(canonical, canonical);
            for v in variants {
                table.insert(v, canonical);
            }
        }
        table
    }

    pub fn get(&self, value: &str) -> Option<&str> {
        self.map.get(&lookup_key(value)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Synonym lookup, falling back to title-casing.
    pub fn canonicalize(&self, value: &str) -> String {
        match self.get(value) {
            Some(c) => c.to_string(),
            None => title_case(value),
        }
    }
}

fn lookup_key(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Knobs of [`aggregate`]. Defaults: split on `;`, no synonyms, sort by
/// descending count, no truncation, no threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOptions {
    pub delimiter: Option<String>,
    pub synonyms: SynonymTable,
    pub custom_order: Option<Vec<String>>,
    pub preserve_order: bool,
    pub top_n: Option<usize>,
    pub min_fraction: Option<f64>,
    /// Yes/no questions are never threshold-filtered.
    pub binary: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            delimiter: Some(";".to_string()),
            synonyms: SynonymTable::default(),
            custom_order: None,
            preserve_order: false,
            top_n: None,
            min_fraction: None,
            binary: false,
        }
    }
}

impl AggregateOptions {
    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Option<&str>) -> Self {
        self.delimiter = delimiter.filter(|d| !d.is_empty()).map(str::to_string);
        self
    }

    pub fn with_custom_order(mut self, order: Vec<String>) -> Self {
        self.custom_order = Some(order);
        self
    }

    pub fn with_preserve_order(mut self, preserve: bool) -> Self {
        self.preserve_order = preserve;
        self
    }

    pub fn with_top_n(mut self, n: Option<usize>) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_min_fraction(mut self, fraction: Option<f64>) -> Self {
        self.min_fraction = fraction;
        self
    }

    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
}

/// Ordered `label -> count` histogram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    entries: Vec<(String, usize)>,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    #[cfg(test)]
    pub fn get(&self, label: &str) -> Option<usize> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    /// Each label's share of the total, rounded to one decimal.
    pub fn percentages(&self) -> Vec<(&str, f64)> {
        let total = self.total();
        self.iter().map(|(l, c)| (l, percent(c, total))).collect()
    }

    /// Headline numbers shown next to a chart.
    pub fn summary(&self) -> Option<DistributionSummary> {
        let total = self.total();
        // First maximum wins, matching display order on ties.
        let (label, count) = self
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (l, c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((l, c)),
            })?;
        Some(DistributionSummary {
            total_responses: total,
            total_options: self.len(),
            most_common_option: label.to_string(),
            most_common_count: count,
            most_common_share: percent(count, total),
        })
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub total_responses: usize,
    pub total_options: usize,
    pub most_common_option: String,
    pub most_common_count: usize,
    pub most_common_share: f64,
}

/// Build a distribution from raw cells, one occurrence per (expanded) value.
pub fn aggregate<I, S>(values: I, opts: &AggregateOptions) -> Distribution
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    aggregate_weighted(values.into_iter().map(|v| (v, 1)), opts)
}

/// Build a distribution from pre-counted `(value, count)` pairs. Every part of
/// a multi-value cell receives the full weight of its cell.
pub fn aggregate_weighted<I, S>(pairs: I, opts: &AggregateOptions) -> Distribution
where
    I: IntoIterator<Item = (S, usize)>,
    S: AsRef<str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (raw, weight) in pairs {
        // Zero-weight pairs would surface as empty slices in a chart.
        if weight == 0 {
            continue;
        }
        let Some(cleaned) = clean_cell(raw.as_ref()) else {
            continue;
        };
        for part in split_values(&cleaned, opts.delimiter.as_deref()) {
            let label = opts.synonyms.canonicalize(&part);
            if label.is_empty() || is_null_like(&label) {
                continue;
            }
            match index.get(&label) {
                Some(&i) => counts[i].1 += weight,
                None => {
                    index.insert(label.clone(), counts.len());
                    counts.push((label, weight));
                }
            }
        }
    }

    let counts = apply_min_fraction(counts, opts);
    let mut entries = order_entries(counts, opts);
    if let Some(n) = opts.top_n {
        entries.truncate(n);
    }
    Distribution { entries }
}

fn split_values(cleaned: &str, delimiter: Option<&str>) -> Vec<String> {
    match delimiter {
        Some(d) if cleaned.contains(d) => cleaned.split(d).filter_map(clean_cell).collect(),
        _ => vec![cleaned.to_string()],
    }
}

fn apply_min_fraction(counts: Vec<(String, usize)>, opts: &AggregateOptions) -> Vec<(String, usize)> {
    let threshold = match opts.min_fraction {
        Some(f) if f > 0.0 && !opts.binary => f,
        _ => return counts,
    };
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return counts;
    }
    let kept: Vec<(String, usize)> = counts
        .iter()
        .filter(|(_, c)| *c as f64 / total as f64 > threshold)
        .cloned()
        .collect();
    // Filtering everything away would hide the chart entirely.
    if kept.is_empty() {
        counts
    } else {
        kept
    }
}

fn order_entries(mut counts: Vec<(String, usize)>, opts: &AggregateOptions) -> Vec<(String, usize)> {
    if let Some(order) = &opts.custom_order {
        let mut ordered = Vec::with_capacity(counts.len());
        for wanted in order {
            let wanted = opts.synonyms.canonicalize(&collapse_whitespace(wanted));
            if let Some(pos) = counts.iter().position(|(l, _)| *l == wanted) {
                ordered.push(counts.remove(pos));
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        ordered.extend(counts);
        return ordered;
    }
    if !opts.preserve_order {
        // `sort_by` is stable: equal counts keep encounter order.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funding_synonyms() -> SynonymTable {
        let mut t = SynonymTable::new();
        for v in ["extrabudgetary", "extra budgetary", "extra-budgetary"] {
            t.insert(v, "Extrabudgetary");
        }
        t.insert("regular budget", "Regular Budget");
        t.insert("regularbudget", "Regular Budget");
        t
    }

    fn pairs(d: &Distribution) -> Vec<(String, usize)> {
        d.iter().map(|(l, c)| (l.to_string(), c)).collect()
    }

    #[test]
    fn synonyms_merge_case_variants_and_blanks_drop() {
        let opts = AggregateOptions::default().with_synonyms(funding_synonyms());
        let d = aggregate(["extrabudgetary", "Regular Budget", "EXTRABUDGETARY", ""], &opts);
        assert_eq!(
            pairs(&d),
            vec![("Extrabudgetary".to_string(), 2), ("Regular Budget".to_string(), 1)]
        );
    }

    #[test]
    fn multi_values_count_separately() {
        let d = aggregate(["Training;Workshop", "training"], &AggregateOptions::default());
        assert_eq!(d.get("Training"), Some(2));
        assert_eq!(d.get("Workshop"), Some(1));
        assert_eq!(d.total(), 3);
    }

    #[test]
    fn null_sentinels_never_become_labels() {
        let d = aggregate(
            ["nan", "None", "  ", "Online; none ;", "NaN;Online"],
            &AggregateOptions::default(),
        );
        assert_eq!(pairs(&d), vec![("Online".to_string(), 2)]);
    }

    #[test]
    fn disabled_delimiter_keeps_values_whole() {
        let opts = AggregateOptions::default().with_delimiter(None);
        let d = aggregate(["a;b"], &opts);
        assert_eq!(d.labels().collect::<Vec<_>>(), vec!["A;b"]);
    }

    #[test]
    fn top_n_keeps_highest_counts_descending() {
        let mut values = Vec::new();
        for (label, n) in [("e", 2), ("a", 10), ("c", 6), ("b", 8), ("d", 4)] {
            values.extend(std::iter::repeat(label).take(n));
        }
        let opts = AggregateOptions::default().with_top_n(Some(3));
        let d = aggregate(values, &opts);
        assert_eq!(
            pairs(&d),
            vec![("A".to_string(), 10), ("B".to_string(), 8), ("C".to_string(), 6)]
        );
    }

    #[test]
    fn ties_keep_first_encounter_order() {
        let d = aggregate(["beta", "alpha", "gamma", "alpha", "beta"], &AggregateOptions::default());
        assert_eq!(d.labels().collect::<Vec<_>>(), vec!["Beta", "Alpha", "Gamma"]);
    }

    #[test]
    fn preserve_order_keeps_encounter_order() {
        let opts = AggregateOptions::default().with_preserve_order(true);
        let d = aggregate(["x", "y", "y", "z", "z", "z"], &opts);
        assert_eq!(d.labels().collect::<Vec<_>>(), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn custom_order_first_then_by_count() {
        let opts = AggregateOptions::default().with_custom_order(vec![
            "multistakeholder initiative".to_string(),
            "bilateral partnership".to_string(),
            "UN interagency initiative".to_string(),
            "campaign".to_string(),
        ]);
        let d = aggregate(
            [
                "event",
                "event",
                "event",
                "UN interagency initiative",
                "challenge",
                "Multistakeholder initiative",
                "challenge",
            ],
            &opts,
        );
        assert_eq!(
            d.labels().collect::<Vec<_>>(),
            vec!["Multistakeholder Initiative", "UN Interagency Initiative", "Event", "Challenge"]
        );
    }

    #[test]
    fn min_fraction_drops_rare_labels_unless_binary() {
        let values = ["a", "a", "a", "a", "a", "a", "a", "a", "b", "c"];
        let opts = AggregateOptions::default().with_min_fraction(Some(0.1));
        let d = aggregate(values, &opts);
        // 1/10 is not above 0.1
        assert_eq!(pairs(&d), vec![("A".to_string(), 8)]);
        assert!(d.total() <= values.len());

        let d = aggregate(values, &opts.clone().binary(true));
        assert_eq!(d.len(), 3);
        assert_eq!(d.total(), values.len());
    }

    #[test]
    fn min_fraction_that_removes_everything_keeps_counts() {
        let opts = AggregateOptions::default().with_min_fraction(Some(0.9));
        let d = aggregate(["a", "b", "c"], &opts);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn reaggregating_canonical_labels_is_idempotent() {
        let opts = AggregateOptions::default().with_synonyms(funding_synonyms());
        let first = aggregate(
            ["extra budgetary", "guidance/tools", "ILO report", "regularbudget", "Guidance/tools"],
            &opts,
        );
        let reingested: Vec<(String, usize)> = pairs(&first);
        let again = aggregate_weighted(reingested.iter().map(|(l, c)| (l.as_str(), *c)), &opts);
        assert_eq!(first, again);
    }

    #[test]
    fn weighted_pairs_sum_counts() {
        let opts = AggregateOptions::default().binary(true);
        let d = aggregate_weighted([("Yes", 12), ("No", 3), ("yes", 1), ("", 9)], &opts);
        assert_eq!(pairs(&d), vec![("Yes".to_string(), 13), ("No".to_string(), 3)]);
    }

    #[test]
    fn zero_weights_never_become_labels() {
        let opts = AggregateOptions::default().binary(true);
        let d = aggregate_weighted([("Yes", 3), ("Maybe", 0)], &opts);
        assert_eq!(pairs(&d), vec![("Yes".to_string(), 3)]);
        assert_eq!(d.summary().map(|s| s.total_options), Some(1));
        assert!(aggregate_weighted([("No", 0)], &opts).is_empty());
    }

    #[test]
    fn empty_input_gives_empty_distribution() {
        let d = aggregate(Vec::<String>::new(), &AggregateOptions::default());
        assert!(d.is_empty());
        assert!(d.summary().is_none());
        assert_eq!(serde_json::to_string(&d).unwrap(), "{}");
    }

    #[test]
    fn summary_and_json_follow_display_order() {
        let d = aggregate(["b", "a", "a", "b", "c"], &AggregateOptions::default());
        let s = d.summary().unwrap();
        assert_eq!(s.most_common_option, "B");
        assert_eq!(s.total_responses, 5);
        assert_eq!(s.most_common_share, 40.0);
        assert_eq!(serde_json::to_string(&d).unwrap(), r#"{"B":2,"A":2,"C":1}"#);
        assert_eq!(d.percentages()[2], ("C", 20.0));
    }
}
