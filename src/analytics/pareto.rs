//! Pareto ranking: cumulative shares, threshold lookup, Top-N and ABC.
//!
//! Every function here is pure and total. Inputs are assumed to be in
//! ranking order already (descending profit); nothing re-sorts.
use super::{fsum, round2};
use smallvec::SmallVec;

/// Default cut-off of class A, in cumulative percent.
pub const DEFAULT_THRESHOLD_A: f64 = 80.0;
/// Default cut-off of class B, in cumulative percent.
pub const DEFAULT_THRESHOLD_B: f64 = 95.0;

/// Running sum over `values` as a percentage of their total.
/// A zero total gives an all-zero series of the same length.
pub fn cumulative_percent(values: &[f64]) -> Vec<f64> {
    let total = fsum(values);
    if total == 0.0 {
        return vec![0.0; values.len()];
    }
    let mut acc = super::CompensatedSum::default();
    values
        .iter()
        .map(|&v| {
            acc.add(v);
            acc.value() * 100.0 / total
        })
        .collect()
}

/// First index whose cumulative value reaches `threshold`.
///
/// `-1` for an empty series. When nothing reaches the threshold the last
/// index is returned, so callers always get a position to cut at.
pub fn threshold_index(series: &[f64], threshold: f64) -> i64 {
    if series.is_empty() {
        return -1;
    }
    series
        .iter()
        .position(|&c| c >= threshold)
        .unwrap_or(series.len() - 1) as i64
}

/// First `n` items. `n <= 0` is empty, `n > len` is everything.
pub fn top_n<T>(items: &[T], n: i64) -> &[T] {
    if n <= 0 {
        return &[];
    }
    let n = usize::try_from(n).unwrap_or(usize::MAX).min(items.len());
    &items[..n]
}

/// Each value as a percentage of `total`; zeros when `total` is 0.
pub fn share_percent(values: &[f64], total: f64) -> Vec<f64> {
    if total == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v * 100.0 / total).collect()
}

/// Share of total profit held by the selected labels.
/// `None` when nothing is selected.
pub fn selected_share(labels: &[String], profits: &[f64], selected: &[String]) -> Option<f64> {
    if selected.is_empty() {
        return None;
    }
    let total = fsum(profits);
    if total == 0.0 {
        return Some(0.0);
    }
    let picked: Vec<f64> = labels
        .iter()
        .zip(profits)
        .filter(|(l, _)| selected.contains(l))
        .map(|(_, &p)| p)
        .collect();
    Some(round2(fsum(&picked) * 100.0 / total))
}

// ── ABC ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    pub const ALL: [AbcClass; 3] = [AbcClass::A, AbcClass::B, AbcClass::C];

    /// Class of a row sitting at cumulative percentage `cum`.
    /// The thresholds are not checked against each other.
    #[inline]
    pub fn classify(cum: f64, threshold_a: f64, threshold_b: f64) -> Self {
        if cum <= threshold_a {
            AbcClass::A
        } else if cum <= threshold_b {
            AbcClass::B
        } else {
            AbcClass::C
        }
    }

    #[inline]
    fn slot(&self) -> usize {
        match self {
            AbcClass::A => 0,
            AbcClass::B => 1,
            AbcClass::C => 2,
        }
    }
}

impl std::fmt::Display for AbcClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AbcItem {
    pub label: String,
    pub profit: f64,
    pub cum_pct: f64,
    pub class: AbcClass,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClassSummary {
    pub count: usize,
    pub sum: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AbcSummary {
    #[serde(rename = "A")]
    pub a: ClassSummary,
    #[serde(rename = "B")]
    pub b: ClassSummary,
    #[serde(rename = "C")]
    pub c: ClassSummary,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AbcReport {
    pub items: Vec<AbcItem>,
    pub summary: AbcSummary,
}

/// Classify every row and summarise each class.
/// Sums and shares in the summary are rounded to 2 decimals.
pub fn abc_classify(labels: &[String], profits: &[f64], threshold_a: f64, threshold_b: f64) -> AbcReport {
    let cum = cumulative_percent(profits);
    let mut per_class: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    let items: Vec<AbcItem> = labels
        .iter()
        .zip(profits)
        .zip(&cum)
        .map(|((label, &profit), &c)| {
            let class = AbcClass::classify(c, threshold_a, threshold_b);
            per_class[class.slot()].push(profit);
            AbcItem {
                label: label.clone(),
                profit,
                cum_pct: round2(c),
                class,
            }
        })
        .collect();

    let total = fsum(profits);
    let denom = if total == 0.0 { 1.0 } else { total };
    let summarise = |members: &[f64]| {
        let sum = fsum(members);
        ClassSummary {
            count: members.len(),
            sum: round2(sum),
            share_pct: round2(sum * 100.0 / denom),
        }
    };

    AbcReport {
        summary: AbcSummary {
            a: summarise(&per_class[0]),
            b: summarise(&per_class[1]),
            c: summarise(&per_class[2]),
            total: round2(total),
        },
        items,
    }
}

// ── Treemap ──

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TreemapLeaf {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TreemapClass {
    pub name: String,
    pub children: Vec<TreemapLeaf>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TreemapNode {
    pub name: String,
    pub children: SmallVec<[TreemapClass; 3]>,
}

/// ABC hierarchy: root `ABC` with the three classes in order, each
/// listing its rows. Empty classes are kept.
pub fn treemap(labels: &[String], profits: &[f64], threshold_a: f64, threshold_b: f64) -> TreemapNode {
    let cum = cumulative_percent(profits);
    let mut children: SmallVec<[TreemapClass; 3]> = AbcClass::ALL
        .iter()
        .map(|c| TreemapClass {
            name: c.to_string(),
            children: Vec::new(),
        })
        .collect();

    for ((label, &profit), &c) in labels.iter().zip(profits).zip(&cum) {
        let class = AbcClass::classify(c, threshold_a, threshold_b);
        children[class.slot()].children.push(TreemapLeaf {
            name: label.clone(),
            value: round2(profit),
        });
    }

    TreemapNode {
        name: "ABC".into(),
        children,
    }
}
