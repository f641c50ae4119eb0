//! Chart panels handed to whatever draws them.

use crate::distribution::Distribution;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    #[default]
    Bar,
    HorizontalBar,
    Table,
    /// Resolved from the data, see [`ChartKind::auto_for`].
    Auto,
}

impl ChartKind {
    /// Few options read best as a pie, many or long labels as horizontal bars.
    pub fn auto_for(data: &Distribution) -> ChartKind {
        if data.is_empty() {
            return ChartKind::Table;
        }
        let longest = data.labels().map(|l| l.chars().count()).max().unwrap_or(0);
        if data.len() <= 5 {
            ChartKind::Pie
        } else if longest > 20 || data.len() > 10 {
            ChartKind::HorizontalBar
        } else {
            ChartKind::Bar
        }
    }

    pub fn resolve(self, data: &Distribution) -> ChartKind {
        match self {
            ChartKind::Auto => ChartKind::auto_for(data),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPanel {
    pub kind: ChartKind,
    pub title: String,
    pub data: Distribution,
}

impl ChartPanel {
    pub fn new(kind: ChartKind, title: impl Into<String>, data: Distribution) -> Self {
        let kind = kind.resolve(&data);
        Self { kind, title: title.into(), data }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{aggregate, AggregateOptions};

    fn dist(labels: &[&str]) -> Distribution {
        aggregate(labels.iter().copied(), &AggregateOptions::default())
    }

    #[test]
    fn auto_selection_follows_shape() {
        assert_eq!(ChartKind::auto_for(&dist(&[])), ChartKind::Table);
        assert_eq!(ChartKind::auto_for(&dist(&["a", "b", "c"])), ChartKind::Pie);
        let eight = ["a", "b", "c", "d", "e", "f", "g", "h"];
        assert_eq!(ChartKind::auto_for(&dist(&eight)), ChartKind::Bar);
        let mut long = eight.to_vec();
        long.push("a label that is clearly longer than twenty");
        assert_eq!(ChartKind::auto_for(&dist(&long)), ChartKind::HorizontalBar);
    }

    #[test]
    fn explicit_kinds_are_kept() {
        let panel = ChartPanel::new(ChartKind::Bar, "Regions", dist(&["x"]));
        assert_eq!(panel.kind, ChartKind::Bar);
        let panel = ChartPanel::new(ChartKind::Auto, "Regions", dist(&["x"]));
        assert_eq!(panel.kind, ChartKind::Pie);
        assert_eq!(serde_json::to_value(panel.kind).unwrap(), "pie");
    }
}
