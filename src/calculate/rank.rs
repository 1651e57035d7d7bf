//! Partition ranking with deterministic tie-breaks.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Table, Value};

use super::CalcError;

/// Default name of the rank column added by [`rank`].
pub const RANK_COLUMN: &str = "rank";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Where null values sort, independent of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullOrder {
    First,
    Last,
}

/// One component of a composite ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: Direction,
    pub nulls: NullOrder,
}

impl SortKey {
    /// Descending, nulls last.
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Desc,
            nulls: NullOrder::Last,
        }
    }

    /// Ascending, nulls last.
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Asc,
            nulls: NullOrder::Last,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrder::First;
        self
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match self.nulls {
                NullOrder::First => Ordering::Less,
                NullOrder::Last => Ordering::Greater,
            },
            (false, true) => match self.nulls {
                NullOrder::First => Ordering::Greater,
                NullOrder::Last => Ordering::Less,
            },
            (false, false) => match self.direction {
                Direction::Asc => a.total_cmp(b),
                Direction::Desc => b.total_cmp(a),
            },
        }
    }
}

/// Minimum sample size a row must reach to be ranked at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinCount {
    pub column: String,
    pub min: u64,
}

/// How to rank a table.
#[derive(Debug, Clone, PartialEq)]
pub struct RankSpec {
    /// Columns whose values define independent partitions; empty = global
    pub partition_by: Vec<String>,

    /// Composite ordering applied within each partition
    pub order_by: Vec<SortKey>,

    /// Natural identifier compared ascending when `order_by` ties
    pub tie_break: Vec<String>,

    /// Keep ranks 1..=K per partition
    pub top_k: Option<usize>,

    /// Drop rows below the sample threshold before ranking
    pub min_count: Option<MinCount>,

    /// Name of the rank column prepended to the output
    pub rank_column: String,
}

impl RankSpec {
    /// Global ranking by `order_by`.
    pub fn new(order_by: Vec<SortKey>) -> Self {
        Self {
            partition_by: Vec::new(),
            order_by,
            tie_break: Vec::new(),
            top_k: None,
            min_count: None,
            rank_column: RANK_COLUMN.to_string(),
        }
    }

    pub fn partition_by(mut self, columns: &[&str]) -> Self {
        self.partition_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn tie_break(mut self, columns: &[&str]) -> Self {
        self.tie_break = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn min_count(mut self, column: &str, min: u64) -> Self {
        self.min_count = Some(MinCount {
            column: column.to_string(),
            min,
        });
        self
    }
}

fn resolve(table: &Table, columns: &[String]) -> Result<Vec<usize>, CalcError> {
    columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| CalcError::UnknownColumn(c.clone()))
        })
        .collect()
}

fn meets(value: &Value, min: u64) -> bool {
    // a null sample size counts as zero
    value.as_f64().unwrap_or(0.0) >= min as f64
}

/// Rank rows within each partition.
///
/// Rows failing `min_count` are dropped first, so they never take a rank.
/// Within a partition rows are ordered by `order_by`, then by `tie_break`
/// ascending, then by input position; ranks are 1-based and unique. The
/// output has the rank column first, partitions in ascending key order and
/// rows in rank order.
pub fn rank(table: &Table, spec: &RankSpec) -> Result<Table, CalcError> {
    let partition_idx = resolve(table, &spec.partition_by)?;
    let tie_idx = resolve(table, &spec.tie_break)?;
    let order_idx: Vec<(usize, &SortKey)> = spec
        .order_by
        .iter()
        .map(|k| {
            table
                .column_index(&k.column)
                .map(|i| (i, k))
                .ok_or_else(|| CalcError::UnknownColumn(k.column.clone()))
        })
        .collect::<Result<_, _>>()?;
    let min_filter = spec
        .min_count
        .as_ref()
        .map(|m| {
            table
                .column_index(&m.column)
                .map(|i| (i, m.min))
                .ok_or_else(|| CalcError::UnknownColumn(m.column.clone()))
        })
        .transpose()?;

    let mut partitions: BTreeMap<Vec<Value>, Vec<&Vec<Value>>> = BTreeMap::new();
    for row in table.rows() {
        if let Some((idx, min)) = min_filter {
            if !meets(&row[idx], min) {
                continue;
            }
        }
        let key: Vec<Value> = partition_idx.iter().map(|&i| row[i].clone()).collect();
        partitions.entry(key).or_default().push(row);
    }

    let columns = std::iter::once(spec.rank_column.clone()).chain(table.columns().iter().cloned());
    let mut out = Table::new(columns);

    for (_, mut rows) in partitions {
        // stable sort: rows equal on every key keep input order
        rows.sort_by(|a, b| {
            order_idx
                .iter()
                .map(|(i, key)| key.compare(&a[*i], &b[*i]))
                .chain(tie_idx.iter().map(|&i| a[i].total_cmp(&b[i])))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let keep = spec.top_k.unwrap_or(usize::MAX);
        for (pos, row) in rows.into_iter().take(keep).enumerate() {
            let mut ranked = Vec::with_capacity(row.len() + 1);
            ranked.push(Value::Int(pos as i64 + 1));
            ranked.extend(row.iter().cloned());
            out.push_row(ranked)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kd_table() -> Table {
        Table::from_rows(
            ["map", "player", "kills_total", "matches_played", "kd"],
            vec![
                vec!["Ascent".into(), "A".into(), Value::Int(20), Value::Int(3), Value::Float(2.0)],
                vec!["Ascent".into(), "B".into(), Value::Int(15), Value::Int(2), Value::Float(1.5)],
                vec!["Ascent".into(), "C".into(), Value::Int(9), Value::Int(2), Value::Null],
                vec!["Bind".into(), "A".into(), Value::Int(12), Value::Int(2), Value::Float(1.2)],
                vec!["Bind".into(), "D".into(), Value::Int(30), Value::Int(1), Value::Float(3.0)],
            ],
        )
        .unwrap()
    }

    fn kd_spec() -> RankSpec {
        RankSpec::new(vec![SortKey::desc("kd"), SortKey::desc("kills_total")])
            .partition_by(&["map"])
            .tie_break(&["player"])
    }

    fn column<'a>(table: &'a Table, name: &str) -> Vec<&'a Value> {
        table.column_values(name).unwrap()
    }

    #[test]
    fn test_rank_within_partitions() {
        let out = rank(&kd_table(), &kd_spec()).unwrap();

        assert_eq!(out.columns()[0], "rank");
        let ranks: Vec<i64> = column(&out, "rank").iter().filter_map(|v| v.as_i64()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 1, 2]);

        let players: Vec<&str> = column(&out, "player").iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(players, vec!["A", "B", "C", "D", "A"]);
    }

    #[test]
    fn test_null_sorts_last_both_directions() {
        let asc = RankSpec::new(vec![SortKey::asc("kd")]).tie_break(&["player"]);
        let out = rank(&kd_table(), &asc).unwrap();
        assert!(out.rows().last().unwrap()[5].is_null());

        let desc = RankSpec::new(vec![SortKey::desc("kd")]).tie_break(&["player"]);
        let out = rank(&kd_table(), &desc).unwrap();
        assert!(out.rows().last().unwrap()[5].is_null());
    }

    #[test]
    fn test_nulls_first() {
        let spec = RankSpec::new(vec![SortKey::desc("kd").nulls_first()]);
        let out = rank(&kd_table(), &spec).unwrap();
        assert!(out.rows()[0][5].is_null());
    }

    #[test]
    fn test_top_k_per_partition() {
        let out = rank(&kd_table(), &kd_spec().top_k(1)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0, "player"), Some(&Value::text("A")));
        assert_eq!(out.get(0, "kd"), Some(&Value::Float(2.0)));
        assert_eq!(out.get(1, "player"), Some(&Value::text("D")));
    }

    #[test]
    fn test_top_k_larger_than_partition() {
        let out = rank(&kd_table(), &kd_spec().top_k(10)).unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_min_count_before_ranking() {
        let out = rank(&kd_table(), &kd_spec().min_count("matches_played", 2)).unwrap();
        // D (1 match) is dropped and A becomes Bind's rank 1
        assert_eq!(out.len(), 4);
        let bind: Vec<_> = out
            .rows()
            .iter()
            .filter(|r| r[1] == Value::text("Bind"))
            .collect();
        assert_eq!(bind.len(), 1);
        assert_eq!(bind[0][0], Value::Int(1));
        assert_eq!(bind[0][2], Value::text("A"));
    }

    #[test]
    fn test_tie_break_by_identifier() {
        let table = Table::from_rows(
            ["player", "kd"],
            vec![
                vec!["Zeta".into(), Value::Float(1.0)],
                vec!["Alpha".into(), Value::Float(1.0)],
                vec!["Mid".into(), Value::Float(1.0)],
            ],
        )
        .unwrap();
        let spec = RankSpec::new(vec![SortKey::desc("kd")]).tie_break(&["player"]);
        let out = rank(&table, &spec).unwrap();

        let players: Vec<&str> = column(&out, "player").iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(players, vec!["Alpha", "Mid", "Zeta"]);
        let ranks: Vec<i64> = column(&out, "rank").iter().filter_map(|v| v.as_i64()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_ranks_unique_per_partition() {
        let out = rank(&kd_table(), &kd_spec()).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for row in out.rows() {
            assert!(seen.insert((row[1].clone(), row[0].clone())));
        }
    }

    #[test]
    fn test_reproducible_regardless_of_input_order() {
        let mut rows = kd_table().into_rows();
        rows.reverse();
        let reversed = Table::from_rows(kd_table().columns().to_vec(), rows).unwrap();

        assert_eq!(
            rank(&kd_table(), &kd_spec()).unwrap(),
            rank(&reversed, &kd_spec()).unwrap()
        );
    }

    #[test]
    fn test_unknown_sort_column() {
        let spec = RankSpec::new(vec![SortKey::desc("rating")]);
        assert_eq!(
            rank(&kd_table(), &spec).unwrap_err(),
            CalcError::UnknownColumn("rating".to_string())
        );
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(["player", "kd"]);
        let out = rank(&table, &RankSpec::new(vec![SortKey::desc("kd")]).top_k(3)).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns(), &["rank", "player", "kd"]);
    }
}
