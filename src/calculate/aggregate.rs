//! Grouped reductions over a table.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Table, Value};

use super::{calculate_ratio, CalcError};

/// How a metric is reduced from the rows of one group.
#[derive(Debug, Clone, PartialEq)]
pub enum Reducer {
    /// Sum of a numeric column; nulls count as zero.
    Sum(String),

    /// Number of distinct non-null tuples over the listed columns.
    CountDistinct(Vec<String>),

    /// Ratio of two previously declared metrics, computed after reduction.
    Ratio {
        numerator: String,
        denominator: String,
    },
}

/// A named output column of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub reducer: Reducer,
}

impl Metric {
    pub fn sum(name: &str, column: &str) -> Self {
        Self {
            name: name.to_string(),
            reducer: Reducer::Sum(column.to_string()),
        }
    }

    pub fn count_distinct(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            reducer: Reducer::CountDistinct(columns.iter().map(|c| c.to_string()).collect()),
        }
    }

    pub fn ratio(name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            reducer: Reducer::Ratio {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
            },
        }
    }
}

/// A metric resolved against the input table's column positions.
enum Plan {
    Sum { column: String, idx: usize },
    CountDistinct(Vec<usize>),
    Ratio { numerator: usize, denominator: usize },
}

/// Running state of one metric within one group.
#[derive(Debug, Clone)]
enum Acc {
    Sum { int: i64, float: f64, is_float: bool },
    Distinct(BTreeSet<Vec<Value>>),
    Ratio,
}

impl Acc {
    fn finish(&self) -> Value {
        match self {
            Acc::Sum {
                int,
                float,
                is_float,
            } => {
                if *is_float {
                    Value::Float(*float + *int as f64)
                } else {
                    Value::Int(*int)
                }
            }
            Acc::Distinct(seen) => Value::Int(seen.len() as i64),
            Acc::Ratio => Value::Null,
        }
    }
}

fn plan(table: &Table, metrics: &[Metric]) -> Result<Vec<Plan>, CalcError> {
    let mut plans = Vec::with_capacity(metrics.len());

    for (pos, metric) in metrics.iter().enumerate() {
        let resolve_metric = |operand: &str| {
            metrics[..pos]
                .iter()
                .position(|m| m.name == operand)
                .ok_or_else(|| CalcError::UnknownMetric {
                    metric: metric.name.clone(),
                    operand: operand.to_string(),
                })
        };

        let p = match &metric.reducer {
            Reducer::Sum(column) => Plan::Sum {
                column: column.clone(),
                idx: table
                    .column_index(column)
                    .ok_or_else(|| CalcError::UnknownColumn(column.clone()))?,
            },
            Reducer::CountDistinct(columns) => Plan::CountDistinct(
                columns
                    .iter()
                    .map(|c| {
                        table
                            .column_index(c)
                            .ok_or_else(|| CalcError::UnknownColumn(c.clone()))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Reducer::Ratio {
                numerator,
                denominator,
            } => Plan::Ratio {
                numerator: resolve_metric(numerator)?,
                denominator: resolve_metric(denominator)?,
            },
        };
        plans.push(p);
    }

    Ok(plans)
}

fn fresh(plans: &[Plan]) -> Vec<Acc> {
    plans
        .iter()
        .map(|p| match p {
            Plan::Sum { .. } => Acc::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            Plan::CountDistinct(_) => Acc::Distinct(BTreeSet::new()),
            Plan::Ratio { .. } => Acc::Ratio,
        })
        .collect()
}

fn accumulate(acc: &mut Acc, plan: &Plan, row: &[Value]) -> Result<(), CalcError> {
    match (acc, plan) {
        (
            Acc::Sum {
                int,
                float,
                is_float,
            },
            Plan::Sum { column, idx },
        ) => match &row[*idx] {
            Value::Null => {}
            Value::Int(v) => {
                *int = int
                    .checked_add(*v)
                    .ok_or_else(|| CalcError::Overflow(column.clone()))?;
            }
            Value::Float(v) => {
                *float += *v;
                *is_float = true;
            }
            Value::Text(s) => {
                return Err(CalcError::NonNumeric {
                    column: column.clone(),
                    value: s.clone(),
                })
            }
        },
        (Acc::Distinct(seen), Plan::CountDistinct(cols)) => {
            let tuple: Vec<Value> = cols.iter().map(|&i| row[i].clone()).collect();
            if !tuple.iter().any(Value::is_null) {
                seen.insert(tuple);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Group `table` by `group_by` and reduce each group with `metrics`.
///
/// Output columns are the group keys followed by the metrics in declaration
/// order. Ratios are derived once every row of the group has been reduced,
/// rounded half away from zero to three places, and are `Null` when the
/// denominator total is zero.
pub fn aggregate<S: AsRef<str>>(
    table: &Table,
    group_by: &[S],
    metrics: &[Metric],
) -> Result<Table, CalcError> {
    let key_idx = group_by
        .iter()
        .map(|c| {
            table
                .column_index(c.as_ref())
                .ok_or_else(|| CalcError::UnknownColumn(c.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let plans = plan(table, metrics)?;

    let mut groups: BTreeMap<Vec<Value>, Vec<Acc>> = BTreeMap::new();
    for row in table.rows() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        let accs = groups.entry(key).or_insert_with(|| fresh(&plans));
        for (acc, p) in accs.iter_mut().zip(&plans) {
            accumulate(acc, p, row)?;
        }
    }

    let columns = group_by
        .iter()
        .map(|c| c.as_ref().to_string())
        .chain(metrics.iter().map(|m| m.name.clone()));
    let mut out = Table::new(columns);

    for (key, accs) in groups {
        let mut values: Vec<Value> = accs.iter().map(Acc::finish).collect();
        for (i, p) in plans.iter().enumerate() {
            if let Plan::Ratio {
                numerator,
                denominator,
            } = p
            {
                let num = values[*numerator].as_f64().unwrap_or(0.0);
                let den = values[*denominator].as_f64().unwrap_or(0.0);
                values[i] = calculate_ratio(num, den).into();
            }
        }

        let mut row = key;
        row.extend(values);
        out.push_row(row)?;
    }

    Ok(out)
}
