//! Materialised containers returned to callers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    basin::BasinId,
    error::{HdsError, Result},
    reading::AttributeValue,
    time_range::TimeRange,
    variable::Variable,
};

/// One variable of one basin over a contiguous daily axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub basin: BasinId,
    pub variable: Variable,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of days holding a measurement.
    pub fn observed(&self) -> usize {
        self.points.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// Dense `[basin][day][variable]` array of daily values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesArray {
    pub basins: Vec<BasinId>,
    pub time_range: TimeRange,
    pub variables: Vec<Variable>,
    values: Vec<Option<f64>>,
}

impl SeriesArray {
    /// An array with every cell missing.
    pub fn empty(basins: Vec<BasinId>, time_range: TimeRange, variables: Vec<Variable>) -> Self {
        let len = basins.len() * time_range.len() * variables.len();
        SeriesArray {
            basins,
            time_range,
            variables,
            values: vec![None; len],
        }
    }

    pub fn from_values(
        basins: Vec<BasinId>,
        time_range: TimeRange,
        variables: Vec<Variable>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let expected = basins.len() * time_range.len() * variables.len();
        if values.len() != expected {
            return Err(HdsError::RawFormat {
                path: Default::default(),
                reason: format!(
                    "series array holds {} values, shape needs {}",
                    values.len(),
                    expected
                ),
            });
        }
        Ok(SeriesArray {
            basins,
            time_range,
            variables,
            values,
        })
    }

    /// `(basins, days, variables)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.basins.len(), self.time_range.len(), self.variables.len())
    }

    fn offset(&self, b: usize, t: usize, v: usize) -> usize {
        let (_, nt, nv) = self.shape();
        (b * nt + t) * nv + v
    }

    pub fn get(&self, b: usize, t: usize, v: usize) -> Option<f64> {
        self.values.get(self.offset(b, t, v)).copied().flatten()
    }

    pub fn set(&mut self, b: usize, t: usize, v: usize, value: Option<f64>) {
        let i = self.offset(b, t, v);
        if let Some(cell) = self.values.get_mut(i) {
            *cell = value;
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn basin_index(&self, basin: &str) -> Option<usize> {
        self.basins.iter().position(|b| b.as_str() == basin)
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Value of `variable` for `basin` on `date`.
    pub fn value(&self, basin: &str, date: NaiveDate, variable: &str) -> Option<f64> {
        let b = self.basin_index(basin)?;
        let v = self.variable_index(variable)?;
        let t = self.time_range.index_of(date)?;
        self.get(b, t, v)
    }

    pub fn series(&self, basin: &str, variable: &str) -> Option<TimeSeries> {
        let b = self.basin_index(basin)?;
        let v = self.variable_index(variable)?;
        let points = self
            .time_range
            .days()
            .enumerate()
            .map(|(t, day)| (day, self.get(b, t, v)))
            .collect();
        Some(TimeSeries {
            basin: self.basins[b].clone(),
            variable: self.variables[v].clone(),
            points,
        })
    }

    /// Cut out the requested basins, variables and days, in request order.
    /// Returns `None` when this array does not cover the request.
    pub fn subset(
        &self,
        basins: &[BasinId],
        variables: &[String],
        time_range: &TimeRange,
    ) -> Option<SeriesArray> {
        if !self.time_range.covers(time_range) {
            return None;
        }
        let b_idx = basins
            .iter()
            .map(|b| self.basin_index(b.as_str()))
            .collect::<Option<Vec<_>>>()?;
        let v_idx = variables
            .iter()
            .map(|v| self.variable_index(v))
            .collect::<Option<Vec<_>>>()?;
        let t0 = self.time_range.index_of(time_range.start)?;
        let nt = time_range.len();

        let mut values = Vec::with_capacity(b_idx.len() * nt * v_idx.len());
        for &b in &b_idx {
            for t in t0..t0 + nt {
                for &v in &v_idx {
                    values.push(self.get(b, t, v));
                }
            }
        }
        Some(SeriesArray {
            basins: basins.to_vec(),
            time_range: *time_range,
            variables: v_idx.iter().map(|&v| self.variables[v].clone()).collect(),
            values,
        })
    }
}

/// `[basin][variable]` table of static attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTable {
    pub basins: Vec<BasinId>,
    pub variables: Vec<Variable>,
    values: Vec<AttributeValue>,
}

impl AttributeTable {
    pub fn empty(basins: Vec<BasinId>, variables: Vec<Variable>) -> Self {
        let len = basins.len() * variables.len();
        AttributeTable {
            basins,
            variables,
            values: vec![AttributeValue::Missing; len],
        }
    }

    pub fn from_values(
        basins: Vec<BasinId>,
        variables: Vec<Variable>,
        values: Vec<AttributeValue>,
    ) -> Result<Self> {
        if values.len() != basins.len() * variables.len() {
            return Err(HdsError::RawFormat {
                path: Default::default(),
                reason: format!(
                    "attribute table holds {} values, shape needs {}",
                    values.len(),
                    basins.len() * variables.len()
                ),
            });
        }
        Ok(AttributeTable {
            basins,
            variables,
            values,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.basins.len(), self.variables.len())
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn cell(&self, b: usize, v: usize) -> &AttributeValue {
        &self.values[b * self.variables.len() + v]
    }

    pub fn set(&mut self, b: usize, v: usize, value: AttributeValue) {
        let nv = self.variables.len();
        if let Some(cell) = self.values.get_mut(b * nv + v) {
            *cell = value;
        }
    }

    pub fn get(&self, basin: &str, variable: &str) -> Option<&AttributeValue> {
        let b = self.basins.iter().position(|x| x.as_str() == basin)?;
        let v = self.variables.iter().position(|x| x.name == variable)?;
        Some(self.cell(b, v))
    }

    /// Cut out the requested basins and variables, in request order.
    pub fn subset(&self, basins: &[BasinId], variables: &[String]) -> Option<AttributeTable> {
        let b_idx = basins
            .iter()
            .map(|b| self.basins.iter().position(|x| x == b))
            .collect::<Option<Vec<_>>>()?;
        let v_idx = variables
            .iter()
            .map(|n| self.variables.iter().position(|x| &x.name == n))
            .collect::<Option<Vec<_>>>()?;
        let values = b_idx
            .iter()
            .flat_map(|&b| v_idx.iter().map(move |&v| (b, v)))
            .map(|(b, v)| self.cell(b, v).clone())
            .collect();
        Some(AttributeTable {
            basins: basins.to_vec(),
            variables: v_idx.iter().map(|&v| self.variables[v].clone()).collect(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableKind;

    fn range() -> TimeRange {
        TimeRange::parse("2001-01-01", "2001-01-04").unwrap()
    }

    fn vars() -> Vec<Variable> {
        vec![
            Variable::new("precipitation", "mm/day", VariableKind::Forcing),
            Variable::new("temperature_mean", "degC", VariableKind::Forcing),
        ]
    }

    fn sample() -> SeriesArray {
        let basins = vec![BasinId::new("a"), BasinId::new("b")];
        let mut arr = SeriesArray::empty(basins, range(), vars());
        for b in 0..2 {
            for t in 0..3 {
                arr.set(b, t, 0, Some((b * 10 + t) as f64));
                arr.set(b, t, 1, Some(-(t as f64)));
            }
        }
        arr.set(1, 2, 1, None);
        arr
    }

    #[test]
    fn shape_and_lookup() {
        let arr = sample();
        assert_eq!(arr.shape(), (2, 3, 2));
        let day = NaiveDate::from_ymd_opt(2001, 1, 2).unwrap();
        assert_eq!(arr.value("b", day, "precipitation"), Some(11.0));
        assert_eq!(arr.get(1, 2, 1), None);
    }

    #[test]
    fn subset_reorders_and_slices() {
        let arr = sample();
        let cut = TimeRange::parse("2001-01-02", "2001-01-04").unwrap();
        let sub = arr
            .subset(
                &[BasinId::new("b")],
                &["temperature_mean".to_string(), "precipitation".to_string()],
                &cut,
            )
            .unwrap();
        assert_eq!(sub.shape(), (1, 2, 2));
        assert_eq!(sub.get(0, 0, 0), Some(-1.0));
        assert_eq!(sub.get(0, 0, 1), Some(11.0));
        assert_eq!(sub.get(0, 1, 0), None);
    }

    #[test]
    fn subset_outside_coverage_is_none() {
        let arr = sample();
        let wide = TimeRange::parse("2000-12-31", "2001-01-03").unwrap();
        assert!(arr.subset(&[BasinId::new("a")], &[], &wide).is_none());
        assert!(arr
            .subset(&[BasinId::new("z")], &[], &range())
            .is_none());
    }

    #[test]
    fn series_extraction() {
        let ts = sample().series("b", "temperature_mean").unwrap();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.observed(), 2);
        assert!(ts.points.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn attribute_subset() {
        let basins = vec![BasinId::new("a"), BasinId::new("b")];
        let variables = vec![
            Variable::new("area", "km^2", VariableKind::Attribute),
            Variable::new("gauge_name", "text", VariableKind::Attribute),
        ];
        let table = AttributeTable::from_values(
            basins,
            variables,
            vec![
                AttributeValue::Number(10.0),
                AttributeValue::Text("Aare".into()),
                AttributeValue::Number(20.0),
                AttributeValue::Missing,
            ],
        )
        .unwrap();
        let sub = table
            .subset(&[BasinId::new("b")], &["area".to_string()])
            .unwrap();
        assert_eq!(sub.shape(), (1, 1));
        assert_eq!(sub.get("b", "area"), Some(&AttributeValue::Number(20.0)));
        assert_eq!(table.get("b", "gauge_name"), Some(&AttributeValue::Missing));
    }
}
