//! What the cache stores: dense arrays of `f64` plus the labels needed to
//! interpret them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use hds_core::{
    AttributeTable, AttributeValue, BasinId, HdsError, Result, SeriesArray, TimeRange, Variable,
};

/// Basins, variables and days an artifact holds or a caller asks for.
/// Order matters only for requests: results come back in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub basins: Vec<BasinId>,
    pub variables: Vec<String>,
    pub time: Option<TimeRange>,
}

impl Coverage {
    pub fn new(basins: Vec<BasinId>, variables: Vec<String>, time: Option<TimeRange>) -> Self {
        Coverage {
            basins,
            variables,
            time,
        }
    }

    /// True when every requested basin, variable and day is held here.
    pub fn covers(&self, request: &Coverage) -> bool {
        let basins: BTreeSet<&BasinId> = self.basins.iter().collect();
        let vars: BTreeSet<&String> = self.variables.iter().collect();
        let time = match (&self.time, &request.time) {
            (Some(have), Some(want)) => have.covers(want),
            (None, None) => true,
            _ => false,
        };
        time && request.basins.iter().all(|b| basins.contains(b))
            && request.variables.iter().all(|v| vars.contains(v))
    }

    /// Smallest coverage holding both: basins sorted, variables in first-seen
    /// order, time as the spanning range.
    pub fn union(&self, other: &Coverage) -> Coverage {
        let basins: BTreeSet<BasinId> = self
            .basins
            .iter()
            .chain(other.basins.iter())
            .cloned()
            .collect();
        let mut variables = self.variables.clone();
        for v in &other.variables {
            if !variables.contains(v) {
                variables.push(v.clone());
            }
        }
        let time = match (&self.time, &other.time) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => (*a).or(*b),
        };
        Coverage {
            basins: basins.into_iter().collect(),
            variables,
            time,
        }
    }
}

/// Labels of a stored array. Persisted inside the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayHeader {
    pub basins: Vec<BasinId>,
    pub variables: Vec<Variable>,
    pub time_range: Option<TimeRange>,
    pub shape: Vec<usize>,
    /// Code tables of text-valued variables; the array stores the index.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl ArrayHeader {
    pub fn coverage(&self) -> Coverage {
        Coverage {
            basins: self.basins.clone(),
            variables: self.variables.iter().map(|v| v.name.clone()).collect(),
            time: self.time_range,
        }
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A value the cache knows how to persist and cut down to a request.
pub trait Artifact: Sized {
    /// File stem of the artifact inside a cache scope.
    const KIND: &'static str;

    fn encode(&self) -> (ArrayHeader, Vec<f64>);

    fn decode(header: ArrayHeader, values: Vec<f64>) -> Result<Self>;

    /// The part of `self` a request asks for, or `None` if not covered.
    fn subset(&self, request: &Coverage) -> Option<Self>;
}

fn corrupt(reason: impl Into<String>) -> HdsError {
    HdsError::CacheCorrupt {
        path: Default::default(),
        reason: reason.into(),
    }
}

fn to_f64(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

fn from_f64(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

/// Time series are keyed by kind so forcing and streamflow of one region
/// live side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcingArray(pub SeriesArray);

#[derive(Debug, Clone, PartialEq)]
pub struct StreamflowArray(pub SeriesArray);

fn encode_series(a: &SeriesArray) -> (ArrayHeader, Vec<f64>) {
    let (nb, nt, nv) = a.shape();
    let header = ArrayHeader {
        basins: a.basins.clone(),
        variables: a.variables.clone(),
        time_range: Some(a.time_range),
        shape: vec![nb, nt, nv],
        categories: BTreeMap::new(),
    };
    (header, a.values().iter().copied().map(to_f64).collect())
}

fn decode_series(header: ArrayHeader, values: Vec<f64>) -> Result<SeriesArray> {
    let time_range = header
        .time_range
        .ok_or_else(|| corrupt("time series artifact without a time range"))?;
    let expected = vec![header.basins.len(), time_range.len(), header.variables.len()];
    if header.shape != expected {
        return Err(corrupt(format!(
            "shape {:?} does not match labels {:?}",
            header.shape, expected
        )));
    }
    SeriesArray::from_values(
        header.basins,
        time_range,
        header.variables,
        values.into_iter().map(from_f64).collect(),
    )
    .map_err(|e| corrupt(e.to_string()))
}

fn subset_series(a: &SeriesArray, request: &Coverage) -> Option<SeriesArray> {
    a.subset(&request.basins, &request.variables, request.time.as_ref()?)
}

impl Artifact for ForcingArray {
    const KIND: &'static str = "forcing";

    fn encode(&self) -> (ArrayHeader, Vec<f64>) {
        encode_series(&self.0)
    }

    fn decode(header: ArrayHeader, values: Vec<f64>) -> Result<Self> {
        decode_series(header, values).map(ForcingArray)
    }

    fn subset(&self, request: &Coverage) -> Option<Self> {
        subset_series(&self.0, request).map(ForcingArray)
    }
}

impl Artifact for StreamflowArray {
    const KIND: &'static str = "streamflow";

    fn encode(&self) -> (ArrayHeader, Vec<f64>) {
        encode_series(&self.0)
    }

    fn decode(header: ArrayHeader, values: Vec<f64>) -> Result<Self> {
        decode_series(header, values).map(StreamflowArray)
    }

    fn subset(&self, request: &Coverage) -> Option<Self> {
        subset_series(&self.0, request).map(StreamflowArray)
    }
}

/// Text attributes are factorised: a variable holding any text stores every
/// present value by its index into a sorted code table.
impl Artifact for AttributeTable {
    const KIND: &'static str = "attributes";

    fn encode(&self) -> (ArrayHeader, Vec<f64>) {
        let (nb, nv) = self.shape();
        let mut categories = BTreeMap::new();
        let mut codes: Vec<Option<BTreeMap<String, usize>>> = vec![None; nv];
        for (v, var) in self.variables.iter().enumerate() {
            let column: Vec<&AttributeValue> = (0..nb).map(|b| self.cell(b, v)).collect();
            if !column.iter().any(|c| matches!(c, AttributeValue::Text(_))) {
                continue;
            }
            let labels: BTreeSet<String> = column.iter().filter_map(|c| label(c)).collect();
            let labels: Vec<String> = labels.into_iter().collect();
            codes[v] = Some(
                labels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (l.clone(), i))
                    .collect(),
            );
            categories.insert(var.name.clone(), labels);
        }

        let mut values = Vec::with_capacity(nb * nv);
        for b in 0..nb {
            for (v, code) in codes.iter().enumerate() {
                let cell = self.cell(b, v);
                let x = match code {
                    Some(table) => label(cell)
                        .and_then(|l| table.get(&l).copied())
                        .map_or(f64::NAN, |i| i as f64),
                    None => to_f64(cell.as_f64()),
                };
                values.push(x);
            }
        }
        let header = ArrayHeader {
            basins: self.basins.clone(),
            variables: self.variables.clone(),
            time_range: None,
            shape: vec![nb, nv],
            categories,
        };
        (header, values)
    }

    fn decode(header: ArrayHeader, values: Vec<f64>) -> Result<Self> {
        let (nb, nv) = (header.basins.len(), header.variables.len());
        if header.shape != [nb, nv] || values.len() != nb * nv {
            return Err(corrupt(format!(
                "shape {:?} with {} values does not match {} basins x {} variables",
                header.shape,
                values.len(),
                nb,
                nv
            )));
        }
        let tables: Vec<Option<&Vec<String>>> = header
            .variables
            .iter()
            .map(|v| header.categories.get(&v.name))
            .collect();
        let mut cells = Vec::with_capacity(values.len());
        for (i, x) in values.into_iter().enumerate() {
            let cell = match (from_f64(x), tables[i % nv]) {
                (None, _) => AttributeValue::Missing,
                (Some(code), Some(table)) => {
                    let label = table
                        .get(code as usize)
                        .filter(|_| code >= 0.0 && code.fract() == 0.0)
                        .ok_or_else(|| corrupt(format!("category code {} out of range", code)))?;
                    AttributeValue::Text(label.clone())
                }
                (Some(x), None) => AttributeValue::Number(x),
            };
            cells.push(cell);
        }
        AttributeTable::from_values(header.basins, header.variables, cells)
            .map_err(|e| corrupt(e.to_string()))
    }

    fn subset(&self, request: &Coverage) -> Option<Self> {
        AttributeTable::subset(self, &request.basins, &request.variables)
    }
}

fn label(cell: &AttributeValue) -> Option<String> {
    match cell {
        AttributeValue::Text(s) => Some(s.clone()),
        AttributeValue::Number(x) => Some(x.to_string()),
        AttributeValue::Missing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hds_core::VariableKind;

    fn cov(basins: &[&str], vars: &[&str], time: Option<(&str, &str)>) -> Coverage {
        Coverage::new(
            basins.iter().map(|b| BasinId::new(*b)).collect(),
            vars.iter().map(|v| v.to_string()).collect(),
            time.map(|(s, e)| TimeRange::parse(s, e).unwrap()),
        )
    }

    #[test]
    fn coverage_containment() {
        let have = cov(&["a", "b"], &["p", "t"], Some(("2000-01-01", "2001-01-01")));
        assert!(have.covers(&cov(&["b"], &["t"], Some(("2000-02-01", "2000-03-01")))));
        assert!(!have.covers(&cov(&["c"], &["t"], Some(("2000-02-01", "2000-03-01")))));
        assert!(!have.covers(&cov(&["a"], &["q"], Some(("2000-02-01", "2000-03-01")))));
        assert!(!have.covers(&cov(&["a"], &["p"], Some(("1999-02-01", "2000-03-01")))));
        assert!(!have.covers(&cov(&["a"], &["p"], None)));
    }

    #[test]
    fn coverage_union_widens() {
        let a = cov(&["b"], &["p"], Some(("2000-01-01", "2000-02-01")));
        let b = cov(&["a"], &["t", "p"], Some(("2000-03-01", "2000-04-01")));
        let u = a.union(&b);
        assert_eq!(u, cov(&["a", "b"], &["p", "t"], Some(("2000-01-01", "2000-04-01"))));
        assert!(u.covers(&a) && u.covers(&b));
    }

    #[test]
    fn attribute_text_is_factorised() {
        let vars = vec![
            Variable::new("area", "km^2", VariableKind::Attribute),
            Variable::new("gauge_name", "text", VariableKind::Attribute),
        ];
        let table = AttributeTable::from_values(
            vec!["1".into(), "2".into(), "3".into()],
            vars,
            vec![
                AttributeValue::Number(12.5),
                AttributeValue::Text("Thur".into()),
                AttributeValue::Missing,
                AttributeValue::Text("Aare".into()),
                AttributeValue::Number(3.0),
                AttributeValue::Missing,
            ],
        )
        .unwrap();
        let (header, values) = table.encode();
        assert_eq!(header.categories["gauge_name"], vec!["Aare", "Thur"]);
        assert_eq!(values[1], 1.0);
        assert_eq!(values[3], 0.0);
        assert!(values[2].is_nan() && values[5].is_nan());

        let back = AttributeTable::decode(header, values).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn bad_category_code_is_corrupt() {
        let vars = vec![Variable::new("gauge_name", "text", VariableKind::Attribute)];
        let table = AttributeTable::from_values(
            vec!["1".into()],
            vars,
            vec![AttributeValue::Text("Thur".into())],
        )
        .unwrap();
        let (header, _) = table.encode();
        let err = AttributeTable::decode(header, vec![7.0]).unwrap_err();
        assert!(matches!(err, HdsError::CacheCorrupt { .. }));
    }

    #[test]
    fn series_shape_is_checked() {
        let range = TimeRange::parse("2000-01-01", "2000-01-03").unwrap();
        let vars = vec![Variable::new("precipitation", "mm/day", VariableKind::Forcing)];
        let arr = SeriesArray::empty(vec!["a".into()], range, vars);
        let (mut header, values) = ForcingArray(arr.clone()).encode();
        assert_eq!(header.shape, vec![1, 2, 1]);
        let ok = ForcingArray::decode(header.clone(), values.clone()).unwrap();
        assert_eq!(ok.0, arr);
        header.shape = vec![1, 3, 1];
        assert!(ForcingArray::decode(header, values).is_err());
    }
}
