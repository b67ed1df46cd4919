//! The canonical variable catalog: which raw column of which region maps to
//! which canonical variable, and in what unit each side is expressed.
//!
//! The catalog is data, not code. The shipped table is embedded from
//! `fixtures/catalog.csv`; callers can parse their own or layer overrides on
//! top to add regions and variables.
//!
//! # CSV format
//!
//! ```text
//! region,kind,raw_name,raw_unit,canonical_name,canonical_unit
//! CH,forcing,precipitation,mm/day,precipitation,mm/day
//! AUS|AUS_v2,streamflow,streamflow_MLd,ML/d,streamflow,ft^3/s
//! ```

use std::collections::{BTreeMap, HashMap};

use hds_core::{DatasetRegion, HdsError, Result, Variable, VariableKind};
use hds_utils::fs::crc_hex;

use crate::units::{Conversion, Unit};

/// Embedded CSV data for the shipped catalog.
pub static CATALOG_CSV: &str = include_str!("../../fixtures/catalog.csv");

/// One row of the catalog, expanded to a single region.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub region: DatasetRegion,
    pub raw_name: String,
    pub raw_unit: Unit,
    pub canonical: Variable,
    pub conversion: Conversion,
}

/// Lookup tables over the catalog rows.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_raw: HashMap<(DatasetRegion, VariableKind, String), usize>,
    by_canonical: HashMap<(DatasetRegion, VariableKind, String), usize>,
}

impl Catalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Catalog> {
        Catalog::parse(CATALOG_CSV)
    }

    /// Parse a catalog from CSV text. Rows are validated as they are read:
    /// unknown regions or kinds, unconvertible unit pairs, duplicate
    /// mappings and canonical variables with two different units are all
    /// rejected.
    pub fn parse(csv_data: &str) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        catalog.merge_csv(csv_data, false)?;
        Ok(catalog)
    }

    /// Return a copy with rows from `csv_data` replacing rows that map the
    /// same (region, kind, raw name), and adding the rest.
    pub fn with_overrides(&self, csv_data: &str) -> Result<Catalog> {
        let mut catalog = self.clone();
        catalog.merge_csv(csv_data, true)?;
        Ok(catalog)
    }

    fn merge_csv(&mut self, csv_data: &str, replace: bool) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut count = 0u32;
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let r = result.map_err(|e| HdsError::Catalog {
                line,
                reason: e.to_string(),
            })?;
            if r.len() < 6 {
                return Err(HdsError::Catalog {
                    line,
                    reason: format!("expected 6 fields, found {}", r.len()),
                });
            }
            let bad = |reason: String| HdsError::Catalog { line, reason };

            let kind: VariableKind = r[1].parse().map_err(bad)?;
            let raw_unit = Unit::parse_or_other(&r[3]);
            let canonical_unit = Unit::parse_or_other(&r[5]);
            let conversion = Conversion::between(&raw_unit, &canonical_unit)
                .map_err(|e| bad(e.to_string()))?;

            for code in r[0].split('|') {
                let region: DatasetRegion = code.parse().map_err(bad)?;
                let entry = CatalogEntry {
                    region,
                    raw_name: r[2].to_string(),
                    raw_unit: raw_unit.clone(),
                    canonical: Variable::new(&r[4], canonical_unit.symbol(), kind),
                    conversion,
                };
                self.insert(entry, replace).map_err(bad)?;
                count += 1;
            }
        }
        self.check_units()
            .map_err(|reason| HdsError::Catalog { line: 0, reason })?;
        log::debug!("catalog: loaded {} entries", count);
        Ok(())
    }

    fn insert(&mut self, entry: CatalogEntry, replace: bool) -> std::result::Result<(), String> {
        let kind = entry.canonical.kind;
        let raw_key = (entry.region, kind, entry.raw_name.clone());
        let canon_key = (entry.region, kind, entry.canonical.name.clone());

        if let Some(&idx) = self.by_raw.get(&raw_key) {
            if !replace {
                return Err(format!(
                    "{} {} '{}' is mapped twice",
                    entry.region, kind, entry.raw_name
                ));
            }
            let old = self.entries[idx].canonical.name.clone();
            self.by_canonical.remove(&(entry.region, kind, old));
            self.entries[idx] = entry;
            self.by_canonical.insert(canon_key, idx);
            return Ok(());
        }
        if let Some(&idx) = self.by_canonical.get(&canon_key) {
            return Err(format!(
                "{} {} '{}' already mapped from '{}'",
                entry.region, kind, entry.canonical.name, self.entries[idx].raw_name
            ));
        }
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        self.by_raw.insert(raw_key, idx);
        self.by_canonical.insert(canon_key, idx);
        Ok(())
    }

    /// Every canonical variable must carry one unit across all regions.
    fn check_units(&self) -> std::result::Result<(), String> {
        let mut units: BTreeMap<&str, &str> = BTreeMap::new();
        for e in &self.entries {
            let unit = units
                .entry(e.canonical.name.as_str())
                .or_insert(e.canonical.unit.as_str());
            if *unit != e.canonical.unit {
                return Err(format!(
                    "canonical variable '{}' has units '{}' and '{}'",
                    e.canonical.name, unit, e.canonical.unit
                ));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn lookup(&self, region: DatasetRegion, kind: VariableKind, raw_name: &str) -> Option<&CatalogEntry> {
        self.by_raw
            .get(&(region, kind, raw_name.to_string()))
            .map(|&i| &self.entries[i])
    }

    pub fn canonical(
        &self,
        region: DatasetRegion,
        kind: VariableKind,
        canonical_name: &str,
    ) -> Option<&CatalogEntry> {
        self.by_canonical
            .get(&(region, kind, canonical_name.to_string()))
            .map(|&i| &self.entries[i])
    }

    /// Checksum of the rows that apply to `region`, independent of row
    /// order. Two catalogs that normalise the region's values the same way
    /// have the same fingerprint.
    pub fn fingerprint(&self, region: DatasetRegion) -> String {
        let mut rows: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.region == region)
            .map(|e| {
                format!(
                    "{}|{}|{}|{}|{}",
                    e.canonical.kind.as_str(),
                    e.raw_name,
                    e.raw_unit.symbol(),
                    e.canonical.name,
                    e.canonical.unit
                )
            })
            .collect();
        rows.sort();
        crc_hex(rows.join("\n").as_bytes())
    }

    /// Canonical variables a region exposes for `kind`, sorted by name.
    pub fn variables(&self, region: DatasetRegion, kind: VariableKind) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self
            .entries
            .iter()
            .filter(|e| e.region == region && e.canonical.kind == kind)
            .map(|e| e.canonical.clone())
            .collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }
}
