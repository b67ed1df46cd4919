use std::collections::BTreeSet;

use hds_adapters::RawAdapter;
use hds_core::{BasinId, DatasetRegion, HdsError, Result, Variable, VariableKind};
use hds_data::Catalog;

/// Basins and canonical variables of one region, held in memory.
///
/// Built once when a dataset is opened. Every read request is checked
/// against it before any raw file is touched.
#[derive(Debug, Clone)]
pub struct BasinIndex {
    region: DatasetRegion,
    basins: BTreeSet<BasinId>,
    attributes: Vec<Variable>,
    forcing: Vec<Variable>,
    streamflow: Vec<Variable>,
}

impl BasinIndex {
    pub fn build(adapter: &dyn RawAdapter, catalog: &Catalog) -> Result<BasinIndex> {
        let region = adapter.region();
        let basins = adapter.scan_basins()?;
        log::info!(
            "[HDS Debug] index: {} has {} basins",
            region,
            basins.len()
        );
        Ok(BasinIndex::new(region, basins, catalog))
    }

    pub fn new(region: DatasetRegion, basins: BTreeSet<BasinId>, catalog: &Catalog) -> BasinIndex {
        BasinIndex {
            region,
            basins,
            attributes: catalog.variables(region, VariableKind::Attribute),
            forcing: catalog.variables(region, VariableKind::Forcing),
            streamflow: catalog.variables(region, VariableKind::Streamflow),
        }
    }

    pub fn region(&self) -> DatasetRegion {
        self.region
    }

    pub fn basins(&self) -> &BTreeSet<BasinId> {
        &self.basins
    }

    /// Canonical variables of `kind`, sorted by name.
    pub fn variables(&self, kind: VariableKind) -> &[Variable] {
        match kind {
            VariableKind::Attribute => &self.attributes,
            VariableKind::Forcing => &self.forcing,
            VariableKind::Streamflow => &self.streamflow,
        }
    }

    /// Check requested basins, keeping request order and dropping repeats.
    /// An empty request selects every basin.
    pub fn validate_basins(&self, requested: &[BasinId]) -> Result<Vec<BasinId>> {
        if requested.is_empty() {
            return Ok(self.basins.iter().cloned().collect());
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(requested.len());
        for basin in requested {
            if !self.basins.contains(basin) {
                return Err(HdsError::BasinNotFound {
                    region: self.region,
                    basin: basin.to_string(),
                    valid: self.basins.iter().map(|b| b.to_string()).collect(),
                });
            }
            if seen.insert(basin) {
                out.push(basin.clone());
            }
        }
        Ok(out)
    }

    /// Check requested canonical variable names. An empty request selects
    /// every variable of `kind`.
    pub fn validate_variables(&self, kind: VariableKind, requested: &[String]) -> Result<Vec<String>> {
        let known = self.variables(kind);
        if requested.is_empty() {
            return Ok(known.iter().map(|v| v.name.clone()).collect());
        }
        let mut out: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if !known.iter().any(|v| &v.name == name) {
                return Err(HdsError::VariableNotFound {
                    region: self.region,
                    variable: name.clone(),
                    valid: known.iter().map(|v| v.name.clone()).collect(),
                });
            }
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Ok(out)
    }
}
