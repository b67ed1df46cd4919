use hds_core::{DatasetRegion, HdsError, Result, Variable, VariableKind};

use crate::{
    catalog::Catalog,
    units::{Conversion, Unit},
};

/// A raw variable resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub variable: Variable,
    pub conversion: Conversion,
}

/// Maps raw (region, variable name, unit) triples onto canonical variables.
///
/// Resolution is a pure function of its inputs and the catalog the
/// normalizer was built with, so results may be memoized on those keys.
#[derive(Debug, Clone)]
pub struct Normalizer {
    catalog: Catalog,
}

impl Normalizer {
    pub fn new(catalog: Catalog) -> Self {
        Normalizer { catalog }
    }

    pub fn builtin() -> Result<Self> {
        Ok(Normalizer::new(Catalog::builtin()?))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a raw variable using the unit recorded in the catalog.
    /// Unmapped names resolve to `None` and are dropped by callers.
    pub fn normalize(&self, region: DatasetRegion, kind: VariableKind, raw_name: &str) -> Option<Resolved> {
        self.catalog.lookup(region, kind, raw_name).map(|e| Resolved {
            variable: e.canonical.clone(),
            conversion: e.conversion,
        })
    }

    /// Resolve a raw variable whose file states its own unit (for example a
    /// `discharge_vol(m3/s)` header). A stated unit wins over the catalog's.
    pub fn normalize_reported(
        &self,
        region: DatasetRegion,
        kind: VariableKind,
        raw_name: &str,
        reported_unit: Option<&str>,
    ) -> Result<Option<Resolved>> {
        let entry = match self.catalog.lookup(region, kind, raw_name) {
            Some(e) => e,
            None => return Ok(None),
        };
        let reported = match reported_unit {
            Some(u) => match u.parse::<Unit>() {
                Ok(unit) => unit,
                Err(_) => {
                    log::warn!(
                        "{}: unit '{}' of '{}' not recognised, using catalog unit {}",
                        region,
                        u,
                        raw_name,
                        entry.raw_unit
                    );
                    entry.raw_unit.clone()
                }
            },
            None => entry.raw_unit.clone(),
        };
        let conversion = if reported == entry.raw_unit {
            entry.conversion
        } else {
            let canonical = Unit::parse_or_other(&entry.canonical.unit);
            Conversion::between(&reported, &canonical)?
        };
        Ok(Some(Resolved {
            variable: entry.canonical.clone(),
            conversion,
        }))
    }

    /// Raw column names for the requested canonical variables, in order.
    pub fn raw_names(
        &self,
        region: DatasetRegion,
        kind: VariableKind,
        canonical: &[String],
    ) -> Result<Vec<String>> {
        canonical
            .iter()
            .map(|name| {
                self.catalog
                    .canonical(region, kind, name)
                    .map(|e| e.raw_name.clone())
                    .ok_or_else(|| HdsError::VariableNotFound {
                        region,
                        variable: name.clone(),
                        valid: self
                            .catalog
                            .variables(region, kind)
                            .into_iter()
                            .map(|v| v.name)
                            .collect(),
                    })
            })
            .collect()
    }

    /// Raw name and conversion of the area attribute, used by
    /// area-dependent flow conversions.
    pub fn area_source(&self, region: DatasetRegion) -> Option<(&str, Conversion)> {
        self.catalog
            .canonical(region, VariableKind::Attribute, "area")
            .map(|e| (e.raw_name.as_str(), e.conversion))
    }
}
