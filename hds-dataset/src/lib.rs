//! One entry point per published hydrological dataset.
//!
//! [`Dataset`] ties together the raw-format adapter of a region, the unit
//! normalizer and the persistent cache. Callers only ever name basins by id
//! and variables by their canonical names; values come back in canonical
//! units with missing observations as `None`.
//!
//! ```no_run
//! use hds_core::{DatasetRegion, TimeRange};
//! use hds_dataset::Dataset;
//!
//! # fn main() -> hds_core::Result<()> {
//! let ds = Dataset::open("/data/camels_ch", DatasetRegion::CamelsCh, false)?;
//! let range = TimeRange::parse("2000-01-01", "2001-01-01")?;
//! let flow = ds.get_streamflow(&["2009".into()], &range)?;
//! println!("{:?}", flow.shape());
//! # Ok(())
//! # }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use hds_adapters::{adapter_for, RawAdapter, RawAttribute, RawAttributes};
use hds_cache::{
    manifest::FORMAT_VERSION, ArtifactStatus, CacheConfig, CacheManager, Contention, Coverage,
    ForcingArray, Scope, StreamflowArray,
};
use hds_core::{
    AttributeTable, AttributeValue, BasinId, Capability, DatasetRegion, HdsError, Nestedness,
    Result, SeriesArray, SeriesKind, TimeRange, Variable, VariableKind,
};
use hds_data::{Catalog, Conversion, Normalizer};
use hds_utils::fs::tree_signature;

mod fetch;
mod index;

pub use fetch::{Fetcher, NoopFetcher};
pub use index::BasinIndex;

/// Options for opening a [`Dataset`].
pub struct DatasetBuilder {
    data_path: PathBuf,
    region: DatasetRegion,
    download: bool,
    cache: CacheConfig,
    fetcher: Box<dyn Fetcher>,
    catalog: Option<Catalog>,
}

impl DatasetBuilder {
    pub fn new(data_path: impl Into<PathBuf>, region: DatasetRegion) -> Self {
        DatasetBuilder {
            data_path: data_path.into(),
            region,
            download: false,
            cache: CacheConfig::default(),
            fetcher: Box::new(NoopFetcher),
            catalog: None,
        }
    }

    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache.root = root.into();
        self
    }

    pub fn contention(mut self, contention: Contention) -> Self {
        self.cache.contention = contention;
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Replace the shipped variable catalog.
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Run the fetcher before opening.
    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn open(self) -> Result<Dataset> {
        let region = self.region;
        if self.download {
            log::info!(
                "[HDS Debug] dataset: ensuring {} data under {}",
                region,
                self.data_path.display()
            );
            self.fetcher.ensure_local(region, &self.data_path)?;
        }
        let data_path = absolute(&self.data_path);
        let adapter = adapter_for(region, &data_path);
        adapter.probe()?;

        let catalog = match self.catalog {
            Some(c) => c,
            None => Catalog::builtin()?,
        };
        let index = BasinIndex::build(adapter.as_ref(), &catalog)?;
        let catalog_signature = catalog.fingerprint(region);
        let mut cache = self.cache;
        cache.root = absolute(&cache.root);

        log::info!(
            "[HDS Debug] dataset: opened {} at {} ({} basins)",
            region,
            data_path.display(),
            index.basins().len()
        );
        Ok(Dataset {
            region,
            data_path,
            adapter,
            normalizer: Normalizer::new(catalog),
            catalog_signature,
            index,
            cache: CacheManager::new(cache),
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// A region's data under one data path.
pub struct Dataset {
    region: DatasetRegion,
    data_path: PathBuf,
    adapter: Box<dyn RawAdapter>,
    normalizer: Normalizer,
    catalog_signature: String,
    index: BasinIndex,
    cache: CacheManager,
}

impl Dataset {
    /// Open with the default cache location and no fetcher.
    pub fn open(data_path: impl Into<PathBuf>, region: DatasetRegion, download: bool) -> Result<Dataset> {
        DatasetBuilder::new(data_path, region).download(download).open()
    }

    pub fn builder(data_path: impl Into<PathBuf>, region: DatasetRegion) -> DatasetBuilder {
        DatasetBuilder::new(data_path, region)
    }

    pub fn region(&self) -> DatasetRegion {
        self.region
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index(&self) -> &BasinIndex {
        &self.index
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Static attributes of `basins`. Empty slices select everything.
    pub fn get_attributes(&self, basins: &[BasinId], variables: &[String]) -> Result<AttributeTable> {
        let basins = self.index.validate_basins(basins)?;
        let variables = self.index.validate_variables(VariableKind::Attribute, variables)?;
        let request = Coverage::new(basins, variables, None);
        self.cache
            .get_or_build(&self.scope()?, &request, |c| self.build_attributes(c))
    }

    /// Daily meteorological forcing of `basins` over `range`.
    pub fn get_forcing(
        &self,
        basins: &[BasinId],
        variables: &[String],
        range: &TimeRange,
    ) -> Result<SeriesArray> {
        self.require(Capability::Forcing)?;
        let basins = self.index.validate_basins(basins)?;
        let variables = self.index.validate_variables(VariableKind::Forcing, variables)?;
        let request = Coverage::new(basins, variables, Some(*range));
        let got: ForcingArray = self.cache.get_or_build(&self.scope()?, &request, |c| {
            self.build_series(SeriesKind::Forcing, c, range).map(ForcingArray)
        })?;
        Ok(got.0)
    }

    /// Daily streamflow of `basins` over `range`, in ft^3/s.
    pub fn get_streamflow(&self, basins: &[BasinId], range: &TimeRange) -> Result<SeriesArray> {
        self.require(Capability::Streamflow)?;
        let basins = self.index.validate_basins(basins)?;
        let variables = self
            .index
            .validate_variables(VariableKind::Streamflow, &["streamflow".to_string()])?;
        let request = Coverage::new(basins, variables, Some(*range));
        let got: StreamflowArray = self.cache.get_or_build(&self.scope()?, &request, |c| {
            self.build_series(SeriesKind::Streamflow, c, range).map(StreamflowArray)
        })?;
        Ok(got.0)
    }

    /// Catchment areas in km^2.
    pub fn read_area(&self, basins: &[BasinId]) -> Result<Vec<(BasinId, Option<f64>)>> {
        self.numeric_attribute(basins, "area")
    }

    /// Long-term mean precipitation in mm/day.
    pub fn read_mean_prcp(&self, basins: &[BasinId]) -> Result<Vec<(BasinId, Option<f64>)>> {
        self.numeric_attribute(basins, "p_mean")
    }

    /// How gauges nest inside each other's catchments, for regions that
    /// publish it. Read from the raw files on every call; empty `basins`
    /// selects every listed gauge.
    pub fn read_nestedness(&self, basins: &[BasinId]) -> Result<Vec<Nestedness>> {
        self.require(Capability::Nestedness)?;
        if !basins.is_empty() {
            self.index.validate_basins(basins)?;
        }
        let records = self.adapter.read_nestedness(basins)?;
        log::info!(
            "[HDS Debug] dataset: {} nestedness records for {}",
            records.len(),
            self.region
        );
        Ok(records)
    }

    fn numeric_attribute(&self, basins: &[BasinId], name: &str) -> Result<Vec<(BasinId, Option<f64>)>> {
        let table = self.get_attributes(basins, &[name.to_string()])?;
        Ok(table
            .basins
            .iter()
            .enumerate()
            .map(|(b, basin)| (basin.clone(), table.cell(b, 0).as_f64()))
            .collect())
    }

    /// Fill the cache with every basin and variable over the region's
    /// published period, then report what is stored.
    pub fn warm_cache(&self) -> Result<Vec<ArtifactStatus>> {
        if !self.region.capabilities().supports(Capability::Cache) {
            log::info!("[HDS Debug] dataset: {} is read from raw files, nothing to warm", self.region);
            return Ok(Vec::new());
        }
        let all = self.index.validate_basins(&[])?;
        let range = self.region.default_time_range();
        self.get_attributes(&all, &[])?;
        if self.region.capabilities().supports(Capability::Forcing) {
            self.get_forcing(&all, &[], &range)?;
        }
        self.get_streamflow(&all, &range)?;
        self.cache_status()
    }

    pub fn cache_status(&self) -> Result<Vec<ArtifactStatus>> {
        self.cache.status(&self.scope()?)
    }

    /// Drop every cached artifact of this data path.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache
            .clear(&Scope::new(self.region, self.data_path.clone(), ""))
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.adapter.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(HdsError::UnsupportedOperation {
                region: self.region,
                capability,
            })
        }
    }

    /// Cache scope for the current state of the raw files. The signature is
    /// recomputed per read so edits to the data path invalidate the cache.
    fn scope(&self) -> Result<Scope> {
        let signature = if self.region.capabilities().supports(Capability::Cache) {
            let cache_root = self.cache.config().root.as_path();
            let tree = tree_signature(&self.data_path, &[cache_root])
                .map_err(|e| HdsError::io(&self.data_path, e))?;
            format!("v{}-{}-{}", FORMAT_VERSION, self.catalog_signature, tree)
        } else {
            String::new()
        };
        Ok(Scope::new(self.region, self.data_path.clone(), signature))
    }

    fn canonical_variables(&self, kind: VariableKind, names: &[String]) -> Result<Vec<Variable>> {
        let known = self.index.variables(kind);
        names
            .iter()
            .map(|n| {
                known
                    .iter()
                    .find(|v| &v.name == n)
                    .cloned()
                    .ok_or_else(|| HdsError::VariableNotFound {
                        region: self.region,
                        variable: n.clone(),
                        valid: known.iter().map(|v| v.name.clone()).collect(),
                    })
            })
            .collect()
    }

    fn build_attributes(&self, cov: &Coverage) -> Result<AttributeTable> {
        let kind = VariableKind::Attribute;
        let raw_names = self.normalizer.raw_names(self.region, kind, &cov.variables)?;
        let variables = self.canonical_variables(kind, &cov.variables)?;
        let raw = self.adapter.read_attributes(&cov.basins)?;

        let mut table = AttributeTable::empty(cov.basins.clone(), variables);
        for (b, basin) in cov.basins.iter().enumerate() {
            let Some(attrs) = raw.get(basin) else {
                log::warn!("{}: no attributes for basin {}", self.region, basin);
                continue;
            };
            let area = self.area_of(attrs)?;
            for (v, raw_name) in raw_names.iter().enumerate() {
                if let Some(cell) = attrs.get(raw_name) {
                    table.set(b, v, self.normalize_attribute(raw_name, cell, area)?);
                }
            }
        }
        Ok(table)
    }

    fn normalize_attribute(
        &self,
        raw_name: &str,
        cell: &RawAttribute,
        area: Option<f64>,
    ) -> Result<AttributeValue> {
        let resolved = self.normalizer.normalize_reported(
            self.region,
            VariableKind::Attribute,
            raw_name,
            cell.unit.as_deref(),
        )?;
        let Some(resolved) = resolved else {
            return Ok(AttributeValue::Missing);
        };
        Ok(match (&resolved.conversion, &cell.value) {
            (_, AttributeValue::Missing) => AttributeValue::Missing,
            (Conversion::Text | Conversion::Verbatim, AttributeValue::Text(s)) => {
                AttributeValue::Text(s.clone())
            }
            (Conversion::Text, AttributeValue::Number(x)) => AttributeValue::Text(x.to_string()),
            (_, AttributeValue::Text(s)) => {
                log::debug!("{}: '{}' is not numeric for {}", self.region, s, raw_name);
                AttributeValue::Missing
            }
            (conversion, AttributeValue::Number(x)) => conversion
                .apply(*x, area)
                .map_or(AttributeValue::Missing, AttributeValue::Number),
        })
    }

    /// Catchment area in km^2 from a basin's raw attributes.
    fn area_of(&self, attrs: &RawAttributes) -> Result<Option<f64>> {
        let Some((raw_name, _)) = self.normalizer.area_source(self.region) else {
            return Ok(None);
        };
        let Some(cell) = attrs.get(raw_name) else {
            return Ok(None);
        };
        let resolved = self.normalizer.normalize_reported(
            self.region,
            VariableKind::Attribute,
            raw_name,
            cell.unit.as_deref(),
        )?;
        Ok(resolved.and_then(|r| {
            cell.value
                .as_f64()
                .and_then(|x| r.conversion.apply(x, None))
        }))
    }

    fn catchment_areas(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, f64>> {
        if self.normalizer.area_source(self.region).is_none() {
            log::warn!("{}: no area attribute, area-based conversions yield gaps", self.region);
            return Ok(BTreeMap::new());
        }
        let raw = self.adapter.read_attributes(basins)?;
        let mut areas = BTreeMap::new();
        for (basin, attrs) in &raw {
            if let Some(area) = self.area_of(attrs)? {
                areas.insert(basin.clone(), area);
            }
        }
        Ok(areas)
    }

    fn build_series(&self, kind: SeriesKind, cov: &Coverage, requested: &TimeRange) -> Result<SeriesArray> {
        let vkind = VariableKind::from(kind);
        let time = cov.time.unwrap_or(*requested);
        let raw_names = self.normalizer.raw_names(self.region, vkind, &cov.variables)?;
        let variables = self.canonical_variables(vkind, &cov.variables)?;
        let raw = self
            .adapter
            .read_timeseries(&cov.basins, kind, &raw_names, &time)?;

        let mut areas: Option<BTreeMap<BasinId, f64>> = None;
        let mut arr = SeriesArray::empty(cov.basins.clone(), time, variables);
        for (b, basin) in cov.basins.iter().enumerate() {
            let Some(series) = raw.get(basin) else {
                continue;
            };
            let mut columns = Vec::with_capacity(raw_names.len());
            for (v, raw_name) in raw_names.iter().enumerate() {
                let Some(c) = series.column(raw_name) else {
                    continue;
                };
                let unit = series.columns[c].unit.as_deref();
                if let Some(r) = self
                    .normalizer
                    .normalize_reported(self.region, vkind, raw_name, unit)?
                {
                    columns.push((v, c, r.conversion));
                }
            }

            let area = if columns.iter().any(|(_, _, conv)| conv.needs_area()) {
                if areas.is_none() {
                    areas = Some(self.catchment_areas(&cov.basins)?);
                }
                areas.as_ref().and_then(|m| m.get(basin)).copied()
            } else {
                None
            };

            for (date, readings) in &series.rows {
                let Some(t) = time.index_of(*date) else {
                    continue;
                };
                for &(v, c, conversion) in &columns {
                    let value = readings
                        .get(c)
                        .and_then(|r| r.value())
                        .and_then(|x| conversion.apply(x, area));
                    arr.set(b, t, v, value);
                }
            }
        }
        Ok(arr)
    }
}
