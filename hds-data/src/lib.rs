//! Unit conversion and schema normalisation for hydrological datasets.
//!
//! Providers name and measure the same quantity differently: CAMELS-AUS
//! reports discharge in megalitres per day, CAMELS-FR in litres per second,
//! CAMELS-BR as a depth over the catchment. This crate maps every raw
//! variable onto one canonical name and unit through a catalog shipped as
//! data, and performs the unit arithmetic.

pub mod catalog;
pub mod normalizer;
pub mod units;

pub use catalog::{Catalog, CatalogEntry};
pub use normalizer::{Normalizer, Resolved};
pub use units::{normalize_value, normalize_value_with_area, Conversion, Dimension, Unit};
