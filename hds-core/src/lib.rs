//! Core types for hydrological dataset access.
//!
//! Every other `hds-*` crate speaks in these types: the published dataset a
//! reader targets ([`DatasetRegion`]), basin identifiers ([`BasinId`]),
//! canonical variables ([`Variable`]), explicit missing values
//! ([`Reading`], [`AttributeValue`]), daily time windows ([`TimeRange`]) and
//! the materialised containers handed back to callers ([`SeriesArray`],
//! [`AttributeTable`], [`Nestedness`]).

pub mod basin;
pub mod error;
pub mod nestedness;
pub mod reading;
pub mod region;
pub mod series;
pub mod time_range;
pub mod variable;

pub use basin::BasinId;
pub use error::{Capability, HdsError, Result};
pub use nestedness::Nestedness;
pub use reading::{AttributeValue, Reading};
pub use region::{Capabilities, DatasetRegion};
pub use series::{AttributeTable, SeriesArray, TimeSeries};
pub use time_range::TimeRange;
pub use variable::{SeriesKind, Variable, VariableKind};
