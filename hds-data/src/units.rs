//! Physical units and conversions between them.
//!
//! Every unit belongs to a [`Dimension`] and maps onto that dimension's base
//! unit through `base = (value + shift) * scale`. Converting between two
//! units of one dimension composes the two maps. The only cross-dimension
//! conversion is between a depth rate over a catchment and a volume flow,
//! which needs the catchment area.

use std::{fmt, str::FromStr};

use hds_core::{HdsError, Result};

/// Seconds per day divided by 1000: one mm/day over one km² is 1/86.4 m³/s.
const MM_DAY_KM2_PER_M3_S: f64 = 86.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    VolumeFlow,
    DepthRate,
    Temperature,
    Irradiance,
    Pressure,
    Length,
    Area,
    Volume,
    Velocity,
    Duration,
    Frequency,
    InverseTime,
    InverseLength,
    Slope,
    Density,
    MassFraction,
    Power,
    Percent,
    Angle,
    Dimensionless,
    Text,
    /// A published unit without a conversion; values pass through as they are.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    CubicMetrePerSecond,
    CubicFootPerSecond,
    LitrePerSecond,
    MegalitrePerDay,
    MillionCubicMetrePerYear,
    MmPerDay,
    MmPerYear,
    MmPerMonth,
    MmPerHour,
    CmPerHour,
    CmPerDay,
    KgPerM2PerSecond,
    Celsius,
    Fahrenheit,
    Kelvin,
    WattPerM2,
    MegajoulePerM2PerDay,
    JoulePerCm2PerDay,
    Hectopascal,
    Kilopascal,
    Pascal,
    Millimetre,
    Centimetre,
    Metre,
    Kilometre,
    SquareKilometre,
    SquareMetre,
    Hectare,
    CubicMetre,
    ThousandCubicMetre,
    Megalitre,
    MillionCubicMetre,
    CubicKilometre,
    MetrePerSecond,
    KilometrePerHour,
    Minute,
    Day,
    Year,
    DaysPerYear,
    PerDay,
    PerKilometre,
    MetrePerKilometre,
    GramPerCubicCentimetre,
    GramPerKilogram,
    Megawatt,
    Percent,
    Degree,
    Dimensionless,
    Text,
    /// Kept verbatim, for example `season` or `log10(m^2)`.
    Other(String),
}

impl Unit {
    pub fn dimension(&self) -> Dimension {
        use Unit::*;
        match self {
            CubicMetrePerSecond | CubicFootPerSecond | LitrePerSecond | MegalitrePerDay
            | MillionCubicMetrePerYear => Dimension::VolumeFlow,
            MmPerDay | MmPerYear | MmPerMonth | MmPerHour | CmPerHour | CmPerDay
            | KgPerM2PerSecond => Dimension::DepthRate,
            Celsius | Fahrenheit | Kelvin => Dimension::Temperature,
            WattPerM2 | MegajoulePerM2PerDay | JoulePerCm2PerDay => Dimension::Irradiance,
            Hectopascal | Kilopascal | Pascal => Dimension::Pressure,
            Millimetre | Centimetre | Metre | Kilometre => Dimension::Length,
            SquareKilometre | SquareMetre | Hectare => Dimension::Area,
            CubicMetre | ThousandCubicMetre | Megalitre | MillionCubicMetre | CubicKilometre => {
                Dimension::Volume
            }
            MetrePerSecond | KilometrePerHour => Dimension::Velocity,
            Minute | Day | Year => Dimension::Duration,
            DaysPerYear => Dimension::Frequency,
            PerDay => Dimension::InverseTime,
            PerKilometre => Dimension::InverseLength,
            MetrePerKilometre => Dimension::Slope,
            GramPerCubicCentimetre => Dimension::Density,
            GramPerKilogram => Dimension::MassFraction,
            Megawatt => Dimension::Power,
            Percent => Dimension::Percent,
            Degree => Dimension::Angle,
            Dimensionless => Dimension::Dimensionless,
            Text => Dimension::Text,
            Other(_) => Dimension::Other,
        }
    }

    /// `(shift, scale)` with `base = (value + shift) * scale`.
    ///
    /// Bases: m³/s, mm/day, °C, W/m², hPa, m, km², m³, m/s, day.
    fn to_base(&self) -> (f64, f64) {
        use Unit::*;
        match self {
            CubicMetrePerSecond => (0.0, 1.0),
            CubicFootPerSecond => (0.0, 0.028_316_846_592),
            LitrePerSecond => (0.0, 1e-3),
            MegalitrePerDay => (0.0, 1000.0 / 86_400.0),
            MillionCubicMetrePerYear => (0.0, 1e6 / (365.25 * 86_400.0)),
            MmPerDay => (0.0, 1.0),
            MmPerYear => (0.0, 1.0 / 365.25),
            MmPerMonth => (0.0, 12.0 / 365.25),
            MmPerHour => (0.0, 24.0),
            CmPerHour => (0.0, 240.0),
            CmPerDay => (0.0, 10.0),
            KgPerM2PerSecond => (0.0, 86_400.0),
            Celsius => (0.0, 1.0),
            Fahrenheit => (-32.0, 5.0 / 9.0),
            Kelvin => (-273.15, 1.0),
            WattPerM2 => (0.0, 1.0),
            MegajoulePerM2PerDay => (0.0, 1e6 / 86_400.0),
            JoulePerCm2PerDay => (0.0, 1e4 / 86_400.0),
            Hectopascal => (0.0, 1.0),
            Kilopascal => (0.0, 10.0),
            Pascal => (0.0, 0.01),
            Millimetre => (0.0, 1e-3),
            Centimetre => (0.0, 1e-2),
            Metre => (0.0, 1.0),
            Kilometre => (0.0, 1e3),
            SquareKilometre => (0.0, 1.0),
            SquareMetre => (0.0, 1e-6),
            Hectare => (0.0, 1e-2),
            CubicMetre => (0.0, 1.0),
            ThousandCubicMetre => (0.0, 1e3),
            Megalitre => (0.0, 1e3),
            MillionCubicMetre => (0.0, 1e6),
            CubicKilometre => (0.0, 1e9),
            MetrePerSecond => (0.0, 1.0),
            KilometrePerHour => (0.0, 1.0 / 3.6),
            Minute => (0.0, 1.0 / 1440.0),
            Day => (0.0, 1.0),
            Year => (0.0, 365.25),
            DaysPerYear | PerDay | PerKilometre | MetrePerKilometre | GramPerCubicCentimetre
            | GramPerKilogram | Megawatt => (0.0, 1.0),
            Percent | Degree | Dimensionless | Text | Other(_) => (0.0, 1.0),
        }
    }

    /// Preferred spelling.
    pub fn symbol(&self) -> &str {
        use Unit::*;
        match self {
            CubicMetrePerSecond => "m^3/s",
            CubicFootPerSecond => "ft^3/s",
            LitrePerSecond => "L/s",
            MegalitrePerDay => "ML/d",
            MillionCubicMetrePerYear => "MCM/yr",
            MmPerDay => "mm/day",
            MmPerYear => "mm/yr",
            MmPerMonth => "mm/month",
            MmPerHour => "mm/h",
            CmPerHour => "cm/h",
            CmPerDay => "cm/day",
            KgPerM2PerSecond => "kg/m^2/s",
            Celsius => "degC",
            Fahrenheit => "degF",
            Kelvin => "K",
            WattPerM2 => "W/m^2",
            MegajoulePerM2PerDay => "MJ/m^2/d",
            JoulePerCm2PerDay => "J/cm^2/d",
            Hectopascal => "hPa",
            Kilopascal => "kPa",
            Pascal => "Pa",
            Millimetre => "mm",
            Centimetre => "cm",
            Metre => "m",
            Kilometre => "km",
            SquareKilometre => "km^2",
            SquareMetre => "m^2",
            Hectare => "ha",
            CubicMetre => "m^3",
            ThousandCubicMetre => "10^3 m^3",
            Megalitre => "ML",
            MillionCubicMetre => "10^6 m^3",
            CubicKilometre => "km^3",
            MetrePerSecond => "m/s",
            KilometrePerHour => "km/h",
            Minute => "min",
            Day => "day",
            Year => "yr",
            DaysPerYear => "day/yr",
            PerDay => "1/day",
            PerKilometre => "1/km",
            MetrePerKilometre => "m/km",
            GramPerCubicCentimetre => "g/cm^3",
            GramPerKilogram => "g/kg",
            Megawatt => "MW",
            Percent => "%",
            Degree => "degree",
            Dimensionless => "dimensionless",
            Text => "text",
            Other(s) => s.as_str(),
        }
    }

    /// Parse a unit, keeping spellings without a known meaning as
    /// [`Unit::Other`]. Used for catalog rows, which may carry any unit a
    /// provider publishes.
    pub fn parse_or_other(s: &str) -> Unit {
        s.parse()
            .unwrap_or_else(|_| Unit::Other(s.trim().to_string()))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = HdsError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .replace('³', "3")
            .replace('²', "2")
            .replace('°', "deg")
            .replace(['^', ' ', '_'], "")
            .to_lowercase();
        use Unit::*;
        let unit = match key.as_str() {
            "m3/s" | "m3s-1" | "cms" | "cumecs" => CubicMetrePerSecond,
            "ft3/s" | "ft3s-1" | "cfs" => CubicFootPerSecond,
            "l/s" | "ls-1" => LitrePerSecond,
            "ml/d" | "ml/day" | "mld" | "mld-1" => MegalitrePerDay,
            "mcm/yr" | "mcm/year" | "106m3/yr" => MillionCubicMetrePerYear,
            "mm/d" | "mm/day" | "mmd" | "mmd-1" | "mm/d(day)" => MmPerDay,
            "mm/yr" | "mm/year" | "mm/a" | "mmyr-1" | "mm/y" => MmPerYear,
            "mm/month" | "mm/mon" => MmPerMonth,
            "mm/h" | "mm/hr" | "mm/hour" => MmPerHour,
            "cm/h" | "cm/hr" | "cm/hour" => CmPerHour,
            "cm/d" | "cm/day" => CmPerDay,
            "kg/m2/s" | "kgm-2s-1" => KgPerM2PerSecond,
            "degc" | "c" | "celsius" | "degreescelsius" | "degreec" | "celsiusdegree" => Celsius,
            "degf" | "f" | "fahrenheit" | "degreesfahrenheit" | "degreef" => Fahrenheit,
            "k" | "kelvin" => Kelvin,
            "w/m2" | "wm-2" => WattPerM2,
            "mj/m2" | "mj/m2/d" | "mj/m2/day" | "mjm-2d-1" => MegajoulePerM2PerDay,
            "j/cm2" | "j/cm2/d" | "j/cm2/day" => JoulePerCm2PerDay,
            "hpa" | "mbar" => Hectopascal,
            "kpa" => Kilopascal,
            "pa" => Pascal,
            "mm" | "kg/m2" | "kgm-2" => Millimetre,
            "cm" => Centimetre,
            "m" | "masl" | "m.a.s.l." => Metre,
            "km" => Kilometre,
            "km2" | "sqkm" => SquareKilometre,
            "m2" => SquareMetre,
            "ha" => Hectare,
            "m3" => CubicMetre,
            "103m3" => ThousandCubicMetre,
            "ml" => Megalitre,
            "106m3" | "miom3" | "mm3" | "mcm" => MillionCubicMetre,
            "km3" => CubicKilometre,
            "m/s" | "ms-1" => MetrePerSecond,
            "km/h" | "kmh-1" => KilometrePerHour,
            "min" | "minutes" => Minute,
            "d" | "day" | "days" | "dayofyear" | "dayoftheyear" => Day,
            "yr" | "year" | "years" => Year,
            "d/y" | "d/yr" | "day/yr" | "day/year" | "days/yr" | "days/year" => DaysPerYear,
            "1/d" | "1/day" | "d-1" => PerDay,
            "1/km" | "km-1" | "km/km2" => PerKilometre,
            "m/km" | "mm/m" => MetrePerKilometre,
            "g/cm3" | "kg/dm3" => GramPerCubicCentimetre,
            "g/kg" => GramPerKilogram,
            "mw" => Megawatt,
            "%" | "percent" | "percentwt" | "percentvol" | "g/100g(percent)"
            | "cm3/100cm3(volpercent)" => Percent,
            "degree" | "degrees" | "deg" | "degreenorth" | "degreeeast" | "degreen"
            | "degreee" | "degn" | "dege" => Degree,
            "dimensionless" | "-" | "" | "unitless" | "1" | "ratio" | "m3/m3" | "cm3/cm3" => {
                Dimensionless
            }
            "text" | "string" | "category" | "categorical" | "season" => Text,
            _ => return Err(HdsError::UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// A resolved conversion from a raw unit to a canonical one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// `(value + shift) * scale + offset`
    Affine { shift: f64, scale: f64, offset: f64 },
    /// `value * scale * area_km2`
    TimesArea { scale: f64 },
    /// `value * scale / area_km2`
    PerArea { scale: f64 },
    /// Text passes through untouched.
    Text,
    /// Numbers pass through unchanged and text is kept as text. Used for
    /// dimensionless and unconverted published units, whose columns may be
    /// categorical.
    Verbatim,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion::Affine {
        shift: 0.0,
        scale: 1.0,
        offset: 0.0,
    };

    /// Resolve the conversion from `from` to `to`.
    pub fn between(from: &Unit, to: &Unit) -> Result<Conversion> {
        let (fd, td) = (from.dimension(), to.dimension());
        let (f_shift, f_scale) = from.to_base();
        let (t_shift, t_scale) = to.to_base();
        match (fd, td) {
            (Dimension::Text, Dimension::Text) => Ok(Conversion::Text),
            (Dimension::Text, _) | (_, Dimension::Text) => Err(mismatch(from, to)),
            (Dimension::Other, Dimension::Other) if from == to => Ok(Conversion::Verbatim),
            (Dimension::Other, _) | (_, Dimension::Other) => Err(mismatch(from, to)),
            (Dimension::Dimensionless, Dimension::Dimensionless) => Ok(Conversion::Verbatim),
            _ if fd == td => Ok(Conversion::Affine {
                shift: f_shift,
                scale: f_scale / t_scale,
                offset: -t_shift,
            }),
            (Dimension::DepthRate, Dimension::VolumeFlow) => Ok(Conversion::TimesArea {
                scale: f_scale / MM_DAY_KM2_PER_M3_S / t_scale,
            }),
            (Dimension::VolumeFlow, Dimension::DepthRate) => Ok(Conversion::PerArea {
                scale: f_scale * MM_DAY_KM2_PER_M3_S / t_scale,
            }),
            _ => Err(mismatch(from, to)),
        }
    }

    pub fn needs_area(&self) -> bool {
        matches!(self, Conversion::TimesArea { .. } | Conversion::PerArea { .. })
    }

    /// Convert one value. Area-dependent conversions yield `None` when the
    /// catchment area is unknown or not positive.
    pub fn apply(&self, value: f64, area_km2: Option<f64>) -> Option<f64> {
        let area = area_km2.filter(|a| a.is_finite() && *a > 0.0);
        match *self {
            Conversion::Affine {
                shift,
                scale,
                offset,
            } => Some((value + shift) * scale + offset),
            Conversion::TimesArea { scale } => area.map(|a| value * scale * a),
            Conversion::PerArea { scale } => area.map(|a| value * scale / a),
            Conversion::Text | Conversion::Verbatim => Some(value),
        }
    }
}

fn mismatch(from: &Unit, to: &Unit) -> HdsError {
    HdsError::UnitConversion {
        from: from.symbol().to_string(),
        to: to.symbol().to_string(),
    }
}

/// Convert `value` from `raw_unit` to `canonical_unit`.
///
/// Fails with [`HdsError::UnitConversion`] when the units are unrelated or
/// the conversion needs a catchment area; use [`normalize_value_with_area`]
/// for the latter.
pub fn normalize_value(value: f64, raw_unit: &str, canonical_unit: &str) -> Result<f64> {
    let conversion = Conversion::between(&raw_unit.parse()?, &canonical_unit.parse()?)?;
    if conversion.needs_area() {
        return Err(HdsError::UnitConversion {
            from: raw_unit.to_string(),
            to: format!("{} (needs catchment area)", canonical_unit),
        });
    }
    conversion.apply(value, None).ok_or_else(|| HdsError::UnitConversion {
        from: raw_unit.to_string(),
        to: canonical_unit.to_string(),
    })
}

/// Like [`normalize_value`], for conversions between depth rates and volume
/// flows over a catchment of `area_km2`.
pub fn normalize_value_with_area(
    value: f64,
    raw_unit: &str,
    canonical_unit: &str,
    area_km2: f64,
) -> Result<f64> {
    let conversion = Conversion::between(&raw_unit.parse()?, &canonical_unit.parse()?)?;
    conversion
        .apply(value, Some(area_km2))
        .ok_or_else(|| HdsError::UnitConversion {
            from: raw_unit.to_string(),
            to: format!("{} (area {} km^2)", canonical_unit, area_km2),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn fahrenheit_to_celsius() {
        for f in [-40.0, 0.0, 32.0, 68.0, 98.6, 212.0] {
            let c = normalize_value(f, "degF", "degC").unwrap();
            assert!(close(c, (f - 32.0) * 5.0 / 9.0), "{} -> {}", f, c);
        }
        assert!(close(normalize_value(212.0, "°F", "°C").unwrap(), 100.0));
    }

    #[test]
    fn celsius_round_trips_through_kelvin() {
        let k = normalize_value(25.0, "degC", "K").unwrap();
        assert!(close(k, 298.15));
        assert!(close(normalize_value(k, "K", "degC").unwrap(), 25.0));
    }

    #[test]
    fn volume_flows() {
        assert!(close(normalize_value(1.0, "m3/s", "ft^3/s").unwrap(), 35.314_666_721_488_59));
        assert!(close(normalize_value(1000.0, "L/s", "m^3/s").unwrap(), 1.0));
        assert!(close(normalize_value(86.4, "ML/d", "m^3/s").unwrap(), 1.0));
    }

    #[test]
    fn depth_rate_and_radiation() {
        assert!(close(normalize_value(365.25, "mm/yr", "mm/day").unwrap(), 1.0));
        assert!(close(normalize_value(1.0, "kg/m^2/s", "mm/day").unwrap(), 86_400.0));
        assert!(close(normalize_value(8.64, "MJ/m^2/d", "W/m^2").unwrap(), 100.0));
        assert!(close(normalize_value(864.0, "J/cm^2/d", "W/m^2").unwrap(), 100.0));
    }

    #[test]
    fn area_dependent_flow() {
        // 1 mm/day over 86.4 km² is exactly 1 m³/s
        let q = normalize_value_with_area(1.0, "mm/day", "m^3/s", 86.4).unwrap();
        assert!(close(q, 1.0));
        let back = normalize_value_with_area(1.0, "m^3/s", "mm/day", 86.4).unwrap();
        assert!(close(back, 1.0));
        assert!(matches!(
            normalize_value(1.0, "mm/day", "m^3/s"),
            Err(HdsError::UnitConversion { .. })
        ));
        let conv = Conversion::between(&Unit::MmPerDay, &Unit::CubicFootPerSecond).unwrap();
        assert_eq!(conv.apply(1.0, None), None);
        assert_eq!(conv.apply(1.0, Some(0.0)), None);
    }

    #[test]
    fn incompatible_units_fail() {
        match normalize_value(1.0, "degC", "mm/day") {
            Err(HdsError::UnitConversion { from, to }) => {
                assert_eq!(from, "degC");
                assert_eq!(to, "mm/day");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            normalize_value(1.0, "furlongs", "m"),
            Err(HdsError::UnknownUnit(_))
        ));
        assert!(Conversion::between(&Unit::Text, &Unit::Metre).is_err());
    }

    #[test]
    fn header_spellings() {
        for (raw, unit) in [
            ("m3/s", Unit::CubicMetrePerSecond),
            ("m³/s", Unit::CubicMetrePerSecond),
            ("mm/d", Unit::MmPerDay),
            ("C", Unit::Celsius),
            ("w/m2", Unit::WattPerM2),
            ("kg/m2", Unit::Millimetre),
            ("MLd", Unit::MegalitrePerDay),
            ("km2", Unit::SquareKilometre),
            ("Celsius degree", Unit::Celsius),
            ("days/yr", Unit::DaysPerYear),
            ("Mio m^3", Unit::MillionCubicMetre),
            ("kg/dm^3", Unit::GramPerCubicCentimetre),
            ("degree North", Unit::Degree),
            ("season", Unit::Text),
        ] {
            assert_eq!(raw.parse::<Unit>().unwrap(), unit, "{}", raw);
        }
    }

    #[test]
    fn published_units_pass_through() {
        let log_area = Unit::parse_or_other(" log10(m^2) ");
        assert_eq!(log_area, Unit::Other("log10(m^2)".into()));
        assert_eq!(log_area.symbol(), "log10(m^2)");
        assert_eq!(Unit::parse_or_other("mm/d"), Unit::MmPerDay);

        let same = Conversion::between(&log_area, &Unit::parse_or_other("log10(m^2)")).unwrap();
        assert_eq!(same, Conversion::Verbatim);
        assert_eq!(same.apply(2.5, None), Some(2.5));
        assert!(Conversion::between(&log_area, &Unit::Other("timestep".into())).is_err());
        assert!(Conversion::between(&log_area, &Unit::Metre).is_err());
        assert_eq!(
            Conversion::between(&Unit::Dimensionless, &Unit::Dimensionless).unwrap(),
            Conversion::Verbatim
        );
    }

    #[test]
    fn volumes_durations_and_rates() {
        assert!(close(normalize_value(1.0, "km^3", "10^6 m^3").unwrap(), 1000.0));
        assert!(close(normalize_value(1.0, "ML", "m^3").unwrap(), 1000.0));
        assert!(close(normalize_value(1440.0, "min", "day").unwrap(), 1.0));
        assert!(close(normalize_value(1.0, "cm/h", "mm/day").unwrap(), 240.0));
        assert!(close(normalize_value(31.557_6, "MCM/yr", "m^3/s").unwrap(), 1.0));
        assert!(normalize_value(1.0, "day", "day/yr").is_err());
    }
}
