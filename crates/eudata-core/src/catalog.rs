//! Static indicator and country tables.
//!
//! The catalog resolves codes to labels, units and compliance rules. Lookups
//! never fail: a code missing from the tables falls back to the raw code as its
//! name and a unit-less formatter. Whether a code may be *requested* at all is
//! decided by the adapter allow-lists in [`crate::config`], not here.

use crate::types::{ComplianceFlag, IndicatorCode, Provider};

/// Measurement unit of an indicator, which selects its value formatter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Percentage points (`48.3` is 48.3 %).
    Percent,
    /// A fraction of one, shown as a percentage (`0.483` is 48.3 %).
    Share,
    /// Mass in tonnes.
    Tonnes,
    /// Kilograms per inhabitant.
    KilogramsPerCapita,
    /// Million tonnes of CO2 equivalent.
    MegatonnesCo2e,
    /// No unit known.
    Unitless,
}

impl Unit {
    /// Renders a value for display.
    #[must_use]
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Percent | Self::Share => format!("{:.1}%", self.comparable(value)),
            Self::Tonnes => format!("{} t", group_thousands(value.round())),
            Self::KilogramsPerCapita => format!("{} kg", group_thousands(value.round())),
            Self::MegatonnesCo2e => format!("{value:.2} Mt CO2e"),
            Self::Unitless => format!("{value:.2}"),
        }
    }

    /// Brings a value onto the scale thresholds are written in.
    ///
    /// Only shares are rescaled, into percentage points. The scale belongs to
    /// the indicator, so a series never mixes the two.
    #[must_use]
    pub fn comparable(self, value: f64) -> f64 {
        match self {
            Self::Share => value * 100.0,
            _ => value,
        }
    }
}

/// Which side of a threshold counts as compliant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Compliant when the value is at or above the threshold.
    AtLeast,
    /// Compliant when the value is at or below the threshold.
    AtMost,
}

/// A target an indicator's observations are measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComplianceRule {
    /// Target value, on the unit's comparable scale.
    pub threshold: f64,
    /// Which side of the target complies.
    pub direction: Direction,
}

impl ComplianceRule {
    /// Creates a rule satisfied by values at or above `threshold`.
    #[must_use]
    pub const fn at_least(threshold: f64) -> Self {
        Self {
            threshold,
            direction: Direction::AtLeast,
        }
    }

    /// Creates a rule satisfied by values at or below `threshold`.
    #[must_use]
    pub const fn at_most(threshold: f64) -> Self {
        Self {
            threshold,
            direction: Direction::AtMost,
        }
    }

    /// Evaluates the rule against a raw observation value.
    #[must_use]
    pub fn evaluate(&self, unit: Unit, value: f64) -> ComplianceFlag {
        let value = unit.comparable(value);
        let ok = match self.direction {
            Direction::AtLeast => value >= self.threshold,
            Direction::AtMost => value <= self.threshold,
        };
        if ok {
            ComplianceFlag::Compliant
        } else {
            ComplianceFlag::Pending
        }
    }
}

/// A catalog row.
#[derive(Clone, Copy, Debug)]
pub struct IndicatorInfo {
    /// Provider dataset code.
    pub code: &'static str,
    /// Human-readable label.
    pub name: &'static str,
    /// Unit of the observations.
    pub unit: Unit,
    /// Target, if the indicator has one.
    pub rule: Option<ComplianceRule>,
}

const EUROSTAT_INDICATORS: &[IndicatorInfo] = &[
    IndicatorInfo {
        code: "cei_srm030",
        name: "Circular material use rate",
        unit: Unit::Percent,
        rule: Some(ComplianceRule::at_least(23.4)),
    },
    IndicatorInfo {
        code: "cei_wm011",
        name: "Recycling rate of municipal waste",
        unit: Unit::Share,
        rule: Some(ComplianceRule::at_least(55.0)),
    },
    IndicatorInfo {
        code: "cei_wm020",
        name: "Recycling rate of packaging waste",
        unit: Unit::Share,
        rule: Some(ComplianceRule::at_least(65.0)),
    },
    IndicatorInfo {
        code: "cei_wm030",
        name: "Recycling rate of e-waste",
        unit: Unit::Share,
        rule: Some(ComplianceRule::at_least(65.0)),
    },
    IndicatorInfo {
        code: "env_wasgen",
        name: "Generation of waste by waste category",
        unit: Unit::Tonnes,
        rule: None,
    },
    IndicatorInfo {
        code: "env_wasmun",
        name: "Municipal waste per capita",
        unit: Unit::KilogramsPerCapita,
        rule: Some(ComplianceRule::at_most(450.0)),
    },
    IndicatorInfo {
        code: "env_air_gge",
        name: "Greenhouse gas emissions",
        unit: Unit::MegatonnesCo2e,
        rule: None,
    },
    IndicatorInfo {
        code: "nrg_ind_ren",
        name: "Share of energy from renewable sources",
        unit: Unit::Percent,
        rule: Some(ComplianceRule::at_least(42.5)),
    },
];

const OECD_INDICATORS: &[IndicatorInfo] = &[
    IndicatorInfo {
        code: "AIR_GHG",
        name: "Greenhouse gas emissions",
        unit: Unit::MegatonnesCo2e,
        rule: None,
    },
    IndicatorInfo {
        code: "MUNW",
        name: "Municipal waste generation",
        unit: Unit::Tonnes,
        rule: None,
    },
    IndicatorInfo {
        code: "GREEN_GROWTH",
        name: "Green growth indicators",
        unit: Unit::Unitless,
        rule: None,
    },
];

/// Returns the catalog rows for a provider.
///
/// The SPARQL adapter serves the same Eurostat datasets as the REST adapter.
#[must_use]
pub const fn known_indicators(provider: Provider) -> &'static [IndicatorInfo] {
    match provider {
        Provider::Eurostat | Provider::EurostatSparql => EUROSTAT_INDICATORS,
        Provider::Oecd => OECD_INDICATORS,
    }
}

/// Resolved, owned description of an indicator used while building records.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorMeta {
    /// Indicator code as requested.
    pub code: IndicatorCode,
    /// Display label (falls back to the code).
    pub name: String,
    /// Unit, `Unitless` when unknown.
    pub unit: Unit,
    /// Coarse topic tag.
    pub topic: &'static str,
    /// Coarse sector tag.
    pub sector: &'static str,
    /// Compliance target, if any.
    pub rule: Option<ComplianceRule>,
    /// Deep link to the dataset.
    pub source_url: Option<String>,
}

impl IndicatorMeta {
    /// Looks up an indicator, falling back to the raw code for unknown entries.
    #[must_use]
    pub fn lookup(provider: Provider, code: &IndicatorCode) -> Self {
        let info = known_indicators(provider)
            .iter()
            .find(|info| info.code == code.as_str());

        let (name, unit, rule) = match info {
            Some(info) => (info.name.to_string(), info.unit, info.rule),
            None => (code.to_string(), Unit::Unitless, None),
        };

        Self {
            topic: derive_topic(code.as_str(), &name),
            sector: derive_sector(code.as_str(), &name),
            source_url: Some(dataset_url(provider, code)),
            code: code.clone(),
            name,
            unit,
            rule,
        }
    }

    /// Formats a value with this indicator's unit.
    #[must_use]
    pub fn format_value(&self, value: f64) -> String {
        self.unit.format(value)
    }

    /// Applies this indicator's compliance rule.
    #[must_use]
    pub fn compliance(&self, value: f64) -> ComplianceFlag {
        self.rule
            .map_or(ComplianceFlag::Pending, |rule| rule.evaluate(self.unit, value))
    }
}

/// Builds the public dataset page for a code.
#[must_use]
pub fn dataset_url(provider: Provider, code: &IndicatorCode) -> String {
    match provider {
        Provider::Eurostat | Provider::EurostatSparql => format!(
            "https://ec.europa.eu/eurostat/databrowser/view/{code}/default/table?lang=en"
        ),
        Provider::Oecd => format!("https://stats.oecd.org/Index.aspx?DataSetCode={code}"),
    }
}

/// Derives the topic tag by substring match on code, then name.
#[must_use]
pub fn derive_topic(code: &str, name: &str) -> &'static str {
    let haystack = format!("{} {}", code, name).to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if has(&["ghg", "gge", "emission"]) {
        "emissions"
    } else if has(&["_wm", "was", "waste", "munw"]) {
        "waste"
    } else if has(&["srm", "material", "cei_"]) {
        "circular-economy"
    } else if has(&["nrg", "_ren", "renewable", "energy"]) {
        "energy"
    } else {
        "general"
    }
}

/// Derives the sector tag by substring match on code, then name.
#[must_use]
pub fn derive_sector(code: &str, name: &str) -> &'static str {
    let haystack = format!("{} {}", code, name).to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if has(&["nrg", "energy", "renewable"]) {
        "energy"
    } else if has(&["ghg", "gge", "emission", "air_"]) {
        "industry"
    } else if has(&["waste", "cei_", "env_", "munw", "material", "green"]) {
        "environment"
    } else {
        "general"
    }
}

const COUNTRIES: &[(&str, &str)] = &[
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("HR", "Croatia"),
    ("CY", "Cyprus"),
    ("CZ", "Czechia"),
    ("DK", "Denmark"),
    ("EE", "Estonia"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("DE", "Germany"),
    ("EL", "Greece"),
    ("GR", "Greece"),
    ("HU", "Hungary"),
    ("IE", "Ireland"),
    ("IT", "Italy"),
    ("LV", "Latvia"),
    ("LT", "Lithuania"),
    ("LU", "Luxembourg"),
    ("MT", "Malta"),
    ("NL", "Netherlands"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("SK", "Slovakia"),
    ("SI", "Slovenia"),
    ("ES", "Spain"),
    ("SE", "Sweden"),
    ("IS", "Iceland"),
    ("LI", "Liechtenstein"),
    ("NO", "Norway"),
    ("CH", "Switzerland"),
    ("UK", "United Kingdom"),
    ("GB", "United Kingdom"),
    ("EU27_2020", "European Union (27 countries)"),
    ("EU28", "European Union (28 countries)"),
    ("EA20", "Euro area (20 countries)"),
    ("AUT", "Austria"),
    ("BEL", "Belgium"),
    ("CZE", "Czechia"),
    ("DNK", "Denmark"),
    ("EST", "Estonia"),
    ("FIN", "Finland"),
    ("FRA", "France"),
    ("DEU", "Germany"),
    ("GRC", "Greece"),
    ("HUN", "Hungary"),
    ("IRL", "Ireland"),
    ("ITA", "Italy"),
    ("LVA", "Latvia"),
    ("LTU", "Lithuania"),
    ("LUX", "Luxembourg"),
    ("NLD", "Netherlands"),
    ("POL", "Poland"),
    ("PRT", "Portugal"),
    ("SVK", "Slovakia"),
    ("SVN", "Slovenia"),
    ("ESP", "Spain"),
    ("SWE", "Sweden"),
    ("ISL", "Iceland"),
    ("NOR", "Norway"),
    ("CHE", "Switzerland"),
    ("GBR", "United Kingdom"),
    ("USA", "United States"),
    ("CAN", "Canada"),
    ("JPN", "Japan"),
    ("KOR", "Korea"),
    ("AUS", "Australia"),
    ("OECD", "OECD total"),
];

/// Resolves a country or aggregate code to its English name.
///
/// Unknown codes pass through unchanged.
#[must_use]
pub fn country_name(code: &str) -> &str {
    COUNTRIES
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(code, |(_, name)| *name)
}

/// Returns true if the code is present in the country table.
#[must_use]
pub fn is_known_country(code: &str) -> bool {
    COUNTRIES.iter().any(|(c, _)| *c == code)
}

fn group_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if negative { format!("-{out}") } else { out }
}
