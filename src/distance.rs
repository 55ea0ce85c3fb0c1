//! Distance filter modes and the resolver that turns them into a concrete
//! distance list.

use crate::config::ALL_DISTANCES;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Race distance in metres.
pub type Distance = u16;

/// The static list of distances a query may mention, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceCatalog(Vec<Distance>);

impl DistanceCatalog {
    pub fn new(distances: Vec<Distance>) -> Self {
        Self(distances)
    }

    pub fn as_slice(&self) -> &[Distance] {
        &self.0
    }

    pub fn contains(&self, distance: Distance) -> bool {
        self.0.contains(&distance)
    }

    /// Smallest catalog distance, used as the initial range minimum.
    pub fn min(&self) -> Option<Distance> {
        self.0.iter().copied().min()
    }

    /// Largest catalog distance, used as the initial range maximum.
    pub fn max(&self) -> Option<Distance> {
        self.0.iter().copied().max()
    }
}

impl Default for DistanceCatalog {
    fn default() -> Self {
        Self(ALL_DISTANCES.to_vec())
    }
}

/// Which distance control is active in the filter form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    #[default]
    All,
    Range,
    Explicit,
}

impl DistanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMode::All => "all",
            DistanceMode::Range => "range",
            DistanceMode::Explicit => "explicit",
        }
    }
}

impl fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DistanceMode::All),
            "range" => Ok(DistanceMode::Range),
            "explicit" | "select" => Ok(DistanceMode::Explicit),
            other => Err(format!("Unknown distance mode '{}'", other)),
        }
    }
}

/// A resolved distance filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistanceSelection {
    All,
    Range { min: Distance, max: Distance },
    Explicit(Vec<Distance>),
}

/// Raw distance inputs as the form holds them. Bounds and the explicit set are
/// kept while switching modes so that switching back restores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceFilter {
    pub mode: DistanceMode,
    pub min: Distance,
    pub max: Distance,
    pub explicit: Vec<Distance>,
}

impl DistanceFilter {
    pub fn new(catalog: &DistanceCatalog) -> Self {
        Self {
            mode: DistanceMode::All,
            min: catalog.min().unwrap_or_default(),
            max: catalog.max().unwrap_or_default(),
            explicit: Vec::new(),
        }
    }

    pub fn selection(&self) -> DistanceSelection {
        match self.mode {
            DistanceMode::All => DistanceSelection::All,
            DistanceMode::Range => DistanceSelection::Range {
                min: self.min,
                max: self.max,
            },
            DistanceMode::Explicit => DistanceSelection::Explicit(self.explicit.clone()),
        }
    }

    pub fn resolve(&self, catalog: &DistanceCatalog) -> Vec<Distance> {
        resolve(&self.selection(), catalog)
    }
}

/// Derive the concrete distance list for a selection.
///
/// `All` and `Range` preserve catalog order. `Explicit` is deduplicated in
/// insertion order and is not checked against the catalog here; validation
/// reports unknown distances.
pub fn resolve(selection: &DistanceSelection, catalog: &DistanceCatalog) -> Vec<Distance> {
    match selection {
        DistanceSelection::All => catalog.as_slice().to_vec(),
        DistanceSelection::Range { min, max } => catalog
            .as_slice()
            .iter()
            .copied()
            .filter(|d| (*min..=*max).contains(d))
            .collect(),
        DistanceSelection::Explicit(set) => {
            let mut seen = HashSet::with_capacity(set.len());
            set.iter().copied().filter(|d| seen.insert(*d)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> DistanceCatalog {
        DistanceCatalog::new(vec![280, 480, 500, 600, 714])
    }

    #[test]
    fn all_ignores_bounds_and_explicit_set() {
        let catalog = small_catalog();
        let filter = DistanceFilter {
            mode: DistanceMode::All,
            min: 900,
            max: 100,
            explicit: vec![1],
        };
        assert_eq!(filter.resolve(&catalog), catalog.as_slice());
    }

    #[test]
    fn range_is_inclusive_and_keeps_catalog_order() {
        let catalog = small_catalog();
        let picked = resolve(&DistanceSelection::Range { min: 480, max: 600 }, &catalog);
        assert_eq!(picked, vec![480, 500, 600]);

        let single = resolve(&DistanceSelection::Range { min: 600, max: 600 }, &catalog);
        assert_eq!(single, vec![600]);
    }

    #[test]
    fn inverted_range_resolves_to_nothing() {
        let picked = resolve(
            &DistanceSelection::Range { min: 1000, max: 500 },
            &small_catalog(),
        );
        assert!(picked.is_empty());
    }

    #[test]
    fn explicit_set_is_deduplicated_in_insertion_order() {
        let picked = resolve(
            &DistanceSelection::Explicit(vec![500, 280, 500, 714, 280]),
            &small_catalog(),
        );
        assert_eq!(picked, vec![500, 280, 714]);
    }

    #[test]
    fn default_catalog_bounds_the_initial_range() {
        let filter = DistanceFilter::new(&DistanceCatalog::default());
        assert_eq!(filter.min, 238);
        assert_eq!(filter.max, 714);
        assert_eq!(filter.mode, DistanceMode::All);
    }

    #[test]
    fn mode_parses_form_values() {
        assert_eq!("select".parse::<DistanceMode>(), Ok(DistanceMode::Explicit));
        assert_eq!("range".parse::<DistanceMode>(), Ok(DistanceMode::Range));
        assert!("nearest".parse::<DistanceMode>().is_err());
    }
}
