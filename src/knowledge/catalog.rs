//! Manufacturer power table
//!
//! Known luminaire models and the rated powers each one is sold in. Used both
//! as extra model candidates and to validate numbers read off a nameplate.

use std::collections::BTreeMap;

/// Built-in models and their valid rated powers (watts)
pub const BUILTIN_POWER_TABLE: &[(&str, &[u32])] = &[
    ("PALLAS", &[23, 33, 47, 60, 75, 90, 110, 130, 155, 200]),
    ("KINGSUN", &[23, 33, 47, 60, 75, 90, 110, 130, 155, 200]),
    ("HBMI", &[50, 75, 100, 150, 200]),
    ("SCHREDER", &[36, 38, 39, 51, 56, 60, 75, 80, 110, 125, 145, 155, 212, 236]),
    ("VOLTANA", &[39, 56, 60, 75, 80, 110, 145, 212]),
    ("URBJET", &[40, 65, 130, 150, 213, 230]),
    ("BRIGHTLUX", &[40, 50, 65, 130, 150, 213, 230]),
    ("ALPER", &[35, 40, 60, 90, 100, 130, 200, 210]),
    ("REEME", &[51, 65, 82, 130, 290]),
    ("LEDSTAR", &[58, 61, 120, 200, 215]),
    ("PHILIPS", &[58, 127]),
    ("ORION", &[40, 55, 57, 58, 60, 100, 148, 150]),
    ("TECNOWATT", &[54, 60]),
    ("MERAK", &[54]),
    ("BORA", &[60]),
];

/// Model name to valid-power lookup
#[derive(Debug, Clone, Default)]
pub struct PowerCatalog {
    entries: BTreeMap<String, Vec<u32>>,
}

impl PowerCatalog {
    /// Catalog with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog seeded with the built-in table
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for (model, powers) in BUILTIN_POWER_TABLE {
            catalog.insert(model, powers.to_vec());
        }
        catalog
    }

    /// Add or replace a model's valid powers. Names are stored uppercase.
    pub fn insert(&mut self, model: &str, powers: Vec<u32>) {
        self.entries.insert(model.trim().to_uppercase(), powers);
    }

    /// Valid powers for `model`, if the model has a table entry
    pub fn valid_powers(&self, model: &str) -> Option<&[u32]> {
        self.entries.get(model).map(Vec::as_slice)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let catalog = PowerCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_POWER_TABLE.len());
        assert_eq!(catalog.valid_powers("MERAK"), Some(&[54][..]));
        assert!(catalog.valid_powers("VOLTANA").unwrap().contains(&60));
        assert!(catalog.valid_powers("UNKNOWN").is_none());
    }

    #[test]
    fn test_insert_normalises_name() {
        let mut catalog = PowerCatalog::empty();
        catalog.insert(" acme ", vec![40]);
        assert_eq!(catalog.valid_powers("ACME"), Some(&[40][..]));
    }
}
