//! Maps raw weapon names onto the category columns of the kill and death tables.
//!
//! The mapping comes from a CSV with the headers `WeaponType,ValidNames,FriendlyName`.
//! Each `ValidNames` cell is a `;` separated list of names as they appear in the
//! scoreboard payloads. Matching ignores case. The lowercased `WeaponType` is the
//! column name, so it has to be a plain SQL identifier.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::Error;

const KEY_COLUMNS: [&str; 4] = ["player_id", "match_id", "player_name", "team"];

#[derive(Debug, Clone, Default)]
pub struct WeaponRegistry {
    categories: Vec<String>,
    /// Lowercased weapon name to index into `categories`.
    names: HashMap<String, usize>,
}

/// Per category counts for one player, aligned with [`WeaponRegistry::categories`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponTally {
    pub counts: Vec<i32>,
    /// Weapon names with no category. Their counts are not in `counts`.
    pub unmapped: Vec<String>,
}

impl WeaponRegistry {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let registry = Self::from_reader(file)?;

        tracing::info!(
            "Loaded {} weapon names into {} categories from {}",
            registry.names.len(),
            registry.categories.len(),
            path.display()
        );

        Ok(registry)
    }

    pub fn from_reader<R>(reader: R) -> Result<Self, Error>
    where
        R: std::io::Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or(Error::MissingColumn(name))
        };
        let type_idx = column("WeaponType")?;
        let names_idx = column("ValidNames")?;

        let mut mapping: HashMap<String, String> = HashMap::new();
        for record in reader.records() {
            let record = record?;

            let weapon_type = record.get(type_idx).unwrap_or_default();
            let valid_names = record.get(names_idx).unwrap_or_default();
            if weapon_type.is_empty() || valid_names.is_empty() {
                continue;
            }

            let category = weapon_type.to_lowercase();
            if !is_identifier(&category) || KEY_COLUMNS.contains(&category.as_str()) {
                return Err(Error::InvalidCategory(category));
            }

            for name in valid_names.split(';').map(str::trim).filter(|n| !n.is_empty()) {
                mapping.insert(name.to_lowercase(), category.clone());
            }
        }

        let categories = mapping
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let names = mapping
            .into_iter()
            .filter_map(|(name, category)| {
                categories
                    .binary_search(&category)
                    .ok()
                    .map(|idx| (name, idx))
            })
            .collect();

        Ok(Self { categories, names })
    }

    /// Sorted and free of duplicates.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_for(&self, weapon: &str) -> Option<&str> {
        self.names
            .get(&weapon.to_lowercase())
            .map(|idx| self.categories[*idx].as_str())
    }

    /// Sums `weapon_counts` per category. Every category starts at zero.
    pub fn tally(&self, weapon_counts: &BTreeMap<String, i32>) -> WeaponTally {
        let mut counts = vec![0i32; self.categories.len()];
        let mut unmapped = Vec::new();

        for (weapon, count) in weapon_counts {
            match self.names.get(&weapon.to_lowercase()) {
                Some(idx) => counts[*idx] = counts[*idx].saturating_add(*count),
                None => unmapped.push(weapon.clone()),
            }
        }

        WeaponTally { counts, unmapped }
    }
}

/// `[a-z_][a-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    };
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
