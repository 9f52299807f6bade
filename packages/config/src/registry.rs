//! Compile-time registry of study areas.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a new area requires creating a TOML file in `areas/` and adding
//! a corresponding entry here.

use crate::{ConfigError, StudyArea};

/// Number of registered study areas. Enforced by a test.
#[cfg(test)]
const EXPECTED_AREA_COUNT: usize = 2;

/// Embedded TOML study area definitions.
const AREA_TOMLS: &[(&str, &str)] = &[
    ("wilmington", include_str!("../areas/wilmington.toml")),
    (
        "wilmington_downtown",
        include_str!("../areas/wilmington_downtown.toml"),
    ),
];

/// Returns all registered study areas.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if any embedded TOML file fails to parse.
pub fn all_areas() -> Result<Vec<StudyArea>, ConfigError> {
    AREA_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str).map_err(|source| ConfigError::Parse {
                name: (*name).to_string(),
                source: Box::new(source),
            })
        })
        .collect()
}

/// Finds and validates the study area with the given id.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownStudyArea`] if no area matches, or the
/// parse/validation error for the matching area.
pub fn find(id: &str) -> Result<StudyArea, ConfigError> {
    let areas = all_areas()?;
    let available = areas
        .iter()
        .map(|a| a.id.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let area = areas
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| ConfigError::UnknownStudyArea {
            id: id.to_string(),
            available,
        })?;

    area.validate()?;
    Ok(area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundarySource;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_areas() {
        let areas = all_areas().unwrap();
        assert_eq!(
            areas.len(),
            EXPECTED_AREA_COUNT,
            "Expected {EXPECTED_AREA_COUNT} study areas, found {}. \
             Update EXPECTED_AREA_COUNT after adding/removing areas.",
            areas.len()
        );
    }

    #[test]
    fn area_ids_are_unique() {
        let areas = all_areas().unwrap();
        let mut seen = BTreeSet::new();
        for area in &areas {
            assert!(seen.insert(&area.id), "Duplicate study area ID: {}", area.id);
        }
    }

    #[test]
    fn all_areas_are_valid() {
        for area in &all_areas().unwrap() {
            assert!(!area.name.is_empty(), "Area {} has empty name", area.id);
            assert!(
                !area.feature_label.is_empty(),
                "Area {} has empty feature label",
                area.id
            );
            area.validate()
                .unwrap_or_else(|e| panic!("Area {} failed validation: {e}", area.id));
        }
    }

    #[test]
    fn registry_names_match_ids() {
        let areas = all_areas().unwrap();
        for ((name, _), area) in AREA_TOMLS.iter().zip(&areas) {
            assert_eq!(*name, area.id);
        }
    }

    #[test]
    fn default_area_uses_city_relation() {
        let area = find(crate::DEFAULT_AREA_ID).unwrap();
        assert_eq!(
            area.boundary,
            BoundarySource::Relation {
                relation_id: 369_472
            }
        );
        assert_eq!(area.tags.len(), 3);
    }

    #[test]
    fn unknown_area_lists_available_ids() {
        let err = find("atlantis").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("atlantis"));
        assert!(message.contains("wilmington_downtown"));
    }
}
