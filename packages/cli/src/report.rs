//! Plain-text coverage report printed at the end of a run.

use std::fmt;

use coverage_map_config::StudyArea;
use coverage_map_coverage_models::CoverageStats;

/// Everything needed to render the summary for one study area.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub area_name: String,
    pub feature_label: String,
    pub tags: Vec<String>,
    pub stats: CoverageStats,
}

impl CoverageReport {
    #[must_use]
    pub fn new(area: &StudyArea, stats: CoverageStats) -> Self {
        Self {
            area_name: area.name.clone(),
            feature_label: area.feature_label.clone(),
            tags: area.tags.iter().map(ToString::to_string).collect(),
            stats,
        }
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = &self.feature_label;
        let s = &self.stats;

        writeln!(f, "{}", self.area_name)?;
        writeln!(f, "{} Coverage", capitalize(label))?;
        writeln!(f)?;
        writeln!(
            f,
            "  {:.1}%  of {} area is {label}",
            s.coverage_percent, self.area_name
        )?;
        writeln!(f, "  {}  {label} areas", s.target_count)?;
        writeln!(f, "  {:.0}  acres of {label}", s.target_area_acres)?;
        writeln!(f, "  {:.1}  sq mi total area", s.region_area_sq_mi)?;
        if let Some(avg) = s.average_target_acres {
            writeln!(f, "  {avg:.2}  acres per {label} area (average)")?;
        }
        writeln!(f)?;
        write!(
            f,
            "Data from OpenStreetMap. Includes features tagged with {}.",
            join_or(&self.tags)
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Joins items as "a", "a or b", or "a, b, or c".
fn join_or(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}
