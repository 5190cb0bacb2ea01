use std::collections::BTreeMap;

use fxhash::FxHashMap;

use super::constants::DEFAULT_SELECTIONS;
use super::error::CatalogError;

/// A named data selection and the number of weekly files it keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTag {
    pub name: String,
    pub n_weeks: u32,
}

/// SelectionCatalog maps a selection tag (week, month, ...) to its inclusion count.
///
/// The bundled table can be extended or overridden by the `selections` entry of a Config,
/// so new selections don't require a rebuild.
#[derive(Debug, Clone)]
pub struct SelectionCatalog {
    map: FxHashMap<String, u32>,
}

impl Default for SelectionCatalog {
    /// The bundled selection table
    fn default() -> Self {
        Self {
            map: DEFAULT_SELECTIONS
                .iter()
                .map(|(tag, weeks)| (tag.to_string(), *weeks))
                .collect(),
        }
    }
}

impl SelectionCatalog {
    /// Create a catalog containing only the given entries
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            map: entries
                .into_iter()
                .map(|(tag, weeks)| (tag.into(), weeks))
                .collect(),
        }
    }

    /// The bundled table with the overrides applied on top
    pub fn with_overrides(overrides: &BTreeMap<String, u32>) -> Self {
        let mut catalog = Self::default();
        for (tag, weeks) in overrides {
            catalog.map.insert(tag.clone(), *weeks);
        }
        catalog
    }

    /// Look up a selection by tag
    pub fn resolve(&self, tag: &str) -> Result<SelectionTag, CatalogError> {
        match self.map.get(tag) {
            Some(weeks) => Ok(SelectionTag {
                name: tag.to_string(),
                n_weeks: *weeks,
            }),
            None => Err(CatalogError::UnknownSelection(tag.to_string())),
        }
    }

    /// All selections, ordered by inclusion count and then by name
    pub fn entries(&self) -> Vec<SelectionTag> {
        let mut entries: Vec<SelectionTag> = self
            .map
            .iter()
            .map(|(name, weeks)| SelectionTag {
                name: name.clone(),
                n_weeks: *weeks,
            })
            .collect();
        entries.sort_by(|a, b| a.n_weeks.cmp(&b.n_weeks).then_with(|| a.name.cmp(&b.name)));
        entries
    }
}

/// Split command line tag arguments on commas. `["week,month", "all"]` -> `[week, month, all]`.
///
/// Order and duplicates are kept; blank items are dropped.
pub fn parse_tags<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.as_ref().split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}
