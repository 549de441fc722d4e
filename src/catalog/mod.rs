// ABOUTME: Relation metadata catalog configuration and bookkeeping
// ABOUTME: Maps catalog features to their backing tables in the control database

pub mod duplicate;
pub mod rename;

pub use duplicate::{duplicate_column_info, duplicate_info, duplicate_table_entries, DuplicateOutcome};
pub use rename::rename_table_entry;

use crate::identifier::qualify;
use serde::{Deserialize, Serialize};

/// Catalog features, each backed by one table in the control database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFeature {
    /// Column comments and MIME transformations (`column_info`)
    ColumnComments,
    /// Display field per table (`table_info`)
    Display,
    /// Cross-table relation links (`relation`)
    Relations,
    /// Designer/PDF page coordinates (`table_coords`)
    PdfCoordinates,
    /// Per-table UI preferences (`table_uiprefs`)
    UiPreferences,
    /// Hidden navigation items (`navigationhiding`)
    NavigationHiding,
}

/// Where the catalog lives and which features are configured.
///
/// A feature is enabled when both `database` and its table name are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: Option<String>,
    pub column_info: Option<String>,
    pub table_info: Option<String>,
    pub relation: Option<String>,
    pub table_coords: Option<String>,
    pub table_uiprefs: Option<String>,
    pub navigation_hiding: Option<String>,
    /// `column_info` also carries mimetype/transformation columns
    pub mime_enabled: bool,
}

/// A resolved catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogTable<'a> {
    pub database: &'a str,
    pub table: &'a str,
}

impl CatalogTable<'_> {
    pub fn qualified(&self) -> String {
        qualify(self.database, self.table)
    }
}

impl CatalogConfig {
    /// Catalog using the conventional `pma__*` table names in `database`
    pub fn with_default_tables(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            column_info: Some("pma__column_info".to_string()),
            table_info: Some("pma__table_info".to_string()),
            relation: Some("pma__relation".to_string()),
            table_coords: Some("pma__table_coords".to_string()),
            table_uiprefs: Some("pma__table_uiprefs".to_string()),
            navigation_hiding: Some("pma__navigationhiding".to_string()),
            mime_enabled: true,
        }
    }

    /// Backing table of `feature`, `None` when the feature is disabled
    pub fn table_for(&self, feature: CatalogFeature) -> Option<CatalogTable<'_>> {
        let database = non_empty(self.database.as_deref())?;
        let table = match feature {
            CatalogFeature::ColumnComments => &self.column_info,
            CatalogFeature::Display => &self.table_info,
            CatalogFeature::Relations => &self.relation,
            CatalogFeature::PdfCoordinates => &self.table_coords,
            CatalogFeature::UiPreferences => &self.table_uiprefs,
            CatalogFeature::NavigationHiding => &self.navigation_hiding,
        };
        Some(CatalogTable {
            database,
            table: non_empty(table.as_deref())?,
        })
    }

    pub fn is_enabled(&self, feature: CatalogFeature) -> bool {
        self.table_for(feature).is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
