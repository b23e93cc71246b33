//! Mapping resolver
//!
//! Loads the dimension tables for a request's company set once, then serves
//! tolerant lookups during assembly. Missing dimension rows never fail a
//! report; the affected cells simply come out unmapped.
//!
//! Join keys are trimmed exactly once, at load time. Lookups trim their
//! arguments so callers can pass source strings as-is.

use report_core::{
    types::{AccountMapping, CategoryMapping, CompanyRecord, FiscalCalendarEntry, Location},
    Storage,
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::error::Result;

/// Dimension tables for one request's company set
#[derive(Debug)]
pub struct MappingSet {
    companies: Vec<CompanyRecord>,
    rank_by_ext: HashMap<String, usize>,
    accounts: HashMap<(i64, String), AccountMapping>,
    categories: HashMap<String, CategoryMapping>,
    locations: HashMap<(String, String), Location>,
    fiscal: HashMap<(String, NaiveDate), FiscalCalendarEntry>,
    custom_columns: Vec<String>,
}

impl MappingSet {
    /// Bulk-load every dimension table the company set needs.
    ///
    /// Unknown external ids are skipped; the caller decides whether an empty
    /// company set is an error.
    pub fn load(storage: &Storage, tenant_id: i64, ext_company_ids: &[String]) -> Result<Self> {
        let trimmed_ids: Vec<String> =
            ext_company_ids.iter().map(|id| id.trim().to_string()).collect();
        let companies = storage.companies(tenant_id, &trimmed_ids)?;

        let rank_by_ext: HashMap<String, usize> = trimmed_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        // Only parented statement types are valid column sources
        let valid_fs_types: HashSet<String> = storage
            .fs_types(tenant_id)?
            .into_iter()
            .filter(|fs| fs.parent_id.is_some())
            .map(|fs| fs.name.trim().to_string())
            .collect();

        let categories: HashMap<String, CategoryMapping> = storage
            .category_mappings(tenant_id)?
            .into_iter()
            .map(|c| (c.uid.trim().to_string(), c))
            .collect();

        let mut accounts = HashMap::new();
        let mut locations = HashMap::new();
        let mut fiscal = HashMap::new();
        let mut custom_columns: Vec<String> = Vec::new();

        for company in &companies {
            for mapping in storage.account_mappings(tenant_id, company.id)? {
                // Column universe: distinct valid statement types across the
                // ENTIRE company set, in first-seen order
                if let Some(uid) = mapping.new_account_uid.as_deref() {
                    if let Some(category) = categories.get(uid.trim()) {
                        for label in &category.labels {
                            let name = label.fs_type.trim();
                            if valid_fs_types.contains(name)
                                && !custom_columns.iter().any(|c| c == name)
                            {
                                custom_columns.push(name.to_string());
                            }
                        }
                    }
                }
                accounts.insert(
                    (company.id, mapping.account_uid.trim().to_string()),
                    mapping,
                );
            }

            for location in storage.locations(tenant_id, &company.ext_company_id)? {
                locations.insert(
                    (company.ext_company_id.clone(), location.location_id.trim().to_string()),
                    location,
                );
            }

            for entry in storage.fiscal_entries(&company.entity_uid)? {
                fiscal.insert((entry.entity_uid.trim().to_string(), entry.date_key), entry);
            }
        }

        tracing::debug!(
            tenant_id,
            companies = companies.len(),
            accounts = accounts.len(),
            columns = custom_columns.len(),
            "Mapping set loaded"
        );

        Ok(Self {
            companies,
            rank_by_ext,
            accounts,
            categories,
            locations,
            fiscal,
            custom_columns,
        })
    }

    /// Companies in request order
    pub fn companies(&self) -> &[CompanyRecord] {
        &self.companies
    }

    /// Registry record for an external company id
    pub fn company(&self, ext_id: &str) -> Option<&CompanyRecord> {
        let ext_id = ext_id.trim();
        self.companies.iter().find(|c| c.ext_company_id == ext_id)
    }

    /// Position of the company in the request's ordered company list.
    /// Unknown companies sort after every known one.
    pub fn entity_rank(&self, ext_id: &str) -> usize {
        self.rank_by_ext.get(ext_id.trim()).copied().unwrap_or(usize::MAX)
    }

    /// Account mapping for a source account
    pub fn account(&self, ext_id: &str, account_uid: &str) -> Option<&AccountMapping> {
        let company = self.company(ext_id)?;
        self.accounts.get(&(company.id, account_uid.trim().to_string()))
    }

    /// Category record behind an account mapping's `new_account_uid`
    pub fn category(&self, new_account_uid: &str) -> Option<&CategoryMapping> {
        self.categories.get(new_account_uid.trim())
    }

    /// Location record
    pub fn location(&self, ext_id: &str, location_id: &str) -> Option<&Location> {
        self.locations
            .get(&(ext_id.trim().to_string(), location_id.trim().to_string()))
    }

    /// Fiscal calendar entry for an entity and date
    pub fn fiscal(&self, entity_uid: &str, date: NaiveDate) -> Option<&FiscalCalendarEntry> {
        self.fiscal.get(&(entity_uid.trim().to_string(), date))
    }

    /// The global custom-column universe, in first-seen order
    pub fn custom_columns(&self) -> &[String] {
        &self.custom_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::types::{FsType, StatementLabel};
    use report_core::Config;
    use tempfile::TempDir;

    fn seeded_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Storage::open(&config).unwrap();

        for (internal, ext, entity) in [(1, "C1", "E1"), (2, "C2", "E2")] {
            storage
                .put_company(&CompanyRecord {
                    id: internal,
                    tenant_id: 7,
                    ext_company_id: ext.to_string(),
                    name: format!("Company {}", ext),
                    entity_uid: entity.to_string(),
                    entity_group: "G1".to_string(),
                    fiscal_year_start_month: 1,
                })
                .unwrap();
        }

        // Parented statement types are valid; the root is not
        for (id, name, parent) in [(1, "Root", None), (2, "FS-Alpha", Some(1)), (3, "FS-Beta", Some(1))] {
            storage
                .put_fs_type(&FsType {
                    tenant_id: 7,
                    id,
                    name: name.to_string(),
                    parent_id: parent,
                })
                .unwrap();
        }

        storage
            .put_category_mapping(&CategoryMapping {
                tenant_id: 7,
                uid: "cat-1".to_string(),
                financial_report: Some("BS".to_string()),
                fs_id_description: Some("Assets".to_string()),
                labels: vec![
                    StatementLabel {
                        fs_type: "FS-Alpha".to_string(),
                        description: "Current Assets".to_string(),
                    },
                    StatementLabel {
                        fs_type: "Root".to_string(),
                        description: "should not become a column".to_string(),
                    },
                ],
            })
            .unwrap();
        storage
            .put_category_mapping(&CategoryMapping {
                tenant_id: 7,
                uid: "cat-2".to_string(),
                financial_report: Some("PL".to_string()),
                fs_id_description: Some("Income".to_string()),
                labels: vec![StatementLabel {
                    fs_type: "FS-Beta".to_string(),
                    description: "Revenue".to_string(),
                }],
            })
            .unwrap();

        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 1,
                account_uid: " acct-1 ".to_string(),
                account_number: Some("100".to_string()),
                new_account_uid: Some("cat-1".to_string()),
                location_id: Some("L1".to_string()),
            })
            .unwrap();
        storage
            .put_account_mapping(&AccountMapping {
                tenant_id: 7,
                company_id: 2,
                account_uid: "acct-9".to_string(),
                account_number: Some("900".to_string()),
                new_account_uid: Some("cat-2".to_string()),
                location_id: None,
            })
            .unwrap();

        storage
            .put_location(&Location {
                tenant_id: 7,
                company_id: "C1".to_string(),
                location_id: "L1".to_string(),
                name: "Head Office".to_string(),
            })
            .unwrap();

        (storage, temp_dir)
    }

    #[test]
    fn test_columns_discovered_across_company_set() {
        let (storage, _temp) = seeded_storage();
        let set =
            MappingSet::load(&storage, 7, &["C1".to_string(), "C2".to_string()]).unwrap();

        // C1 contributes FS-Alpha, C2 contributes FS-Beta; the unparented
        // root never becomes a column
        assert_eq!(set.custom_columns(), ["FS-Alpha", "FS-Beta"]);
    }

    #[test]
    fn test_trimmed_account_lookup() {
        let (storage, _temp) = seeded_storage();
        let set = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();

        // Stored uid had padding; lookup with either form resolves
        let mapping = set.account("C1", "acct-1").unwrap();
        assert_eq!(mapping.account_number.as_deref(), Some("100"));
        assert!(set.account("C1", "  acct-1  ").is_some());
        assert!(set.account("C1", "acct-unknown").is_none());
    }

    #[test]
    fn test_entity_rank_follows_request_order() {
        let (storage, _temp) = seeded_storage();
        let set =
            MappingSet::load(&storage, 7, &["C2".to_string(), "C1".to_string()]).unwrap();
        assert_eq!(set.entity_rank("C2"), 0);
        assert_eq!(set.entity_rank("C1"), 1);
        assert_eq!(set.entity_rank("C99"), usize::MAX);
    }

    #[test]
    fn test_missing_rows_are_tolerated() {
        let (storage, _temp) = seeded_storage();
        let set = MappingSet::load(&storage, 7, &["C1".to_string()]).unwrap();
        assert!(set.location("C1", "L-missing").is_none());
        assert!(set.fiscal("E1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_none());
        assert!(set.category("cat-missing").is_none());
    }
}
