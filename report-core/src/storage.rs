//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `gl_rows` / `tb_rows` / `coa_rows` - Imported report rows
//!   (key: tenant|company|bucket_start|row_id)
//! - `markers` - Empty-bucket markers (key: tenant|company|kind|bucket_start)
//! - `requests` - Import cohort rows (key: request_number|kind|company)
//! - `credentials` - Source API credentials (key: tenant|company)
//! - `companies`, `account_mappings`, `category_mappings`, `fs_types`,
//!   `fiscal_calendar`, `locations` - Dimension tables
//! - `journal_headers` / `journal_details` - Journal data for adjusting entries
//! - `removed` - Archive of soft-deleted rows moved out by the housekeeping
//!   sweep
//!
//! Bucket replacement commits the tombstones and the new rows in a single
//! `WriteBatch`, so a bucket is never observable half-replaced.

use crate::{
    error::{Error, Result},
    period,
    types::{
        AccountMapping, CategoryMapping, CompanyRecord, Credential, FiscalCalendarEntry, FsType,
        ImportMarker, ImportRequest, JournalDetail, JournalHeader, Location, ReportKind, ReportRow,
    },
    Config,
};
use chrono::{NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Column family names
const CF_GL_ROWS: &str = "gl_rows";
const CF_TB_ROWS: &str = "tb_rows";
const CF_COA_ROWS: &str = "coa_rows";
const CF_MARKERS: &str = "markers";
const CF_REQUESTS: &str = "requests";
const CF_CREDENTIALS: &str = "credentials";
const CF_COMPANIES: &str = "companies";
const CF_ACCOUNT_MAPPINGS: &str = "account_mappings";
const CF_CATEGORY_MAPPINGS: &str = "category_mappings";
const CF_FS_TYPES: &str = "fs_types";
const CF_FISCAL_CALENDAR: &str = "fiscal_calendar";
const CF_LOCATIONS: &str = "locations";
const CF_JOURNAL_HEADERS: &str = "journal_headers";
const CF_JOURNAL_DETAILS: &str = "journal_details";
const CF_REMOVED: &str = "removed";

const ALL_CFS: &[&str] = &[
    CF_GL_ROWS,
    CF_TB_ROWS,
    CF_COA_ROWS,
    CF_MARKERS,
    CF_REQUESTS,
    CF_CREDENTIALS,
    CF_COMPANIES,
    CF_ACCOUNT_MAPPINGS,
    CF_CATEGORY_MAPPINGS,
    CF_FS_TYPES,
    CF_FISCAL_CALENDAR,
    CF_LOCATIONS,
    CF_JOURNAL_HEADERS,
    CF_JOURNAL_DETAILS,
    CF_REMOVED,
];

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?} with {} column families", path, ALL_CFS.len());

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            // Row families are bulk-written once per bucket, read in scans
            CF_GL_ROWS | CF_TB_ROWS | CF_COA_ROWS | CF_REMOVED => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            _ => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn row_cf_name(kind: ReportKind) -> &'static str {
        match kind {
            ReportKind::GeneralLedger => CF_GL_ROWS,
            ReportKind::TrialBalance => CF_TB_ROWS,
            ReportKind::ChartOfAccounts => CF_COA_ROWS,
        }
    }

    /// Collect all key/value pairs under a key prefix
    fn prefix_scan(&self, cf_name: &str, prefix: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf_handle(cf_name)?;
        let mode = IteratorMode::From(prefix.as_bytes(), rocksdb::Direction::Forward);
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    // Key helpers

    fn row_key<R: ReportRow>(row: &R) -> String {
        format!(
            "{}|{}|{}|{}",
            row.tenant_id(),
            row.company_id(),
            row.bucket_start().format("%Y-%m-%d"),
            row.row_id()
        )
    }

    fn row_prefix(tenant_id: i64, company_id: &str) -> String {
        format!("{}|{}|", tenant_id, company_id)
    }

    fn marker_key(tenant_id: i64, company_id: &str, kind: ReportKind, bucket: NaiveDate) -> String {
        format!("{}|{}|{}|{}", tenant_id, company_id, kind, bucket.format("%Y-%m-%d"))
    }

    fn request_key(request_number: &str, kind: ReportKind, company_id: &str) -> String {
        format!("{}|{}|{}", request_number, kind, company_id)
    }

    // Report row operations

    /// Replace one month bucket atomically: tombstone the live rows in the
    /// bucket's calendar month, insert the new rows, and clear any
    /// empty-bucket marker for that month. Returns the number of rows
    /// inserted.
    pub fn replace_bucket<R: ReportRow>(
        &self,
        tenant_id: i64,
        company_id: &str,
        bucket_start: NaiveDate,
        rows: &[R],
    ) -> Result<usize> {
        let cf_name = Self::row_cf_name(R::KIND);
        let cf = self.cf_handle(cf_name)?;
        let cf_markers = self.cf_handle(CF_MARKERS)?;

        let month_start = period::month_floor(bucket_start);
        let month_end = period::end_of_month(bucket_start);

        let mut batch = WriteBatch::default();

        // Tombstone live rows whose bucket lies in the same calendar month
        for (key, value) in self.prefix_scan(cf_name, &Self::row_prefix(tenant_id, company_id))? {
            let mut row: R = bincode::deserialize(&value)?;
            if row.is_deleted() {
                continue;
            }
            let bucket = row.bucket_start();
            if bucket >= month_start && bucket <= month_end {
                row.set_deleted(true);
                batch.put_cf(cf, &key, bincode::serialize(&row)?);
            }
        }

        // Clear markers for the month
        for (key, value) in
            self.prefix_scan(CF_MARKERS, &format!("{}|{}|{}|", tenant_id, company_id, R::KIND))?
        {
            let marker: ImportMarker = bincode::deserialize(&value)?;
            if marker.bucket_start >= month_start && marker.bucket_start <= month_end {
                batch.delete_cf(cf_markers, &key);
            }
        }

        for row in rows {
            batch.put_cf(cf, Self::row_key(row), bincode::serialize(row)?);
        }

        self.db.write(batch)?;

        tracing::debug!(
            tenant_id,
            company_id,
            kind = %R::KIND,
            bucket = %bucket_start,
            rows = rows.len(),
            "Bucket replaced"
        );

        Ok(rows.len())
    }

    /// Record that a fetch produced no rows for a bucket: tombstone any
    /// existing live rows in the month and write the marker, atomically.
    pub fn mark_empty_bucket<R: ReportRow>(
        &self,
        tenant_id: i64,
        company_id: &str,
        bucket_start: NaiveDate,
    ) -> Result<()> {
        let cf_name = Self::row_cf_name(R::KIND);
        let cf = self.cf_handle(cf_name)?;
        let cf_markers = self.cf_handle(CF_MARKERS)?;

        let month_start = period::month_floor(bucket_start);
        let month_end = period::end_of_month(bucket_start);

        let mut batch = WriteBatch::default();

        for (key, value) in self.prefix_scan(cf_name, &Self::row_prefix(tenant_id, company_id))? {
            let mut row: R = bincode::deserialize(&value)?;
            if row.is_deleted() {
                continue;
            }
            let bucket = row.bucket_start();
            if bucket >= month_start && bucket <= month_end {
                row.set_deleted(true);
                batch.put_cf(cf, &key, bincode::serialize(&row)?);
            }
        }

        let marker = ImportMarker {
            tenant_id,
            company_id: company_id.to_string(),
            kind: R::KIND,
            bucket_start,
            created_at: Utc::now(),
        };
        batch.put_cf(
            cf_markers,
            Self::marker_key(tenant_id, company_id, R::KIND, bucket_start),
            bincode::serialize(&marker)?,
        );

        self.db.write(batch)?;
        Ok(())
    }

    /// Live (non-tombstoned) rows for a company whose bucket falls inside
    /// `[month_floor(start), end]`
    pub fn live_rows<R: ReportRow>(
        &self,
        tenant_id: i64,
        company_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<R>> {
        let cf_name = Self::row_cf_name(R::KIND);
        let range_start = period::month_floor(start);
        let mut rows = Vec::new();
        for (_, value) in self.prefix_scan(cf_name, &Self::row_prefix(tenant_id, company_id))? {
            let row: R = bincode::deserialize(&value)?;
            if row.is_deleted() {
                continue;
            }
            let bucket = row.bucket_start();
            if bucket >= range_start && bucket <= end {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Whether any live rows exist for the company in the range
    pub fn has_live_rows<R: ReportRow>(
        &self,
        tenant_id: i64,
        company_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool> {
        Ok(!self.live_rows::<R>(tenant_id, company_id, start, end)?.is_empty())
    }

    /// Empty-bucket markers for a company in the range
    pub fn markers(
        &self,
        tenant_id: i64,
        company_id: &str,
        kind: ReportKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ImportMarker>> {
        let range_start = period::month_floor(start);
        let mut markers = Vec::new();
        for (_, value) in
            self.prefix_scan(CF_MARKERS, &format!("{}|{}|{}|", tenant_id, company_id, kind))?
        {
            let marker: ImportMarker = bincode::deserialize(&value)?;
            if marker.bucket_start >= range_start && marker.bucket_start <= end {
                markers.push(marker);
            }
        }
        Ok(markers)
    }

    // Import cohort operations

    /// Insert or overwrite a cohort row
    pub fn put_import_request(&self, request: &ImportRequest) -> Result<()> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let key = Self::request_key(&request.request_number, request.kind, &request.company_id);
        self.db.put_cf(cf, key, bincode::serialize(request)?)?;
        Ok(())
    }

    /// Flip a cohort member's `imported` flag
    pub fn mark_request_imported(
        &self,
        request_number: &str,
        kind: ReportKind,
        company_id: &str,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let key = Self::request_key(request_number, kind, company_id);
        let value = self
            .db
            .get_cf(cf, &key)?
            .ok_or_else(|| Error::Storage(format!("Import request not found: {}", key)))?;
        let mut request: ImportRequest = bincode::deserialize(&value)?;
        request.imported = true;
        self.db.put_cf(cf, &key, bincode::serialize(&request)?)?;
        Ok(())
    }

    /// All cohort rows sharing a request number, across every report kind.
    /// Completion of a request means every member row is imported, whatever
    /// report it was scheduled for.
    pub fn cohort(&self, request_number: &str) -> Result<Vec<ImportRequest>> {
        let mut out = Vec::new();
        for (_, value) in self.prefix_scan(CF_REQUESTS, &format!("{}|", request_number))? {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    // Credential operations

    /// Store a credential
    pub fn put_credential(&self, credential: &Credential) -> Result<()> {
        let cf = self.cf_handle(CF_CREDENTIALS)?;
        let key = format!("{}|{}", credential.tenant_id, credential.company_id);
        self.db.put_cf(cf, key, bincode::serialize(credential)?)?;
        Ok(())
    }

    /// Look up a company's credential
    pub fn credential(&self, tenant_id: i64, company_id: &str) -> Result<Option<Credential>> {
        let cf = self.cf_handle(CF_CREDENTIALS)?;
        let key = format!("{}|{}", tenant_id, company_id);
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Dimension tables

    /// Store a company registry record
    pub fn put_company(&self, company: &CompanyRecord) -> Result<()> {
        let cf = self.cf_handle(CF_COMPANIES)?;
        let key = format!("{}|{}", company.tenant_id, company.ext_company_id);
        self.db.put_cf(cf, key, bincode::serialize(company)?)?;
        Ok(())
    }

    /// Registry records for a set of external company ids, in input order.
    /// Unknown ids are skipped.
    pub fn companies(&self, tenant_id: i64, ext_ids: &[String]) -> Result<Vec<CompanyRecord>> {
        let cf = self.cf_handle(CF_COMPANIES)?;
        let mut out = Vec::new();
        for ext_id in ext_ids {
            let key = format!("{}|{}", tenant_id, ext_id);
            if let Some(value) = self.db.get_cf(cf, key)? {
                out.push(bincode::deserialize(&value)?);
            }
        }
        Ok(out)
    }

    /// Store an account mapping
    pub fn put_account_mapping(&self, mapping: &AccountMapping) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNT_MAPPINGS)?;
        let key = format!(
            "{}|{}|{}",
            mapping.tenant_id,
            mapping.company_id,
            mapping.account_uid.trim()
        );
        self.db.put_cf(cf, key, bincode::serialize(mapping)?)?;
        Ok(())
    }

    /// Account mappings for one internal company
    pub fn account_mappings(&self, tenant_id: i64, company_id: i64) -> Result<Vec<AccountMapping>> {
        let mut out = Vec::new();
        for (_, value) in
            self.prefix_scan(CF_ACCOUNT_MAPPINGS, &format!("{}|{}|", tenant_id, company_id))?
        {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    /// Store a category mapping
    pub fn put_category_mapping(&self, mapping: &CategoryMapping) -> Result<()> {
        let cf = self.cf_handle(CF_CATEGORY_MAPPINGS)?;
        let key = format!("{}|{}", mapping.tenant_id, mapping.uid.trim());
        self.db.put_cf(cf, key, bincode::serialize(mapping)?)?;
        Ok(())
    }

    /// All category mappings for a tenant
    pub fn category_mappings(&self, tenant_id: i64) -> Result<Vec<CategoryMapping>> {
        let mut out = Vec::new();
        for (_, value) in self.prefix_scan(CF_CATEGORY_MAPPINGS, &format!("{}|", tenant_id))? {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    /// Store a statement-type taxonomy row
    pub fn put_fs_type(&self, fs_type: &FsType) -> Result<()> {
        let cf = self.cf_handle(CF_FS_TYPES)?;
        let key = format!("{}|{:010}", fs_type.tenant_id, fs_type.id);
        self.db.put_cf(cf, key, bincode::serialize(fs_type)?)?;
        Ok(())
    }

    /// All statement-type rows for a tenant
    pub fn fs_types(&self, tenant_id: i64) -> Result<Vec<FsType>> {
        let mut out = Vec::new();
        for (_, value) in self.prefix_scan(CF_FS_TYPES, &format!("{}|", tenant_id))? {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    /// Store one fiscal calendar day
    pub fn put_fiscal_entry(&self, entry: &FiscalCalendarEntry) -> Result<()> {
        let cf = self.cf_handle(CF_FISCAL_CALENDAR)?;
        let key = format!(
            "{}|{}",
            entry.entity_uid.trim(),
            entry.date_key.format("%Y-%m-%d")
        );
        self.db.put_cf(cf, key, bincode::serialize(entry)?)?;
        Ok(())
    }

    /// All fiscal calendar days for an entity
    pub fn fiscal_entries(&self, entity_uid: &str) -> Result<Vec<FiscalCalendarEntry>> {
        let mut out = Vec::new();
        for (_, value) in
            self.prefix_scan(CF_FISCAL_CALENDAR, &format!("{}|", entity_uid.trim()))?
        {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    /// Store a location record
    pub fn put_location(&self, location: &Location) -> Result<()> {
        let cf = self.cf_handle(CF_LOCATIONS)?;
        let key = format!(
            "{}|{}|{}",
            location.tenant_id,
            location.company_id,
            location.location_id.trim()
        );
        self.db.put_cf(cf, key, bincode::serialize(location)?)?;
        Ok(())
    }

    /// Location records for a company
    pub fn locations(&self, tenant_id: i64, company_id: &str) -> Result<Vec<Location>> {
        let mut out = Vec::new();
        for (_, value) in
            self.prefix_scan(CF_LOCATIONS, &format!("{}|{}|", tenant_id, company_id))?
        {
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    // Journal data (adjusting entries)

    /// Store a journal header
    pub fn put_journal_header(&self, header: &JournalHeader) -> Result<()> {
        let cf = self.cf_handle(CF_JOURNAL_HEADERS)?;
        let key = format!("{}|{}|{}", header.tenant_id, header.company_id, header.journal_id);
        self.db.put_cf(cf, key, bincode::serialize(header)?)?;
        Ok(())
    }

    /// Store a journal detail line
    pub fn put_journal_detail(&self, detail: &JournalDetail) -> Result<()> {
        let cf = self.cf_handle(CF_JOURNAL_DETAILS)?;
        let key = format!(
            "{}|{}|{}|{}|{:06}",
            detail.tenant_id,
            detail.company_id,
            detail.account_uid.trim(),
            detail.journal_id,
            detail.line_no
        );
        self.db.put_cf(cf, key, bincode::serialize(detail)?)?;
        Ok(())
    }

    /// Detail lines of UNPOSTED journals touching an account. Posted
    /// journals are already reflected in the ledger and never contribute
    /// adjusting entries.
    pub fn unposted_journal_details(
        &self,
        tenant_id: i64,
        company_id: &str,
        account_uid: &str,
    ) -> Result<Vec<JournalDetail>> {
        let cf_headers = self.cf_handle(CF_JOURNAL_HEADERS)?;
        let mut out = Vec::new();
        for (_, value) in self.prefix_scan(
            CF_JOURNAL_DETAILS,
            &format!("{}|{}|{}|", tenant_id, company_id, account_uid.trim()),
        )? {
            let detail: JournalDetail = bincode::deserialize(&value)?;
            let header_key = format!("{}|{}|{}", tenant_id, company_id, detail.journal_id);
            let posted = match self.db.get_cf(cf_headers, header_key)? {
                Some(bytes) => bincode::deserialize::<JournalHeader>(&bytes)?.posted,
                None => continue,
            };
            if !posted {
                out.push(detail);
            }
        }
        Ok(out)
    }

    // Housekeeping

    /// Move all tombstoned report rows into the `removed` archive family and
    /// hard-delete them from the live families. One atomic batch per family.
    /// Returns the number of rows archived.
    pub fn archive_soft_deleted(&self) -> Result<u64> {
        let mut total = 0u64;
        total += self.sweep_cf::<crate::types::GeneralLedgerRow>()?;
        total += self.sweep_cf::<crate::types::TrialBalanceRow>()?;
        total += self.sweep_cf::<crate::types::ChartOfAccountsRow>()?;
        if total > 0 {
            tracing::info!(rows = total, "Archived soft-deleted report rows");
        }
        Ok(total)
    }

    fn sweep_cf<R: ReportRow>(&self) -> Result<u64> {
        let cf_name = Self::row_cf_name(R::KIND);
        let cf = self.cf_handle(cf_name)?;
        let cf_removed = self.cf_handle(CF_REMOVED)?;

        let mut batch = WriteBatch::default();
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let row: R = bincode::deserialize(&value)?;
            if row.is_deleted() {
                let mut removed_key = format!("{}|", R::KIND).into_bytes();
                removed_key.extend_from_slice(&key);
                batch.put_cf(cf_removed, removed_key, &value);
                batch.delete_cf(cf, &key);
                count += 1;
            }
        }
        if count > 0 {
            self.db.write(batch)?;
        }
        Ok(count)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}
