//! Pagination and sort adapter
//!
//! Callers page report rows with a `"Column direction"` sort expression, an
//! optional search term, and skip/take bounds. The page always reports the
//! total row count before paging so clients can render page controls.

use chrono::NaiveDate;
use serde::Serialize;

use crate::general_ledger::GlTransactionRow;
use crate::trial_balance::TbAccountRow;

/// Sortable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    /// Rank of the row's company in the request's ordered company list
    Entity,
    /// Account number parsed as an integer; unparsable values sort last
    AccountNumber,
    /// Document number, lexical
    DocNum,
    /// Source date string, trimmed lexical
    Date,
    /// Period start date
    Period,
}

/// Parsed sort expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    /// Column to sort by
    pub column: SortColumn,
    /// Descending order
    pub descending: bool,
}

impl SortSpec {
    /// Parse a `"Column direction"` expression. Unknown columns and empty
    /// input mean no sorting.
    pub fn parse(expr: &str) -> Option<Self> {
        let mut parts = expr.split_whitespace();
        let column = match parts.next()?.to_ascii_lowercase().as_str() {
            "entity" | "companyentity" => SortColumn::Entity,
            "accountnumber" => SortColumn::AccountNumber,
            "docnum" | "doc_num" => SortColumn::DocNum,
            "date" => SortColumn::Date,
            "period" => SortColumn::Period,
            _ => return None,
        };
        let descending = matches!(parts.next(), Some(dir) if dir.eq_ignore_ascii_case("desc"));
        Some(Self { column, descending })
    }
}

/// Account numbers sort by integer value; blank or unparsable numbers sort
/// after every parsable one.
pub fn parse_account_number(number: Option<&str>) -> i64 {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(i64::MAX)
}

/// Paging request
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Rows to skip
    pub skip: usize,
    /// Rows to return
    pub take: usize,
    /// Optional sort expression
    pub sort: Option<SortSpec>,
    /// Optional case-insensitive search over account number and name
    pub search: Option<String>,
}

/// One page of rows plus the pre-paging total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The page contents
    pub items: Vec<T>,
    /// Total rows matching the request before skip/take
    pub total_records: usize,
}

/// Row shape the adapter can sort and search
pub trait SortableRow {
    /// External company id
    fn company_id(&self) -> &str;
    /// Account number
    fn account_number(&self) -> Option<&str>;
    /// Account display name
    fn account_name(&self) -> Option<&str>;
    /// Document number
    fn doc_num(&self) -> Option<&str> {
        None
    }
    /// Source date string
    fn date_str(&self) -> Option<&str> {
        None
    }
    /// Period start
    fn period_start(&self) -> Option<NaiveDate> {
        None
    }
}

impl SortableRow for GlTransactionRow {
    fn company_id(&self) -> &str {
        &self.company_id
    }
    fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }
    fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }
    fn doc_num(&self) -> Option<&str> {
        self.doc_num.as_deref()
    }
    fn date_str(&self) -> Option<&str> {
        self.txn_date.as_deref()
    }
    fn period_start(&self) -> Option<NaiveDate> {
        Some(self.start_period)
    }
}

impl SortableRow for TbAccountRow {
    fn company_id(&self) -> &str {
        &self.company_id
    }
    fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }
    fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }
}

/// Filter, sort and page rows. `entity_rank` maps an external company id to
/// its position in the request's ordered company list.
pub fn paginate<T: SortableRow>(
    mut rows: Vec<T>,
    request: &PageRequest,
    entity_rank: impl Fn(&str) -> usize,
) -> Page<T> {
    if let Some(term) = request.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let term = term.to_lowercase();
        rows.retain(|row| {
            row.account_number()
                .map(|n| n.to_lowercase().contains(&term))
                .unwrap_or(false)
                || row
                    .account_name()
                    .map(|n| n.to_lowercase().contains(&term))
                    .unwrap_or(false)
        });
    }

    let total_records = rows.len();

    if let Some(sort) = request.sort {
        rows.sort_by(|a, b| {
            let ordering = match sort.column {
                SortColumn::Entity => {
                    entity_rank(a.company_id()).cmp(&entity_rank(b.company_id()))
                }
                SortColumn::AccountNumber => account_number_key(a.account_number())
                    .cmp(&account_number_key(b.account_number())),
                SortColumn::DocNum => a
                    .doc_num()
                    .unwrap_or("")
                    .cmp(b.doc_num().unwrap_or("")),
                SortColumn::Date => a
                    .date_str()
                    .unwrap_or("")
                    .trim()
                    .cmp(b.date_str().unwrap_or("").trim()),
                SortColumn::Period => a.period_start().cmp(&b.period_start()),
            };
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let items = rows
        .into_iter()
        .skip(request.skip)
        .take(request.take)
        .collect();

    Page {
        items,
        total_records,
    }
}

/// Composite account number sort key: numeric value first, blanks after
/// unparsable text, lexical tie-break.
fn account_number_key(number: Option<&str>) -> (i64, bool, String) {
    let trimmed = number.map(str::trim).unwrap_or("");
    (
        parse_account_number(number),
        trimmed.is_empty(),
        trimmed.to_string(),
    )
}
