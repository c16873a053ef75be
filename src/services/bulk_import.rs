use crate::{
    entities::product,
    errors::ServiceError,
    services::catalog::{find_or_create_category, ProductInput},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const REQUIRED_COLUMNS: [&str; 4] = ["name", "description", "price", "category"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Line number in the uploaded file; the header is line 1.
    pub row: u64,
    pub reason: String,
}

/// Outcome of one CSV upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: Vec<SkippedRow>,
    /// Set when a database error stopped the import part-way.
    pub aborted: bool,
}

impl ImportReport {
    fn skip(&mut self, row: u64, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(row, %reason, "skipping CSV row");
        counter!("moune_import.rows_skipped", 1);
        self.skipped.push(SkippedRow { row, reason });
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    description: usize,
    price: usize,
    category: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ServiceError> {
        let find = |wanted: &str| {
            headers.iter().position(|h| {
                let h = h.trim().to_ascii_lowercase();
                h == wanted || (wanted == "category" && h == "category_name")
            })
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| find(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "CSV header is missing column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            name: find("name").unwrap_or_default(),
            description: find("description").unwrap_or_default(),
            price: find("price").unwrap_or_default(),
            category: find("category").unwrap_or_default(),
        })
    }
}

/// A row that passed field checks and is ready to be written.
#[derive(Debug, Clone, PartialEq)]
struct ParsedRow {
    name: String,
    description: String,
    price: Decimal,
    category: String,
}

fn parse_row(record: &csv::StringRecord, cols: Columns) -> Result<ParsedRow, String> {
    let field = |idx: usize, label: &str| -> Result<String, String> {
        match record.get(idx).map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(format!("missing required field '{}'", label)),
        }
    };

    let name = field(cols.name, "name")?;
    let description = field(cols.description, "description")?;
    let raw_price = field(cols.price, "price")?;
    let category = field(cols.category, "category")?;

    let price = Decimal::from_str(&raw_price)
        .map_err(|_| format!("invalid price '{}'", raw_price))?;
    if price < Decimal::ZERO {
        return Err(format!("negative price '{}'", raw_price));
    }
    if category.chars().count() > 100 {
        return Err("category name longer than 100 characters".to_string());
    }

    Ok(ParsedRow {
        name,
        description,
        price,
        category,
    })
}

/// Creates products from an uploaded CSV file.
///
/// Rows are handled one at a time without an enclosing transaction, so rows
/// inserted before a database failure stay committed.
#[derive(Clone)]
pub struct BulkImportService {
    db: Arc<DatabaseConnection>,
}

impl BulkImportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_csv(&self, data: &[u8]) -> Result<ImportReport, ServiceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers = reader
            .headers()
            .map_err(|e| ServiceError::ValidationError(format!("Unreadable CSV header: {}", e)))?
            .clone();
        let cols = Columns::from_headers(&headers)?;

        let mut report = ImportReport::default();
        for (idx, record) in reader.records().enumerate() {
            let fallback = idx as u64 + 2;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    let row = e.position().map_or(fallback, |p| p.line());
                    report.skip(row, format!("malformed row: {}", e));
                    continue;
                }
            };
            let row = record.position().map_or(fallback, |p| p.line());
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let parsed = match parse_row(&record, cols) {
                Ok(p) => p,
                Err(reason) => {
                    report.skip(row, reason);
                    continue;
                }
            };

            match self.store_row(parsed).await {
                Ok(RowOutcome::Inserted) => {
                    report.inserted += 1;
                    counter!("moune_import.rows_inserted", 1);
                }
                Ok(RowOutcome::Skipped(reason)) => report.skip(row, reason),
                Err(e) => {
                    error!(row, error = %e, "bulk import aborted by database error");
                    counter!("moune_import.aborted", 1);
                    report.aborted = true;
                    break;
                }
            }
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            aborted = report.aborted,
            "bulk import finished"
        );
        Ok(report)
    }

    async fn store_row(&self, row: ParsedRow) -> Result<RowOutcome, ServiceError> {
        let db = &*self.db;

        // Checked before the category lookup so a skipped row creates nothing.
        let mut input = ProductInput {
            name: row.name,
            description: row.description,
            price: row.price,
            category_id: Uuid::nil(),
        };
        if let Err(e) = input.check() {
            return Ok(RowOutcome::Skipped(e.response_message()));
        }

        let category = find_or_create_category(db, &row.category).await?;
        input.category_id = category.id;

        let duplicates = product::Entity::find()
            .filter(product::Column::Name.eq(input.name.as_str()))
            .filter(product::Column::CategoryId.eq(category.id))
            .count(db)
            .await?;
        if duplicates > 0 {
            return Ok(RowOutcome::Skipped(format!(
                "duplicate product '{}' in category '{}'",
                input.name, category.name
            )));
        }

        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            category_id: Set(category.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        Ok(RowOutcome::Inserted)
    }
}

enum RowOutcome {
    Inserted,
    Skipped(String),
}
