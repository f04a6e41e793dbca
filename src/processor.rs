//! Idempotent persistence of crawl results.
//!
//! Every save is its own transaction. A uniqueness or foreign-key violation
//! rolls that single save back and is reported as [`SaveOutcome::Skipped`];
//! any other database failure is returned to the caller.

use crate::db::{format_date, Database};
use crate::error::Result;
use crate::types::{CrawlResult, ProductRecord, ReturnRecord, Summary};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, instrument, warn};

/// What a single upsert did. Row ids come straight from the insert or lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(i64),
    Updated(i64),
    Skipped,
}

impl SaveOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Updated(id) => Some(*id),
            SaveOutcome::Skipped => None,
        }
    }
}

/// Merges crawl results into the store through an exclusively borrowed handle.
pub struct Processor<'a> {
    db: &'a mut Database,
}

impl<'a> Processor<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Persist a whole crawl result: every product first, then every return row.
    #[instrument(skip(self, result), fields(company = %result.company_name))]
    pub fn process(&mut self, result: &CrawlResult) -> Result<Summary> {
        let crawl_date = result.crawl_date();
        let mut summary = Summary {
            company_name: result.company_name.clone(),
            products_count: result.products.len(),
            returns_count: result.daily_returns.len(),
            ..Default::default()
        };

        for product in &result.products {
            match self.save_product(product, crawl_date)? {
                SaveOutcome::Created(_) => summary.products_new += 1,
                SaveOutcome::Updated(_) => summary.products_updated += 1,
                SaveOutcome::Skipped => {}
            }
        }

        for daily_return in &result.daily_returns {
            if self.save_return(daily_return)?.is_new() {
                summary.returns_new += 1;
            }
        }

        info!(
            "💾 Saved {} products ({} new, {} updated), {} return rows ({} new)",
            summary.products_count,
            summary.products_new,
            summary.products_updated,
            summary.returns_count,
            summary.returns_new
        );
        Ok(summary)
    }

    /// Insert a new product or overlay the non-null fields of `record` onto the stored row.
    /// `last_update` is set to `crawl_date` either way.
    pub fn save_product(
        &mut self,
        record: &ProductRecord,
        crawl_date: NaiveDate,
    ) -> Result<SaveOutcome> {
        if record.product_code.trim().is_empty() {
            warn!("Product without product code, not saved");
            return Ok(SaveOutcome::Skipped);
        }

        match self.upsert_product(record, crawl_date) {
            Err(e) if e.is_constraint_violation() => {
                warn!(
                    "Saving product {} violated a constraint, rolled back: {}",
                    record.product_code, e
                );
                Ok(SaveOutcome::Skipped)
            }
            other => other,
        }
    }

    fn upsert_product(&mut self, p: &ProductRecord, crawl_date: NaiveDate) -> Result<SaveOutcome> {
        let tx = self.db.connection_mut().transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM products WHERE product_code = ?1",
                params![p.product_code],
                |row| row.get(0),
            )
            .optional()?;

        let establishment_date = p.establishment_date.map(format_date);
        let maturity_date = p.maturity_date.map(format_date);
        let last_update = format_date(crawl_date);

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE products SET
                        product_name       = COALESCE(?2, product_name),
                        company_name       = COALESCE(?3, company_name),
                        company_url        = COALESCE(?4, company_url),
                        product_type       = COALESCE(?5, product_type),
                        risk_level         = COALESCE(?6, risk_level),
                        investment_horizon = COALESCE(?7, investment_horizon),
                        min_investment     = COALESCE(?8, min_investment),
                        expected_return    = COALESCE(?9, expected_return),
                        actual_return      = COALESCE(?10, actual_return),
                        status             = COALESCE(?11, status),
                        establishment_date = COALESCE(?12, establishment_date),
                        maturity_date      = COALESCE(?13, maturity_date),
                        description        = COALESCE(?14, description),
                        details_url        = COALESCE(?15, details_url),
                        last_update        = ?16
                     WHERE id = ?1",
                    params![
                        id,
                        p.product_name,
                        p.company_name,
                        p.company_url,
                        p.product_type,
                        p.risk_level,
                        p.investment_horizon,
                        p.min_investment,
                        p.expected_return,
                        p.actual_return,
                        p.status,
                        establishment_date,
                        maturity_date,
                        p.description,
                        p.details_url,
                        last_update,
                    ],
                )?;
                debug!("Updated product {} (id {})", p.product_code, id);
                SaveOutcome::Updated(id)
            }
            None => {
                tx.execute(
                    "INSERT INTO products
                        (product_code, product_name, company_name, company_url, product_type,
                         risk_level, investment_horizon, min_investment, expected_return,
                         actual_return, status, establishment_date, maturity_date, description,
                         details_url, last_update)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    params![
                        p.product_code,
                        p.product_name,
                        p.company_name,
                        p.company_url,
                        p.product_type,
                        p.risk_level,
                        p.investment_horizon,
                        p.min_investment,
                        p.expected_return,
                        p.actual_return,
                        p.status,
                        establishment_date,
                        maturity_date,
                        p.description,
                        p.details_url,
                        last_update,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                debug!("Created product {} (id {})", p.product_code, id);
                SaveOutcome::Created(id)
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Insert or refresh one day of return history. Rows for unknown products are
    /// skipped; products are never created from here.
    pub fn save_return(&mut self, record: &ReturnRecord) -> Result<SaveOutcome> {
        if record.product_code.trim().is_empty() {
            warn!("Return row for {} without product code, not saved", record.date);
            return Ok(SaveOutcome::Skipped);
        }

        match self.upsert_return(record) {
            Err(e) if e.is_constraint_violation() => {
                warn!(
                    "Saving return {} / {} violated a constraint, rolled back: {}",
                    record.product_code, record.date, e
                );
                Ok(SaveOutcome::Skipped)
            }
            other => other,
        }
    }

    fn upsert_return(&mut self, r: &ReturnRecord) -> Result<SaveOutcome> {
        let tx = self.db.connection_mut().transaction()?;

        let product_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM products WHERE product_code = ?1",
                params![r.product_code],
                |row| row.get(0),
            )
            .optional()?;
        let Some(product_id) = product_id else {
            warn!(
                "No product with code {}, return row for {} not saved",
                r.product_code, r.date
            );
            return Ok(SaveOutcome::Skipped);
        };

        let date = format_date(r.date);
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM daily_returns WHERE product_id = ?1 AND date = ?2",
                params![product_id, date],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE daily_returns SET
                        unit_net_value       = COALESCE(?2, unit_net_value),
                        cumulative_net_value = COALESCE(?3, cumulative_net_value),
                        daily_return_rate    = COALESCE(?4, daily_return_rate),
                        seven_day_annualized = COALESCE(?5, seven_day_annualized)
                     WHERE id = ?1",
                    params![
                        id,
                        r.unit_net_value,
                        r.cumulative_net_value,
                        r.daily_return_rate,
                        r.seven_day_annualized,
                    ],
                )?;
                SaveOutcome::Updated(id)
            }
            None => {
                tx.execute(
                    "INSERT INTO daily_returns
                        (product_id, product_code, date, unit_net_value, cumulative_net_value,
                         daily_return_rate, seven_day_annualized)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        product_id,
                        r.product_code,
                        date,
                        r.unit_net_value,
                        r.cumulative_net_value,
                        r.daily_return_rate,
                        r.seven_day_annualized,
                    ],
                )?;
                SaveOutcome::Created(tx.last_insert_rowid())
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}
