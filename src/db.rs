use crate::error::{Result, ScraperError};
use crate::types::{ProductRecord, ReturnRecord};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS products (
        id                  INTEGER PRIMARY KEY,
        product_code        TEXT NOT NULL UNIQUE CHECK (length(product_code) > 0),
        product_name        TEXT,
        company_name        TEXT,
        company_url         TEXT,
        product_type        TEXT,
        risk_level          TEXT,
        investment_horizon  TEXT,
        min_investment      REAL,
        expected_return     REAL,
        actual_return       REAL,
        status              TEXT,
        establishment_date  TEXT,
        maturity_date       TEXT,
        description         TEXT,
        details_url         TEXT,
        last_update         TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_products_name ON products(product_name);
    CREATE INDEX IF NOT EXISTS idx_products_company ON products(company_name);

    CREATE TABLE IF NOT EXISTS daily_returns (
        id                    INTEGER PRIMARY KEY,
        product_id            INTEGER NOT NULL REFERENCES products(id),
        product_code          TEXT NOT NULL,
        date                  TEXT NOT NULL,
        unit_net_value        REAL,
        cumulative_net_value  REAL,
        daily_return_rate     REAL,
        seven_day_annualized  REAL,
        UNIQUE(product_id, date)
    );
    CREATE INDEX IF NOT EXISTS idx_returns_code ON daily_returns(product_code);
    CREATE INDEX IF NOT EXISTS idx_returns_date ON daily_returns(date);
";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn read_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()))
}

/// Explicitly opened SQLite handle owned by one crawl run.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        info!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| ScraperError::Database(e))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn find_product(&self, product_code: &str) -> Result<Option<ProductRecord>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, product_code, product_name, company_name, company_url, product_type,
                        risk_level, investment_horizon, min_investment, expected_return,
                        actual_return, status, establishment_date, maturity_date, description,
                        details_url, last_update
                 FROM products WHERE product_code = ?1",
                params![product_code],
                |row| {
                    Ok(ProductRecord {
                        id: row.get(0)?,
                        product_code: row.get(1)?,
                        product_name: row.get(2)?,
                        company_name: row.get(3)?,
                        company_url: row.get(4)?,
                        product_type: row.get(5)?,
                        risk_level: row.get(6)?,
                        investment_horizon: row.get(7)?,
                        min_investment: row.get(8)?,
                        expected_return: row.get(9)?,
                        actual_return: row.get(10)?,
                        status: row.get(11)?,
                        establishment_date: read_date(row, 12)?,
                        maturity_date: read_date(row, 13)?,
                        description: row.get(14)?,
                        details_url: row.get(15)?,
                        last_update: read_date(row, 16)?,
                    })
                },
            )
            .optional()?;
        Ok(product)
    }

    /// Return history stored for a product, oldest first.
    pub fn returns_for(&self, product_code: &str) -> Result<Vec<ReturnRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.date, r.unit_net_value, r.cumulative_net_value, r.daily_return_rate,
                    r.seven_day_annualized
             FROM daily_returns r
             JOIN products p ON p.id = r.product_id
             WHERE p.product_code = ?1
             ORDER BY r.date",
        )?;
        let rows = stmt
            .query_map(params![product_code], |row| {
                Ok((
                    read_date(row, 0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(date, unit, cumulative, daily, seven_day)| {
                Some(ReturnRecord {
                    product_code: product_code.to_string(),
                    date: date?,
                    unit_net_value: unit,
                    cumulative_net_value: cumulative,
                    daily_return_rate: daily,
                    seven_day_annualized: seven_day,
                })
            })
            .collect())
    }

    pub fn count_products(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn count_returns(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM daily_returns", [], |r| r.get(0))?;
        Ok(n as usize)
    }
}
