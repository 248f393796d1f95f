//! Catalog repository implementation.
//!
//! Reads and writes the catalog's `cruise_info`, `pi_info` and `port_info`
//! tables. Every statement is parameterized; batch inserts bind each row's
//! values through [`QueryBuilder::push_values`].

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use rvsync_core::logging::subsystem;
use rvsync_core::{
    CatalogId, CatalogPi, CatalogPort, CatalogRepository, Error, InstitutionUpdate, NewCruise,
    NewPi, NewPort, Result,
};

/// Rows per INSERT statement. Keeps the widest row (16 columns) well under
/// PostgreSQL's 65535 bind parameter limit.
pub const INSERT_CHUNK_ROWS: usize = 1000;

/// PostgreSQL implementation of [`CatalogRepository`].
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: Pool<Postgres>,
}

impl PgCatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn ids(&self, sql: &str, names: &[String]) -> Result<Vec<CatalogId>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogId {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_cruise_keys(&self, vessels: &[String]) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT cruise_id, vessel FROM cruise_info
             WHERE vessel = ANY($1) AND cruise_id IS NOT NULL",
        )
        .bind(vessels)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("cruise_id"), row.get("vessel")))
            .collect())
    }

    async fn list_pis(&self) -> Result<Vec<CatalogPi>> {
        let rows = sqlx::query(
            "SELECT id::bigint AS id, pi_name, pi_institution, pi_r2r_id::text AS pi_r2r_id
             FROM pi_info
             WHERE pi_name IS NOT NULL
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogPi {
                id: row.get("id"),
                pi_name: row.get("pi_name"),
                pi_institution: row.get("pi_institution"),
                pi_r2r_id: row.get("pi_r2r_id"),
            })
            .collect())
    }

    async fn list_institutions(&self) -> Result<Vec<String>> {
        // Ordered so the first spelling per normalized form is stable.
        let rows = sqlx::query(
            "SELECT DISTINCT pi_institution FROM pi_info
             WHERE pi_institution IS NOT NULL
             ORDER BY pi_institution",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get("pi_institution"))
            .collect())
    }

    async fn list_ports(&self) -> Result<Vec<CatalogPort>> {
        let rows = sqlx::query(
            "SELECT port_name, port_country FROM port_info
             WHERE port_name IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogPort {
                port_name: row.get("port_name"),
                port_country: row.get("port_country"),
            })
            .collect())
    }

    async fn update_pi_institution(&self, update: &InstitutionUpdate) -> Result<u64> {
        let result = sqlx::query("UPDATE pi_info SET pi_institution = $1 WHERE pi_name = $2")
            .bind(&update.institution)
            .bind(&update.pi_name)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = subsystem::CATALOG,
            component = "repository",
            op = "update_pi_institution",
            pi_name = %update.pi_name,
            result_count = result.rows_affected(),
            "PI institution updated"
        );
        Ok(result.rows_affected())
    }

    async fn insert_pis(&self, rows: &[NewPi]) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO pi_info (pi_name, pi_first_name, pi_last_name, pi_institution, \
                 pi_r2r_id, pi_r2r_institution) ",
            );
            builder.push_values(chunk, |mut b, pi| {
                b.push_bind(&pi.pi_name)
                    .push_bind(&pi.first_name)
                    .push_bind(&pi.last_name)
                    .push_bind(&pi.institution)
                    .push_bind(pi.r2r_id)
                    .push_bind(&pi.r2r_institution);
            });
            inserted += builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = subsystem::CATALOG,
            component = "repository",
            op = "insert_pis",
            db_table = "pi_info",
            result_count = inserted,
            duration_ms = start.elapsed().as_millis() as u64,
            "PI batch committed"
        );
        Ok(inserted)
    }

    async fn insert_ports(&self, rows: &[NewPort]) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO port_info (port_name, r2r_id, latitude, longitude, port_country) ",
            );
            builder.push_values(chunk, |mut b, port| {
                b.push_bind(&port.port_name)
                    .push_bind(&port.r2r_id)
                    .push_bind(port.latitude)
                    .push_bind(port.longitude)
                    .push_bind(&port.country);
            });
            inserted += builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = subsystem::CATALOG,
            component = "repository",
            op = "insert_ports",
            db_table = "port_info",
            result_count = inserted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Port batch committed"
        );
        Ok(inserted)
    }

    async fn pi_ids(&self, names: &[String]) -> Result<Vec<CatalogId>> {
        self.ids(
            "SELECT id::bigint AS id, pi_name AS name FROM pi_info WHERE pi_name = ANY($1) ORDER BY id",
            names,
        )
        .await
    }

    async fn port_ids(&self, names: &[String]) -> Result<Vec<CatalogId>> {
        self.ids(
            "SELECT id::bigint AS id, port_name AS name FROM port_info WHERE port_name = ANY($1) ORDER BY id",
            names,
        )
        .await
    }

    async fn insert_cruises(&self, rows: &[NewCruise]) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO cruise_info (cruise_id, cruise_title, vessel, cruise_start_date, \
                 cruise_end_date, pi_db_id, pi_name, port_start_db_id, port_end_db_id, \
                 port_start, port_end, latitude_minimum, latitude_maximum, longitude_minimum, \
                 longitude_maximum, institution) ",
            );
            builder.push_values(chunk, |mut b, cruise| {
                b.push_bind(&cruise.cruise_id)
                    .push_bind(&cruise.title)
                    .push_bind(&cruise.vessel)
                    .push_bind(cruise.start_date)
                    .push_bind(cruise.end_date)
                    .push_bind(cruise.pi_id)
                    .push_bind(&cruise.pi_name)
                    .push_bind(cruise.port_start_id)
                    .push_bind(cruise.port_end_id)
                    .push_bind(&cruise.port_start)
                    .push_bind(&cruise.port_end)
                    .push_bind(cruise.latitude_min)
                    .push_bind(cruise.latitude_max)
                    .push_bind(cruise.longitude_min)
                    .push_bind(cruise.longitude_max)
                    .push_bind(&cruise.institution);
            });
            inserted += builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = subsystem::CATALOG,
            component = "repository",
            op = "insert_cruises",
            db_table = "cruise_info",
            result_count = inserted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cruise batch committed"
        );
        Ok(inserted)
    }
}
