//! PostgreSQL backing store
//!
//! Holds a single connection for its whole lifetime: advisory locks belong
//! to the session that took them, so a pool would hand lock and unlock to
//! different backends.

use crate::error::{StencilError, StencilResult};
use crate::store::{ListOrder, TemplateStore};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::str::FromStr;
use tracing::{debug, info};

/// Quote an identifier for interpolation into DDL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Template store backed by one PostgreSQL session
pub struct PgTemplateStore {
    conn: PgConnection,
}

impl PgTemplateStore {
    /// Connect to the maintenance database
    pub async fn connect(database_url: &str) -> StencilResult<Self> {
        info!("Connecting to database server...");
        let conn = PgConnection::connect(database_url).await?;
        debug!("Database connection established");
        Ok(Self { conn })
    }

    /// Check whether a database exists
    pub async fn database_exists(&mut self, name: &str) -> StencilResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(name)
                .fetch_one(&mut self.conn)
                .await?;
        Ok(exists)
    }

    /// Terminate other sessions connected to a database
    ///
    /// A database can only serve as a template while nobody is connected to
    /// it. Returns the number of sessions signalled.
    pub async fn terminate_connections(&mut self, name: &str) -> StencilResult<u64> {
        let terminated: Vec<bool> = sqlx::query_scalar(
            r#"
            SELECT pg_terminate_backend(pid)
            FROM pg_stat_activity
            WHERE datname = $1
              AND pid <> pg_backend_pid()
            "#,
        )
        .bind(name)
        .fetch_all(&mut self.conn)
        .await?;
        Ok(terminated.into_iter().filter(|ok| *ok).count() as u64)
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn create_database_from_template(
        &mut self,
        name: &str,
        template: &str,
    ) -> StencilResult<()> {
        debug!("Creating database {} from {}", name, template);
        let sql = format!(
            "CREATE DATABASE {} ENCODING 'unicode' TEMPLATE {}",
            quote_ident(name),
            quote_ident(template)
        );
        sqlx::query(&sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn rename_database(&mut self, from: &str, to: &str) -> StencilResult<()> {
        debug!("Renaming database {} to {}", from, to);
        let sql = format!(
            "ALTER DATABASE {} RENAME TO {}",
            quote_ident(from),
            quote_ident(to)
        );
        sqlx::query(&sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> StencilResult<()> {
        debug!("Dropping database {}", name);
        let sql = format!("DROP DATABASE {}", quote_ident(name));
        sqlx::query(&sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn list_databases_matching(
        &mut self,
        pattern: &str,
        order: ListOrder,
    ) -> StencilResult<Vec<String>> {
        let sql = match order {
            ListOrder::Ascending => {
                r#"SELECT datname::text FROM pg_database WHERE datname LIKE $1 ORDER BY datname COLLATE "C" ASC"#
            }
            ListOrder::Descending => {
                r#"SELECT datname::text FROM pg_database WHERE datname LIKE $1 ORDER BY datname COLLATE "C" DESC"#
            }
        };
        let names: Vec<String> = sqlx::query_scalar(sql)
            .bind(pattern)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(names)
    }

    async fn count_databases_matching(&mut self, pattern: &str) -> StencilResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM pg_database WHERE datname LIKE $1")
            .bind(pattern)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn advisory_lock(&mut self, id: i64) -> StencilResult<()> {
        debug!("Acquiring advisory lock {}", id);
        sqlx::query("SELECT pg_advisory_lock($1::bigint)")
            .bind(id)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn advisory_unlock(&mut self, id: i64) -> StencilResult<()> {
        debug!("Releasing advisory lock {}", id);
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1::bigint)")
            .bind(id)
            .fetch_one(&mut self.conn)
            .await?;
        if released {
            Ok(())
        } else {
            Err(StencilError::LockNotHeld(id))
        }
    }

    async fn close(self) -> StencilResult<()> {
        self.conn.close().await?;
        debug!("Database connection closed");
        Ok(())
    }
}

/// Run raw SQL inside `database` on the server described by `database_url`
///
/// Opens a short-lived session of its own; the statements may contain
/// several commands.
pub async fn execute_in_database(database_url: &str, database: &str, sql: &str) -> StencilResult<()> {
    let options = PgConnectOptions::from_str(database_url)?.database(database);
    let mut conn = PgConnection::connect_with(&options).await?;
    debug!("Executing raw SQL in {}", database);
    sqlx::raw_sql(sql).execute(&mut conn).await?;
    conn.close().await?;
    Ok(())
}
