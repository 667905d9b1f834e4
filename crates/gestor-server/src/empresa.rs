//! Empresa records in SQLite.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Timestamp format of `created_at` / `updated_at`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS empresas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nome VARCHAR(191) NOT NULL,
    cnpj VARCHAR(18) NOT NULL UNIQUE,
    email VARCHAR(191) NOT NULL UNIQUE,
    telefone VARCHAR(20) NULL,
    endereco VARCHAR(191) NULL,
    created_at TEXT NULL,
    updated_at TEXT NULL
)";

const COLUMNS: &str = "id, nome, cnpj, email, telefone, endereco, created_at, updated_at";

/// A registered company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Empresa {
    /// Primary key.
    pub id: i64,
    /// Company name.
    pub nome: String,
    /// CNPJ, as typed.
    pub cnpj: String,
    /// Contact e-mail.
    pub email: String,
    /// Contact phone.
    pub telefone: Option<String>,
    /// Postal address.
    pub endereco: Option<String>,
    /// Creation time (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: Option<String>,
    /// Last update time (`YYYY-MM-DD HH:MM:SS`).
    pub updated_at: Option<String>,
}

/// Writable Empresa fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmpresaData {
    pub nome: String,
    pub cnpj: String,
    pub email: String,
    pub telefone: Option<String>,
    pub endereco: Option<String>,
}

impl EmpresaData {
    /// Pick the writable fields out of submitted form data. Anything else
    /// (`_token`, `_method`, `id`, timestamps) is ignored.
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        let field = |name: &str| form.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| form.get(name).filter(|v| !v.is_empty()).cloned();
        Self {
            nome: field("nome"),
            cnpj: field("cnpj"),
            email: field("email"),
            telefone: optional("telefone"),
            endereco: optional("endereco"),
        }
    }
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Empresa queries over a SQLite pool.
#[derive(Debug, Clone)]
pub struct EmpresaRepository {
    pool: SqlitePool,
}

impl EmpresaRepository {
    /// Connect to `url`, creating the database file and table if missing.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let in_memory = url.contains(":memory:");
        if !in_memory
            && let Some(dir) = options.get_filename().parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Every connection to `:memory:` opens its own database
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self { pool };
        repo.bootstrap().await?;
        tracing::info!(url = %url, "connected to database");
        Ok(repo)
    }

    async fn bootstrap(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Every Empresa, ordered by name.
    pub async fn all(&self) -> Result<Vec<Empresa>, sqlx::Error> {
        sqlx::query_as::<_, Empresa>(&format!("SELECT {COLUMNS} FROM empresas ORDER BY nome ASC"))
            .fetch_all(&self.pool)
            .await
    }

    /// The Empresa with `id`, if any.
    pub async fn find(&self, id: i64) -> Result<Option<Empresa>, sqlx::Error> {
        sqlx::query_as::<_, Empresa>(&format!("SELECT {COLUMNS} FROM empresas WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert a new Empresa and return it.
    pub async fn create(&self, data: &EmpresaData) -> Result<Empresa, sqlx::Error> {
        let now = now();
        sqlx::query_as::<_, Empresa>(&format!(
            "INSERT INTO empresas (nome, cnpj, email, telefone, endereco, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
        ))
        .bind(&data.nome)
        .bind(&data.cnpj)
        .bind(&data.email)
        .bind(&data.telefone)
        .bind(&data.endereco)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
    }

    /// Overwrite the writable fields of Empresa `id`.
    ///
    /// Returns `false` if no such Empresa exists.
    pub async fn update(&self, id: i64, data: &EmpresaData) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE empresas SET nome = ?, cnpj = ?, email = ?, telefone = ?, endereco = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&data.nome)
        .bind(&data.cnpj)
        .bind(&data.email)
        .bind(&data.telefone)
        .bind(&data.endereco)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete Empresa `id`. Returns `false` if it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM empresas WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Whether `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
