use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{EntityKind, EntitySchema, FieldKind, RecordId, StaffId},
    record::{field_value, FieldValue, FieldValues, Record},
    store::RecordStore,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StaffAccount {
    pub staff_id: StaffId,
    pub username: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates a staff account, or resets the password of an existing one.
    pub async fn create_staff(&self, username: &str, password: &str) -> Result<StaffId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(anyhow!("username cannot be empty"));
        }
        let password_hash = hash_password(password)?;
        let rec = sqlx::query(
            "INSERT INTO staff (username, password_hash) VALUES (?, ?)
             ON CONFLICT(username) DO UPDATE SET password_hash=excluded.password_hash
             RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(StaffId(rec.get::<i64, _>(0)))
    }

    /// Returns the account only when the password matches its stored hash.
    pub async fn verify_staff(&self, username: &str, password: &str) -> Result<Option<StaffAccount>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM staff WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let stored_hash: String = row.get(2);
        if !verify_password(password, &stored_hash) {
            return Ok(None);
        }
        Ok(Some(StaffAccount {
            staff_id: StaffId(row.get::<i64, _>(0)),
            username: row.get::<String, _>(1),
        }))
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn count(&self, kind: EntityKind, search: Option<&str>) -> Result<u64> {
        let schema = kind.schema();
        let (filter, needle) = search_clause(schema, search);
        let sql = format!("SELECT COUNT(*) FROM {}{filter}", schema.table);
        let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
        if let Some(needle) = needle {
            query = query.bind(needle);
        }
        let count = query
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to count {kind} records"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn list(
        &self,
        kind: EntityKind,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Record>> {
        let schema = kind.schema();
        let (filter, needle) = search_clause(schema, search);
        let sql = format!(
            "SELECT {} FROM {}{filter} ORDER BY id ASC LIMIT ? OFFSET ?",
            select_columns(schema),
            schema.table
        );
        let mut query = sqlx::query(&sql);
        if let Some(needle) = needle {
            query = query.bind(needle);
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to list {kind} records"))?;
        rows.iter().map(|row| decode_record(schema, row)).collect()
    }

    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<Record>> {
        let schema = kind.schema();
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            select_columns(schema),
            schema.table
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load {kind} {}", id.0))?;
        row.map(|row| decode_record(schema, &row)).transpose()
    }

    async fn insert(&self, kind: EntityKind, values: &FieldValues) -> Result<RecordId> {
        let schema = kind.schema();
        let columns: Vec<&str> = schema.column_names().collect();
        let placeholders = vec!["?"; columns.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}, created_at, updated_at) VALUES ({placeholders}) RETURNING id",
            schema.table,
            columns.join(", ")
        );

        let now = Utc::now();
        let mut query = sqlx::query(&sql);
        for column in &columns {
            query = bind_value(query, field_value(values, column));
        }
        let rec = query
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to insert {kind} record"))?;
        Ok(RecordId(rec.get::<i64, _>(0)))
    }

    async fn update(&self, kind: EntityKind, id: RecordId, values: &FieldValues) -> Result<bool> {
        let schema = kind.schema();
        let assignments = schema
            .column_names()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments}, updated_at = ? WHERE id = ?",
            schema.table
        );

        let mut query = sqlx::query(&sql);
        for column in schema.column_names() {
            query = bind_value(query, field_value(values, column));
        }
        let affected = query
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update {kind} {}", id.0))?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn search_clause<'s>(schema: &EntitySchema, search: Option<&'s str>) -> (String, Option<&'s str>) {
    match (schema.search_field, search.filter(|needle| !needle.is_empty())) {
        (Some(column), Some(needle)) => (format!(" WHERE instr({column}, ?) > 0"), Some(needle)),
        _ => (String::new(), None),
    }
}

fn select_columns(schema: &EntitySchema) -> String {
    let mut columns = vec!["id"];
    columns.extend(schema.column_names());
    columns.extend(["created_at", "updated_at"]);
    columns.join(", ")
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q FieldValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        FieldValue::Text(text) => query.bind(text.as_str()),
        FieldValue::Integer(number) => query.bind(*number),
        FieldValue::Date(date) => query.bind(*date),
        FieldValue::Null => query.bind(Option::<String>::None),
    }
}

fn decode_record(schema: &EntitySchema, row: &SqliteRow) -> Result<Record> {
    let mut values = FieldValues::new();
    for field in schema.fields {
        let value = match field.kind {
            FieldKind::Text { .. } => row
                .try_get::<Option<String>, _>(field.name)?
                .map(FieldValue::Text),
            FieldKind::Integer { .. } => row
                .try_get::<Option<i64>, _>(field.name)?
                .map(FieldValue::Integer),
            FieldKind::Date => row
                .try_get::<Option<NaiveDate>, _>(field.name)?
                .map(FieldValue::Date),
        };
        values.insert(field.name.to_string(), value.unwrap_or(FieldValue::Null));
    }

    Ok(Record {
        id: RecordId(row.try_get::<i64, _>("id")?),
        entity: schema.kind,
        values,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(anyhow!("password cannot be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
