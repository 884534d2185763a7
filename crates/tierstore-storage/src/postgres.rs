//! PostgreSQL storage backend.
//!
//! Products live in the `product` table and users in `users`. Both use a
//! `BIGSERIAL` primary key, so IDs are assigned by the database.

use std::time::Duration;

use async_trait::async_trait;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::Postgres;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::StorageResult;
use crate::error::StorageError;
use crate::record::{Product, Record, User};
use crate::traits::Repository;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS product (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price       DOUBLE PRECISION NOT NULL,
        user_id     BIGINT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        email       TEXT NOT NULL,
        password    TEXT NOT NULL DEFAULT '',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Entry point to the PostgreSQL backend.
///
/// Holds the pool and hands out per-entity repositories that share it.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store from an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the `product` and `users` tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            query(*statement).execute(&self.pool).await?;
        }
        debug!("Schema is up to date");
        Ok(())
    }

    /// Product repository backed by this pool.
    #[must_use]
    pub fn products(&self) -> PgProductRepository {
        PgProductRepository {
            pool: self.pool.clone(),
        }
    }

    /// User repository backed by this pool.
    #[must_use]
    pub fn users(&self) -> PgUserRepository {
        PgUserRepository {
            pool: self.pool.clone(),
        }
    }
}

// =============================================================================
// Products
// =============================================================================

type ProductRow = (
    i64,
    String,
    String,
    f64,
    Option<i64>,
    OffsetDateTime,
    OffsetDateTime,
);

fn product_from_tuple(row: ProductRow) -> Product {
    Product {
        id: row.0,
        name: row.1,
        description: row.2,
        price: row.3,
        user_id: row.4,
        created_at: row.5,
        updated_at: row.6,
    }
}

/// `Repository<Product>` over the `product` table.
#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

#[async_trait]
impl Repository<Product> for PgProductRepository {
    async fn create(&self, product: Product) -> StorageResult<Product> {
        product.validate()?;
        let now = OffsetDateTime::now_utc();
        let row: ProductRow = query_as(
            r#"
            INSERT INTO product (name, description, price, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, name, description, price, user_id, created_at, updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(product_from_tuple(row))
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Product>> {
        let row: Option<ProductRow> = query_as(
            r#"
            SELECT id, name, description, price, user_id, created_at, updated_at
            FROM product
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(product_from_tuple))
    }

    async fn update(&self, product: &Product) -> StorageResult<Product> {
        product.validate()?;
        let row: Option<ProductRow> = query_as(
            r#"
            UPDATE product
            SET name = $2, description = $3, price = $4, user_id = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, name, description, price, user_id, created_at, updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.user_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_tuple)
            .ok_or_else(|| StorageError::not_found("product", product.id))
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let result = query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("product", id));
        }
        Ok(())
    }

    async fn find_all(&self) -> StorageResult<Vec<Product>> {
        let rows: Vec<ProductRow> = query_as(
            r#"
            SELECT id, name, description, price, user_id, created_at, updated_at
            FROM product
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(product_from_tuple).collect())
    }
}

// =============================================================================
// Users
// =============================================================================

type UserRow = (i64, String, String, String, OffsetDateTime, OffsetDateTime);

fn user_from_tuple(row: UserRow) -> User {
    User {
        id: row.0,
        name: row.1,
        email: row.2,
        password: row.3,
        created_at: row.4,
        updated_at: row.5,
    }
}

/// `Repository<User>` over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

#[async_trait]
impl Repository<User> for PgUserRepository {
    async fn create(&self, user: User) -> StorageResult<User> {
        user.validate()?;
        let now = OffsetDateTime::now_utc();
        let row: UserRow = query_as(
            r#"
            INSERT INTO users (name, email, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, email, password, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_from_tuple(row))
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>> {
        let row: Option<UserRow> = query_as(
            r#"
            SELECT id, name, email, password, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    async fn update(&self, user: &User) -> StorageResult<User> {
        user.validate()?;
        // An empty password on update keeps the stored one.
        let row: Option<UserRow> = query_as(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                password = CASE WHEN $4 = '' THEN password ELSE $4 END,
                updated_at = $5
            WHERE id = $1
            RETURNING id, name, email, password, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_tuple)
            .ok_or_else(|| StorageError::not_found("user", user.id))
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let result = query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("user", id));
        }
        Ok(())
    }

    async fn find_all(&self) -> StorageResult<Vec<User>> {
        let rows: Vec<UserRow> = query_as(
            r#"
            SELECT id, name, email, password, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(user_from_tuple).collect())
    }
}
