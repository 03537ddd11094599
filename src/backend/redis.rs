//! Redis ledger backend implementation.
//!
//! Documents are stored as enveloped postcard blobs under the keys described
//! in [`crate::key`]. Id sets stand in for collection scans, and serial
//! numbers are reserved with `SET NX`.

use super::LedgerBackend;
use crate::entity::LedgerDocument;
use crate::error::{Error, Result};
use crate::filter::{sort_newest_first, CustomerFilter, PaymentFilter};
use crate::key::DocumentKey;
use crate::model::{Customer, PaymentRecord};
use crate::plan::BillingStatus;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }

    /// Read `REDIS_HOST`, `REDIS_PORT`, `REDIS_USERNAME`, `REDIS_PASSWORD`,
    /// `REDIS_DB` and `REDIS_POOL_SIZE`, falling back to the defaults.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for a numeric variable that does not parse.
    pub fn from_env() -> Result<Self> {
        fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
            match std::env::var(name) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::ConfigError(format!("{} is not valid: {:?}", name, raw))),
                Err(_) => Ok(default),
            }
        }

        let defaults = RedisConfig::default();
        Ok(RedisConfig {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: parsed("REDIS_PORT", defaults.port)?,
            username: std::env::var("REDIS_USERNAME").ok(),
            password: std::env::var("REDIS_PASSWORD").ok(),
            database: parsed("REDIS_DB", defaults.database)?,
            pool_size: parsed("REDIS_POOL_SIZE", defaults.pool_size)?,
            connection_timeout: defaults.connection_timeout,
        })
    }
}

fn storage(op: &str, e: impl std::fmt::Display) -> Error {
    Error::StorageError(format!("Redis {} failed: {}", op, e))
}

/// Redis ledger with connection pooling and async operations.
///
/// Multi-key writes go through `MULTI`/`EXEC` pipelines so a document and its
/// index entries change together.
///
/// # Example
///
/// ```no_run
/// # use billing_kit::backend::{RedisBackend, RedisConfig, LedgerBackend};
/// # use billing_kit::filter::CustomerFilter;
/// # use billing_kit::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// let customers = backend.fetch_customers(&CustomerFilter::default()).await?;
/// println!("{} customers", customers.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::build_pool(&config.connection_string(), config.pool_size)?;

        info!(
            "✓ Redis ledger initialized: {}:{} (db {})",
            config.host, config.port, config.database
        );

        Ok(RedisBackend { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set, else 16.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let pool = Self::build_pool(conn_str, pool_size)?;

        info!(
            "✓ Redis ledger initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    fn build_pool(conn_str: &str, pool_size: u32) -> Result<Pool> {
        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size as usize));
        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::StorageError(format!("Failed to get Redis connection: {}", e)))
    }

    async fn get_document<T: LedgerDocument>(
        conn: &mut Connection,
        id: &Uuid,
    ) -> Result<Option<T>> {
        let key = DocumentKey::build::<T>(id);
        let bytes: Option<Vec<u8>> = conn.get(&key).await.map_err(|e| storage("GET", e))?;
        bytes.map(|b| T::from_document_bytes(&b)).transpose()
    }

    async fn get_documents<T: LedgerDocument>(
        conn: &mut Connection,
        ids: &[Uuid],
    ) -> Result<Vec<Option<T>>> {
        // MGET with no keys is a protocol error
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(DocumentKey::build::<T>).collect();
        let blobs: Vec<Option<Vec<u8>>> =
            conn.mget(&keys).await.map_err(|e| storage("MGET", e))?;
        blobs
            .into_iter()
            .map(|blob| blob.map(|b| T::from_document_bytes(&b)).transpose())
            .collect()
    }

    async fn member_ids(conn: &mut Connection, set_key: &str) -> Result<Vec<Uuid>> {
        let members: Vec<String> = conn
            .smembers(set_key)
            .await
            .map_err(|e| storage("SMEMBERS", e))?;
        members
            .iter()
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|e| {
                    Error::DeserializationError(format!("Bad id {:?} in {}: {}", raw, set_key, e))
                })
            })
            .collect()
    }

    async fn all_customers(conn: &mut Connection) -> Result<Vec<Customer>> {
        let ids = Self::member_ids(conn, &DocumentKey::index::<Customer>()).await?;
        Ok(Self::get_documents::<Customer>(conn, &ids)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Reserve `serial` for `id`. Returns false if someone else holds it.
    async fn reserve_serial(conn: &mut Connection, serial: &str, id: &Uuid) -> Result<bool> {
        let key = DocumentKey::serial(serial);
        let reserved: bool = conn
            .set_nx(&key, id.to_string())
            .await
            .map_err(|e| storage("SETNX", e))?;
        if reserved {
            return Ok(true);
        }
        let owner: Option<String> = conn.get(&key).await.map_err(|e| storage("GET", e))?;
        Ok(owner.as_deref() == Some(id.to_string().as_str()))
    }
}

impl LedgerBackend for RedisBackend {
    async fn fetch_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let mut conn = self.conn().await?;
        let found = Self::get_document::<Customer>(&mut conn, &id).await?;
        debug!(
            "✓ Redis GET customer {} -> {}",
            id,
            if found.is_some() { "HIT" } else { "MISS" }
        );
        Ok(found)
    }

    async fn fetch_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let mut conn = self.conn().await?;
        let customers: Vec<Customer> = Self::all_customers(&mut conn)
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        debug!("✓ Redis SCAN customers -> {} matches", customers.len());
        Ok(customers)
    }

    async fn fetch_customers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Option<Customer>>> {
        let mut conn = self.conn().await?;
        let found = Self::get_documents::<Customer>(&mut conn, ids).await?;
        debug!("✓ Redis MGET {} customers", ids.len());
        Ok(found)
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        customer.validate()?;
        let bytes = customer.to_document_bytes()?;
        let mut conn = self.conn().await?;

        if !Self::reserve_serial(&mut conn, &customer.serial_number, &customer.id).await? {
            return Err(Error::Conflict(format!(
                "Serial number {} already exists",
                customer.serial_number
            )));
        }

        let key = DocumentKey::build::<Customer>(&customer.id);
        let created: bool = conn
            .set_nx(&key, bytes)
            .await
            .map_err(|e| storage("SETNX", e))?;
        if !created {
            conn.del::<_, ()>(DocumentKey::serial(&customer.serial_number))
                .await
                .map_err(|e| storage("DEL", e))?;
            return Err(Error::Conflict(format!(
                "Customer id {} already exists",
                customer.id
            )));
        }

        conn.sadd::<_, _, ()>(DocumentKey::index::<Customer>(), customer.id.to_string())
            .await
            .map_err(|e| storage("SADD", e))?;

        debug!("✓ Redis INSERT customer {}", customer.id);
        Ok(())
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        customer.validate()?;
        let bytes = customer.to_document_bytes()?;
        let mut conn = self.conn().await?;

        let stored = Self::get_document::<Customer>(&mut conn, &customer.id)
            .await?
            .ok_or_else(|| Error::customer_not_found(customer.id))?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(DocumentKey::build::<Customer>(&customer.id), bytes)
            .ignore();

        if stored.serial_number != customer.serial_number {
            if !Self::reserve_serial(&mut conn, &customer.serial_number, &customer.id).await? {
                return Err(Error::Conflict(format!(
                    "Serial number {} already exists",
                    customer.serial_number
                )));
            }
            pipe.del(DocumentKey::serial(&stored.serial_number)).ignore();
        }

        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| storage("MULTI/EXEC", e))?;

        debug!("✓ Redis SAVE customer {}", customer.id);
        Ok(())
    }

    async fn delete_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let mut conn = self.conn().await?;
        let Some(customer) = Self::get_document::<Customer>(&mut conn, &id).await? else {
            return Ok(None);
        };

        redis::pipe()
            .atomic()
            .del(DocumentKey::build::<Customer>(&id))
            .ignore()
            .srem(DocumentKey::index::<Customer>(), id.to_string())
            .ignore()
            .del(DocumentKey::serial(&customer.serial_number))
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| storage("MULTI/EXEC", e))?;

        debug!("✓ Redis DELETE customer {}", id);
        Ok(Some(customer))
    }

    async fn reset_billing(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();

        let mut updated = 0;
        for mut customer in Self::all_customers(&mut conn).await? {
            if customer.billing.is_reset() {
                continue;
            }
            customer.billing.reset();
            customer.updated_at = now;
            pipe.set(
                DocumentKey::build::<Customer>(&customer.id),
                customer.to_document_bytes()?,
            )
            .ignore();
            updated += 1;
        }

        if updated > 0 {
            pipe.query_async::<()>(&mut *conn)
                .await
                .map_err(|e| storage("MULTI/EXEC", e))?;
        }

        warn!("⚠ Redis RESET billing state of {} customers", updated);
        Ok(updated)
    }

    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()> {
        let bytes = record.to_document_bytes()?;
        let mut conn = self.conn().await?;

        let created: bool = conn
            .set_nx(DocumentKey::build::<PaymentRecord>(&record.id), bytes)
            .await
            .map_err(|e| storage("SETNX", e))?;
        if !created {
            return Err(Error::Conflict(format!(
                "Payment id {} already exists",
                record.id
            )));
        }

        redis::pipe()
            .atomic()
            .sadd(DocumentKey::index::<PaymentRecord>(), record.id.to_string())
            .ignore()
            .sadd(
                DocumentKey::payments_of(&record.customer_id),
                record.id.to_string(),
            )
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| storage("MULTI/EXEC", e))?;

        debug!(
            "✓ Redis INSERT payment {} for customer {}",
            record.id, record.customer_id
        );
        Ok(())
    }

    async fn fetch_payment(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let mut conn = self.conn().await?;
        Self::get_document::<PaymentRecord>(&mut conn, &id).await
    }

    async fn query_payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRecord>> {
        let mut conn = self.conn().await?;
        let set_key = match filter.customer_id {
            Some(customer_id) => DocumentKey::payments_of(&customer_id),
            None => DocumentKey::index::<PaymentRecord>(),
        };
        let ids = Self::member_ids(&mut conn, &set_key).await?;

        let mut records: Vec<PaymentRecord> =
            Self::get_documents::<PaymentRecord>(&mut conn, &ids)
                .await?
                .into_iter()
                .flatten()
                .filter(|r| filter.matches(r))
                .collect();

        sort_newest_first(&mut records);
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }

        debug!("✓ Redis QUERY payments -> {} records", records.len());
        Ok(records)
    }

    async fn mark_payment_paid(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let mut conn = self.conn().await?;
        let Some(mut record) = Self::get_document::<PaymentRecord>(&mut conn, &id).await? else {
            return Ok(None);
        };

        if record.status_at_payment != BillingStatus::Paid {
            record.status_at_payment = BillingStatus::Paid;
            conn.set::<_, _, ()>(
                DocumentKey::build::<PaymentRecord>(&id),
                record.to_document_bytes()?,
            )
            .await
            .map_err(|e| storage("SET", e))?;
        }

        debug!("✓ Redis MARK_PAID payment {}", id);
        Ok(Some(record))
    }

    async fn delete_payments_for(&self, customer_id: Uuid) -> Result<u64> {
        let mut conn = self.conn().await?;
        let owned_key = DocumentKey::payments_of(&customer_id);
        let ids = Self::member_ids(&mut conn, &owned_key).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            pipe.del(DocumentKey::build::<PaymentRecord>(id))
                .ignore()
                .srem(DocumentKey::index::<PaymentRecord>(), id.to_string())
                .ignore();
        }
        pipe.del(&owned_key)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| storage("MULTI/EXEC", e))?;

        debug!(
            "✓ Redis DELETE {} payments of customer {}",
            ids.len(),
            customer_id
        );
        Ok(ids.len() as u64)
    }

    async fn delete_all_payments(&self) -> Result<u64> {
        let mut conn = self.conn().await?;
        let index_key = DocumentKey::index::<PaymentRecord>();
        let ids = Self::member_ids(&mut conn, &index_key).await?;
        let owners: HashSet<Uuid> = Self::get_documents::<PaymentRecord>(&mut conn, &ids)
            .await?
            .into_iter()
            .flatten()
            .map(|r| r.customer_id)
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            pipe.del(DocumentKey::build::<PaymentRecord>(id)).ignore();
        }
        for owner in &owners {
            pipe.del(DocumentKey::payments_of(owner)).ignore();
        }
        pipe.del(&index_key)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| storage("MULTI/EXEC", e))?;

        warn!(
            "⚠ Redis DELETE_ALL payments - {} records removed!",
            ids.len()
        );
        Ok(ids.len() as u64)
    }

    async fn count_customers(&self) -> Result<u64> {
        let mut conn = self.conn().await?;
        conn.scard(DocumentKey::index::<Customer>())
            .await
            .map_err(|e| storage("SCARD", e))
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| storage("PING", e))?;

        Ok(pong.contains("PONG"))
    }
}
