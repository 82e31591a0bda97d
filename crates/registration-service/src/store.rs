//! Registration store
//!
//! Redis data model:
//! - registration:{serial} → JSON document, written once with SET NX
//! - registrations:by_serial → Sorted set (score=numeric serial, member=serial)
//!
//! Both keys are written by one script so the index never names a missing
//! document and a rejected duplicate touches neither.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use registrar_common::{Registration, SerialNumber};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

const SERIAL_INDEX: &str = "registrations:by_serial";

/// KEYS: document, index. ARGV: json, score, serial. Returns 1 if created.
const SAVE_SCRIPT: &str = r#"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
    return 1
end
return 0
"#;

fn registration_key(serial: &str) -> String {
    format!("registration:{}", serial)
}

/// Durable storage for registrations
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Persist a new registration
    ///
    /// Fails with [`StoreError::DuplicateSerial`] if the serial is taken.
    async fn save(&self, registration: &Registration) -> Result<(), StoreError>;

    /// Highest stored serial, exactly as stored
    async fn find_max_serial(&self) -> Result<Option<String>, StoreError>;

    /// Every registration, ordered by serial
    async fn find_all(&self) -> Result<Vec<Registration>, StoreError>;

    /// Number of stored registrations
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Redis-backed registration store
pub struct RedisRegistrationStore {
    conn: ConnectionManager,
    save_script: redis::Script,
}

impl RedisRegistrationStore {
    /// Create a new store
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            save_script: redis::Script::new(SAVE_SCRIPT),
        })
    }
}

#[async_trait]
impl RegistrationStore for RedisRegistrationStore {
    async fn save(&self, registration: &Registration) -> Result<(), StoreError> {
        let serial = registration.serial_number.to_string();
        let json = serde_json::to_string(registration)?;
        let mut conn = self.conn.clone();

        let created: i32 = self
            .save_script
            .key(registration_key(&serial))
            .key(SERIAL_INDEX)
            .arg(&json)
            .arg(registration.serial_number.value())
            .arg(&serial)
            .invoke_async(&mut conn)
            .await?;
        if created == 0 {
            debug!("Registration {} already exists", serial);
            return Err(StoreError::DuplicateSerial(registration.serial_number));
        }

        info!("Saved registration {}", serial);
        Ok(())
    }

    async fn find_max_serial(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let top: Vec<String> = conn.zrevrange(SERIAL_INDEX, 0, 0).await?;
        Ok(top.into_iter().next())
    }

    async fn find_all(&self) -> Result<Vec<Registration>, StoreError> {
        let mut conn = self.conn.clone();
        let serials: Vec<String> = conn.zrange(SERIAL_INDEX, 0, -1).await?;

        let mut registrations = Vec::with_capacity(serials.len());
        for serial in serials {
            let json: Option<String> = conn.get(registration_key(&serial)).await?;
            match json {
                Some(data) => registrations.push(serde_json::from_str(&data)?),
                None => warn!("Serial {} is indexed but has no document", serial),
            }
        }

        Ok(registrations)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count: usize = conn.zcard(SERIAL_INDEX).await?;
        Ok(count)
    }
}

/// In-process registration store for mock mode and tests
#[derive(Default)]
pub struct MemoryRegistrationStore {
    records: Mutex<BTreeMap<SerialNumber, Registration>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn save(&self, registration: &Registration) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&registration.serial_number) {
            return Err(StoreError::DuplicateSerial(registration.serial_number));
        }
        records.insert(registration.serial_number, registration.clone());
        debug!("Saved registration {} in memory", registration.serial_number);
        Ok(())
    }

    async fn find_max_serial(&self) -> Result<Option<String>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.keys().next_back().map(|s| s.to_string()))
    }

    async fn find_all(&self) -> Result<Vec<Registration>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.len())
    }
}
