//! Serial number allocation
//!
//! Serials are derived from the highest serial already in the registration
//! store. The allocator also remembers the last serial it issued, so
//! submissions running concurrently in this process never share a serial
//! even before the first of them is persisted. Separate processes can still
//! race; the store's uniqueness check rejects the loser.

use registrar_common::SerialNumber;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::store::RegistrationStore;

/// Seed used when no serial has ever been issued; the first serial is seed + 1
pub const DEFAULT_SEED: u64 = 818;

pub struct SerialAllocator {
    store: Arc<dyn RegistrationStore>,
    seed: SerialNumber,
    lookup_timeout: Duration,
    last_issued: Mutex<Option<SerialNumber>>,
}

impl SerialAllocator {
    pub fn new(store: Arc<dyn RegistrationStore>, seed: u64, lookup_timeout: Duration) -> Self {
        Self {
            store,
            seed: SerialNumber::new(seed),
            lookup_timeout,
            last_issued: Mutex::new(None),
        }
    }

    /// Allocate the next serial
    ///
    /// Never fails: an unreachable store or an unparseable stored serial
    /// falls back to the seed.
    pub async fn next(&self) -> SerialNumber {
        let mut last_issued = self.last_issued.lock().await;

        let stored = self.stored_max().await;
        let base = [stored, *last_issued]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.seed);

        let serial = base.next();
        *last_issued = Some(serial);

        debug!("Allocated serial {}", serial);
        serial
    }

    async fn stored_max(&self) -> Option<SerialNumber> {
        let lookup = tokio::time::timeout(self.lookup_timeout, self.store.find_max_serial()).await;

        match lookup {
            Ok(Ok(Some(raw))) => match raw.parse() {
                Ok(serial) => Some(serial),
                Err(e) => {
                    warn!("Ignoring stored serial: {}", e);
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("Serial lookup failed, falling back to seed: {}", e);
                None
            }
            Err(_) => {
                warn!("Serial lookup timed out, falling back to seed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryRegistrationStore;
    use async_trait::async_trait;
    use registrar_common::{Registration, RegistrationForm};

    /// Store whose max-serial answer is fixed
    struct FixedMaxStore(Result<Option<String>, ()>);

    #[async_trait]
    impl RegistrationStore for FixedMaxStore {
        async fn save(&self, _registration: &Registration) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_max_serial(&self) -> Result<Option<String>, StoreError> {
            match &self.0 {
                Ok(value) => Ok(value.clone()),
                Err(()) => Err(StoreError::Json(
                    serde_json::from_str::<u8>("unavailable").unwrap_err(),
                )),
            }
        }

        async fn find_all(&self) -> Result<Vec<Registration>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn allocator(store: Arc<dyn RegistrationStore>) -> SerialAllocator {
        SerialAllocator::new(store, DEFAULT_SEED, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_serial_is_seed_plus_one() {
        let allocator = allocator(Arc::new(MemoryRegistrationStore::new()));
        assert_eq!(allocator.next().await.to_string(), "000819");
    }

    #[tokio::test]
    async fn test_increments_stored_max() {
        let allocator = allocator(Arc::new(FixedMaxStore(Ok(Some("001204".to_string())))));
        assert_eq!(allocator.next().await.to_string(), "001205");
    }

    #[tokio::test]
    async fn test_corrupt_serial_falls_back_to_seed() {
        let allocator = allocator(Arc::new(FixedMaxStore(Ok(Some("abc".to_string())))));
        assert_eq!(allocator.next().await.to_string(), "000819");
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back_to_seed() {
        let allocator = allocator(Arc::new(FixedMaxStore(Err(()))));
        assert_eq!(allocator.next().await.to_string(), "000819");
        // Remembered in-process even while the store stays down
        assert_eq!(allocator.next().await.to_string(), "000820");
    }

    #[tokio::test]
    async fn test_sequential_submissions_strictly_increase() {
        let store = Arc::new(MemoryRegistrationStore::new());
        let allocator = allocator(store.clone());

        let mut issued = Vec::new();
        for i in 0..10 {
            let serial = allocator.next().await;
            // Persist every other one so both sources are exercised
            if i % 2 == 0 {
                let registration = Registration::stamp(serial, RegistrationForm::default());
                store.save(&registration).await.unwrap();
            }
            issued.push(serial);
        }

        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(issued.first().unwrap().value(), 819);
        assert_eq!(issued.last().unwrap().value(), 828);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_distinct() {
        let allocator = Arc::new(allocator(Arc::new(MemoryRegistrationStore::new())));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.next().await })
            })
            .collect();

        let mut serials = Vec::new();
        for handle in handles {
            serials.push(handle.await.unwrap());
        }
        serials.sort();
        serials.dedup();
        assert_eq!(serials.len(), 20);
    }
}
