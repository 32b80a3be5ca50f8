//! Nonce Allocator - per-address reservation bookkeeping for transaction nonces
//!
//! Every transaction a wallet sends needs the next nonce in its sequence. The
//! allocator hands those out from a local counter so adapters do not query the
//! node for each transaction, and it makes reservations explicit so a failed
//! transaction can hand its nonce back.
//!
//! # Lifecycle
//!
//! 1. **Seed**: the first reservation for an address pulls the pending
//!    transaction count from the chain (or the caller seeds it directly)
//! 2. **Reserve**: returns the next nonce and marks it outstanding
//! 3. **Commit**: the transaction was broadcast, so the nonce is spent even if
//!    it later reverts on-chain
//! 4. **Release**: the transaction never left the process, so the nonce is
//!    rolled back and the next reservation returns it again
//!
//! # Guarantees
//!
//! - At most one outstanding reservation per address. A second `reserve`
//!   before the first is committed or released fails with
//!   [`NonceError::AlreadyReserved`].
//! - `release` and `commit` must name the outstanding nonce exactly, otherwise
//!   [`NonceError::StateMismatch`] is returned and nothing changes.
//! - Addresses are independent. The map is a [`DashMap`], so workers driving
//!   different wallets never contend on a global lock.
//!
//! # Example
//!
//! ```rust
//! use core_logic::NonceAllocator;
//!
//! let allocator = NonceAllocator::new();
//! allocator.seed("0xabc", 7);
//!
//! let n = allocator.reserve("0xabc").unwrap();
//! assert_eq!(n, 7);
//!
//! // Signing failed: give the nonce back.
//! allocator.release("0xabc", n).unwrap();
//! assert_eq!(allocator.reserve("0xabc").unwrap(), 7);
//! ```

use crate::error::NonceError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Display;
use std::future::Future;

#[derive(Debug, Clone, Copy)]
struct NonceSlot {
    /// Next nonce to hand out.
    next: u64,
    outstanding: Option<u64>,
}

/// Thread-safe nonce allocator for many wallets.
#[derive(Debug, Default)]
pub struct NonceAllocator {
    slots: DashMap<String, NonceSlot>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn key(address: &str) -> String {
        address.trim().to_ascii_lowercase()
    }

    /// Sets the next nonce for `address`, dropping any outstanding reservation.
    ///
    /// Use on first contact or after a "nonce too low" style error to
    /// resynchronize with the chain.
    pub fn seed(&self, address: &str, next: u64) {
        self.slots.insert(
            Self::key(address),
            NonceSlot {
                next,
                outstanding: None,
            },
        );
    }

    pub fn is_seeded(&self, address: &str) -> bool {
        self.slots.contains_key(&Self::key(address))
    }

    /// Forgets everything about `address`. The next `reserve_or_seed` refetches.
    pub fn forget(&self, address: &str) {
        self.slots.remove(&Self::key(address));
    }

    /// Reserves the next nonce for an already seeded address.
    pub fn reserve(&self, address: &str) -> Result<u64, NonceError> {
        let key = Self::key(address);
        let mut slot = self
            .slots
            .get_mut(&key)
            .ok_or_else(|| NonceError::NotSeeded {
                address: key.clone(),
            })?;

        if let Some(outstanding) = slot.outstanding {
            return Err(NonceError::AlreadyReserved {
                address: key,
                outstanding,
            });
        }

        let nonce = slot.next;
        slot.outstanding = Some(nonce);
        slot.next = nonce + 1;
        Ok(nonce)
    }

    /// Reserves a nonce, seeding the address from `fetch` on first use.
    ///
    /// `fetch` runs without any map lock held. If another caller seeds the
    /// same address while the fetch is in flight, the existing state wins.
    pub async fn reserve_or_seed<F, Fut, E>(&self, address: &str, fetch: F) -> Result<u64, NonceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
        E: Display,
    {
        if !self.is_seeded(address) {
            let start = fetch().await.map_err(|e| NonceError::SeedFailed {
                address: Self::key(address),
                msg: e.to_string(),
            })?;

            if let Entry::Vacant(vacant) = self.slots.entry(Self::key(address)) {
                vacant.insert(NonceSlot {
                    next: start,
                    outstanding: None,
                });
            }
        }
        self.reserve(address)
    }

    /// Rolls back an unbroadcast reservation so the same nonce is reused.
    pub fn release(&self, address: &str, nonce: u64) -> Result<(), NonceError> {
        let key = Self::key(address);
        let mut slot = self.matching_slot(&key, nonce)?;
        slot.outstanding = None;
        slot.next = nonce;
        Ok(())
    }

    /// Marks a reservation as spent on-chain. The counter keeps advancing.
    pub fn commit(&self, address: &str, nonce: u64) -> Result<(), NonceError> {
        let key = Self::key(address);
        let mut slot = self.matching_slot(&key, nonce)?;
        slot.outstanding = None;
        Ok(())
    }

    pub fn outstanding(&self, address: &str) -> Option<u64> {
        self.slots
            .get(&Self::key(address))
            .and_then(|slot| slot.outstanding)
    }

    /// Nonce the next `reserve` would return, if the address is known.
    pub fn peek_next(&self, address: &str) -> Option<u64> {
        self.slots.get(&Self::key(address)).map(|slot| slot.next)
    }

    fn matching_slot(
        &self,
        key: &str,
        nonce: u64,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, NonceSlot>, NonceError> {
        let mismatch = |expected| NonceError::StateMismatch {
            address: key.to_string(),
            expected,
            got: nonce,
        };

        let slot = self.slots.get_mut(key).ok_or_else(|| mismatch(None))?;
        if slot.outstanding != Some(nonce) {
            return Err(mismatch(slot.outstanding));
        }
        Ok(slot)
    }
}
