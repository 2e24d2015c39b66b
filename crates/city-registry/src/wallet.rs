//! Wallets
//!
//! Token balances live in a shared [`Ledger`]; a [`LedgerWallet`] is one
//! address's view onto it.

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RegistryError;

/// Generate a fresh `0x`-prefixed, 40 hex digit address
pub fn generate_address<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 20] = rng.gen();
    let mut address = String::with_capacity(42);
    address.push_str("0x");
    for b in bytes {
        address.push_str(&format!("{:02x}", b));
    }
    address
}

/// Check the `0x` + 40 hex digit shape
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Receipt for a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub tx_id: Uuid,
    pub from: String,
    pub to: String,
    pub amount: u64,
}

/// Shared token balances keyed by address
#[derive(Debug, Default)]
pub struct Ledger {
    balances: Mutex<HashMap<String, u64>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Credit tokens out of thin air (faucet / genesis)
    pub fn mint(&self, address: &str, amount: u64) -> Result<(), RegistryError> {
        if !is_valid_address(address) {
            return Err(RegistryError::InvalidAddress(address.to_string()));
        }
        let mut balances = self.balances.lock();
        *balances.entry(address.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.balances.lock().get(address).copied().unwrap_or(0)
    }

    /// Move tokens between addresses atomically
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<Transfer, RegistryError> {
        if amount == 0 {
            return Err(RegistryError::ZeroAmount);
        }
        if !is_valid_address(to) {
            return Err(RegistryError::InvalidAddress(to.to_string()));
        }

        let mut balances = self.balances.lock();
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(RegistryError::InsufficientBalance {
                address: from.to_string(),
                available,
                requested: amount,
            });
        }
        balances.insert(from.to_string(), available - amount);
        *balances.entry(to.to_string()).or_insert(0) += amount;

        Ok(Transfer {
            tx_id: Uuid::new_v4(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        })
    }
}

/// Token wallet operations used by chat actions
pub trait Wallet {
    fn address(&self) -> &str;
    fn balance(&self) -> u64;
    fn transfer(&self, to: &str, amount: u64) -> Result<Transfer, RegistryError>;
}

/// A wallet backed by a shared [`Ledger`]
#[derive(Debug, Clone)]
pub struct LedgerWallet {
    address: String,
    ledger: Arc<Ledger>,
}

impl LedgerWallet {
    pub fn new(address: impl Into<String>, ledger: Arc<Ledger>) -> Self {
        Self {
            address: address.into(),
            ledger,
        }
    }

    /// Create a wallet with a newly generated address
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, ledger: Arc<Ledger>) -> Self {
        Self::new(generate_address(rng), ledger)
    }
}

impl Wallet for LedgerWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn balance(&self) -> u64 {
        self.ledger.balance(&self.address)
    }

    fn transfer(&self, to: &str, amount: u64) -> Result<Transfer, RegistryError> {
        self.ledger.transfer(&self.address, to, amount)
    }
}
