//! Deterministic key allocation.
//!
//! A [`KeyPool`] hands out fixed-length words over the home-row alphabet. The
//! n-th key is simply `n` written in base 8 with the alphabet as digits,
//! zero-padded to the pool length, so generation needs no collision checks and
//! the order is fully reproducible:
//!
//! ```text
//! counter 0 -> aaa, 1 -> aas, 7 -> aal, 8 -> asa, 511 -> lll
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;
use testnav_core::{ALPHABET, CLASS_KEY_LEN, FUNCTION_KEY_LEN};
use thiserror::Error;

/// Which pool a key is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Class-level (grouping) shortcuts.
    Class,
    /// Leaf test shortcuts.
    Function,
}

impl PoolKind {
    /// Default key length for this pool.
    pub fn default_len(self) -> u32 {
        match self {
            PoolKind::Class => CLASS_KEY_LEN,
            PoolKind::Function => FUNCTION_KEY_LEN,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Class => write!(f, "class"),
            PoolKind::Function => write!(f, "function"),
        }
    }
}

/// A key issued by a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when a pool has issued every key it can.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {capacity} {kind} keys have been exhausted ({requested} more required)")]
pub struct PoolExhausted {
    pub kind: PoolKind,
    pub capacity: u64,
    /// How many more keys the caller needed when the pool ran dry.
    pub requested: u64,
}

/// Usage counters for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub issued: u64,
    pub remaining: u64,
    pub capacity: u64,
}

/// A bounded namespace of unique fixed-length keys.
#[derive(Debug, Clone)]
pub struct KeyPool {
    kind: PoolKind,
    len: u32,
    capacity: u64,
    issued: u64,
}

impl KeyPool {
    /// Create a pool of `len`-symbol keys.
    ///
    /// Capacity is `8^len`, saturating at `u64::MAX` for absurd lengths.
    pub fn new(kind: PoolKind, len: u32) -> Self {
        let len = len.max(1);
        let capacity = (ALPHABET.len() as u64).checked_pow(len).unwrap_or(u64::MAX);
        Self {
            kind,
            len,
            capacity,
            issued: 0,
        }
    }

    /// Create a pool with the default length for `kind`.
    pub fn for_kind(kind: PoolKind) -> Self {
        Self::new(kind, kind.default_len())
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn key_len(&self) -> u32 {
        self.len
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Issue the next unused key.
    pub fn next_key(&mut self) -> Result<Key, PoolExhausted> {
        if self.issued >= self.capacity {
            return Err(PoolExhausted {
                kind: self.kind,
                capacity: self.capacity,
                requested: 1,
            });
        }
        let key = encode(self.issued, self.len);
        self.issued += 1;
        Ok(key)
    }

    /// Forget every issued key; the next key is the first one again.
    pub fn reset(&mut self) {
        self.issued = 0;
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            issued: self.issued,
            remaining: self.capacity - self.issued,
            capacity: self.capacity,
        }
    }
}

/// Render `counter` in base 8 over the alphabet, most significant digit first.
fn encode(counter: u64, len: u32) -> Key {
    let base = ALPHABET.len() as u64;
    let mut digits = vec![ALPHABET[0]; len as usize];
    let mut value = counter;
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % base) as usize];
        value /= base;
    }
    Key(digits.into_iter().collect())
}

/// The class and function pools owned by one navigator session.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    class: KeyPool,
    function: KeyPool,
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self {
            class: KeyPool::for_kind(PoolKind::Class),
            function: KeyPool::for_kind(PoolKind::Function),
        }
    }

    pub fn next(&mut self, kind: PoolKind) -> Result<Key, PoolExhausted> {
        self.pool_mut(kind).next_key()
    }

    pub fn reset(&mut self, kind: PoolKind) {
        self.pool_mut(kind).reset();
    }

    pub fn reset_all(&mut self) {
        self.class.reset();
        self.function.reset();
    }

    pub fn stats(&self, kind: PoolKind) -> PoolStats {
        self.pool(kind).stats()
    }

    pub fn pool(&self, kind: PoolKind) -> &KeyPool {
        match kind {
            PoolKind::Class => &self.class,
            PoolKind::Function => &self.function,
        }
    }

    fn pool_mut(&mut self, kind: PoolKind) -> &mut KeyPool {
        match kind {
            PoolKind::Class => &mut self.class,
            PoolKind::Function => &mut self.function,
        }
    }

    /// Borrow both pools at once, class pool first.
    pub fn pools_mut(&mut self) -> (&mut KeyPool, &mut KeyPool) {
        (&mut self.class, &mut self.function)
    }
}
