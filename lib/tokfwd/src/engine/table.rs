// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Forwarding tables.
//!
//! The engine only ever reads tables, through [`Lookup`]. A lookup
//! returns the value by copy, so an entry replaced or removed by the
//! control plane mid-lookup yields either the old or the new value,
//! never a mix of both.
//!
//! [`FwdTable`] is the concrete table shared between the control plane
//! and any number of engine instances.

#[cfg(feature = "std")]
use crate::api::DestInfo;
#[cfg(feature = "std")]
use crate::api::MacAddr;
#[cfg(feature = "std")]
use crate::api::RedirectParams;
#[cfg(feature = "std")]
use crate::api::Token;
#[cfg(feature = "std")]
use crate::ddi::sync::KRwLock;
use alloc::collections::BTreeMap;
use alloc::string::String;
#[cfg(feature = "std")]
use alloc::string::ToString;
use alloc::sync::Arc;
#[cfg(feature = "std")]
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use core::num::NonZeroU32;

/// The MAC redirect table holds a single entry.
pub const MAC_TABLE_CAP: NonZeroU32 = NonZeroU32::new(1).unwrap();

pub const TOKEN_TABLE_CAP: NonZeroU32 = NonZeroU32::new(4096).unwrap();

pub const EGRESS_TABLE_CAP: NonZeroU32 = NonZeroU32::new(256).unwrap();

/// A read-only view of a key/value table.
pub trait Lookup<K, V> {
    fn lookup(&self, key: &K) -> Option<V>;
}

impl<K, V, L: Lookup<K, V> + ?Sized> Lookup<K, V> for &L {
    fn lookup(&self, key: &K) -> Option<V> {
        (**self).lookup(key)
    }
}

impl<K, V, L: Lookup<K, V> + ?Sized> Lookup<K, V> for Arc<L> {
    fn lookup(&self, key: &K) -> Option<V> {
        (**self).lookup(key)
    }
}

impl<K: Ord, V: Clone> Lookup<K, V> for BTreeMap<K, V> {
    fn lookup(&self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TableError {
    /// A new key would take the table past its limit.
    Full { table: String, limit: u32 },
    NotFound { table: String },
}

impl Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Full { table, limit } => {
                write!(f, "table {table} is full ({limit} entries)")
            }

            Self::NotFound { table } => {
                write!(f, "no such entry in table {table}")
            }
        }
    }
}

/// A named, bounded table shared between writers and engine readers.
#[cfg(feature = "std")]
pub struct FwdTable<K, V> {
    name: String,
    limit: NonZeroU32,
    map: KRwLock<BTreeMap<K, V>>,
}

/// Source MAC to redirect destination.
#[cfg(feature = "std")]
pub type MacTable = FwdTable<MacAddr, RedirectParams>;

/// Token to rewrite destination.
#[cfg(feature = "std")]
pub type TokenTable = FwdTable<Token, DestInfo>;

/// Egress index to interface name.
#[cfg(feature = "std")]
pub type EgressTable = FwdTable<u32, String>;

#[cfg(feature = "std")]
impl<K: Ord + Clone, V: Clone> FwdTable<K, V> {
    pub fn new(name: &str, limit: NonZeroU32) -> Self {
        Self {
            name: name.to_string(),
            limit,
            map: KRwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> NonZeroU32 {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Insert or replace an entry, returning the value it replaced.
    ///
    /// Replacing an existing key is always allowed, even when the
    /// table is at its limit.
    pub fn set(&self, key: K, val: V) -> Result<Option<V>, TableError> {
        let mut map = self.map.write();
        if !map.contains_key(&key) && map.len() >= self.limit.get() as usize
        {
            return Err(TableError::Full {
                table: self.name.clone(),
                limit: self.limit.get(),
            });
        }

        Ok(map.insert(key, val))
    }

    pub fn remove(&self, key: &K) -> Result<V, TableError> {
        self.map
            .write()
            .remove(key)
            .ok_or_else(|| TableError::NotFound { table: self.name.clone() })
    }

    pub fn clear(&self) {
        self.map.write().clear();
    }

    /// A snapshot of every entry, in key order.
    pub fn dump(&self) -> Vec<(K, V)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(feature = "std")]
impl<K: Ord, V: Clone> Lookup<K, V> for FwdTable<K, V> {
    fn lookup(&self, key: &K) -> Option<V> {
        self.map.read().get(key).cloned()
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::api::Ipv4Addr;
    use std::thread;

    fn dest(last: u8, port: u16) -> DestInfo {
        DestInfo::new(Ipv4Addr::from([10, 0, 0, last]), port)
    }

    #[test]
    fn set_replace_remove() {
        let tbl = TokenTable::new("tokens", TOKEN_TABLE_CAP);
        let tok = Token::from([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(tbl.lookup(&tok), None);
        assert_eq!(tbl.set(tok, dest(2, 7777)), Ok(None));
        assert_eq!(tbl.lookup(&tok), Some(dest(2, 7777)));
        assert_eq!(tbl.set(tok, dest(3, 7777)), Ok(Some(dest(2, 7777))));
        assert_eq!(tbl.len(), 1);
        assert_eq!(tbl.remove(&tok), Ok(dest(3, 7777)));
        assert_eq!(
            tbl.remove(&tok),
            Err(TableError::NotFound { table: "tokens".to_string() })
        );
        assert_eq!(tbl.len(), 0);
    }

    #[test]
    fn limit_enforced() {
        let tbl = MacTable::new("redirect", MAC_TABLE_CAP);
        let a: MacAddr = "A8:40:25:00:00:01".parse().unwrap();
        let b: MacAddr = "A8:40:25:00:00:02".parse().unwrap();
        let p = RedirectParams::from(MacAddr::BROADCAST);

        tbl.set(a, p).unwrap();
        let err = tbl.set(b, p).unwrap_err();
        assert_eq!(
            err,
            TableError::Full { table: "redirect".to_string(), limit: 1 }
        );
        assert_eq!(err.to_string(), "table redirect is full (1 entries)");

        // Replacing the one entry is fine.
        assert!(tbl.set(a, RedirectParams::from(b)).is_ok());
        assert_eq!(tbl.lookup(&a), Some(RedirectParams::from(b)));

        tbl.clear();
        assert!(tbl.set(b, p).is_ok());
        assert_eq!(tbl.lookup(&a), None);
    }

    #[test]
    fn dump_sorted() {
        let tbl = EgressTable::new("egress", EGRESS_TABLE_CAP);
        tbl.set(2, "ens7".to_string()).unwrap();
        tbl.set(0, "ens5".to_string()).unwrap();
        tbl.set(1, "ens6".to_string()).unwrap();
        let dump = tbl.dump();
        assert_eq!(
            dump,
            vec![
                (0, "ens5".to_string()),
                (1, "ens6".to_string()),
                (2, "ens7".to_string()),
            ]
        );
        assert_eq!(tbl.capacity().get(), 256);
        assert_eq!(tbl.name(), "egress");
    }

    #[test]
    fn lookup_through_handles() {
        let tbl = Arc::new(TokenTable::new("tokens", TOKEN_TABLE_CAP));
        let tok = Token::from([9; 8]);
        tbl.set(tok, dest(9, 9)).unwrap();

        fn via<L: Lookup<Token, DestInfo>>(
            l: L,
            t: &Token,
        ) -> Option<DestInfo> {
            l.lookup(t)
        }

        assert_eq!(via(&*tbl, &tok), Some(dest(9, 9)));
        assert_eq!(via(Arc::clone(&tbl), &tok), Some(dest(9, 9)));

        let mut map = BTreeMap::new();
        map.insert(tok, dest(1, 1));
        assert_eq!(via(&map, &tok), Some(dest(1, 1)));
    }

    #[test]
    fn readers_never_see_torn_entries() {
        let tbl = Arc::new(TokenTable::new("tokens", TOKEN_TABLE_CAP));
        let tok = Token::from([7; 8]);
        let a = dest(1, 1111);
        let b = dest(2, 2222);
        tbl.set(tok, a).unwrap();

        let writer = {
            let tbl = Arc::clone(&tbl);
            thread::spawn(move || {
                for i in 0..1000 {
                    tbl.set(tok, if i % 2 == 0 { b } else { a }).unwrap();
                }
            })
        };

        for _ in 0..1000 {
            let got = tbl.lookup(&tok).unwrap();
            assert!(got == a || got == b);
        }

        writer.join().unwrap();
    }
}
