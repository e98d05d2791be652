// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Named 64-bit counters.
//!
//! Counters are grouped into providers: structs whose fields are all
//! [`KStatU64`]. A provider is registered under a module and a name
//! with [`KStatNamed`], and read back as a plain snapshot struct.
use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;
use core::fmt;
use core::fmt::Display;

/// The longest name (including the terminating NUL) a stat consumer
/// will display without truncation.
pub const KSTAT_STRLEN: usize = 31;

/// A provider of named stats.
///
/// Rather than implementing this trait manually, the kstat-macro
/// should be used.
///
/// # Example
///
/// To declare a new kstat provider simply define a struct of named
/// fields with type [`KStatU64`] and derive [`KStatProvider`].
///
/// ```ignore
/// #[derive(KStatProvider)]
/// struct SomeStats {
///     bytes_out: KStatU64,
///     bytes_in: KStatU64,
/// }
/// ```
///
/// To update the values use the `+=` operator.
///
/// ```ignore
/// some_val.stats.bytes_out += 54;
/// ```
pub trait KStatProvider {
    const NUM_FIELDS: u32;
    type Snap;

    fn init(&mut self) -> Result<(), Error>;

    fn new() -> Self;

    fn num_fields(&self) -> u32 {
        Self::NUM_FIELDS
    }

    /// Return a snapshot of the stats. This is how you obtain a copy,
    /// as opposed to the traditional clone().
    fn snapshot(&self) -> Self::Snap;
}

/// Initialize and register a [`KStatProvider`].
///
/// ```ignore
/// #[derive(KStatProvider)]
/// pub StatProvider {
///     my_counter: KStatU64,
/// }
///
/// KStatNamed::new("module", "name", StatProvider::new());
/// ```
///
/// The counters are owned by whoever holds the `KStatNamed`; readers
/// take snapshots. A snapshot of several counters is consistent only
/// if the owner is not updating them at the time.
pub struct KStatNamed<T: KStatProvider> {
    module: String,
    name: String,
    pub vals: Box<T>,
}

impl<T: KStatProvider> KStatNamed<T> {
    pub fn new(
        module: &str,
        name: &str,
        provider: T,
    ) -> Result<KStatNamed<T>, Error> {
        check_name(module)?;
        check_name(name)?;
        let mut vals = Box::new(provider);
        vals.init()?;

        Ok(Self { module: module.to_string(), name: name.to_string(), vals })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    if name.as_bytes().contains(&0) {
        return Err(Error::NulChar);
    }

    // Leave room for the NUL a C consumer expects.
    if name.len() + 1 > KSTAT_STRLEN {
        return Err(Error::NameTooLong(name.to_string()));
    }

    Ok(())
}

/// A 64-bit unsigned named kstat.
#[derive(Debug, Default)]
pub struct KStatU64 {
    value: u64,
}

impl KStatU64 {
    pub fn init(&mut self, name: &str) -> Result<(), Error> {
        check_name(name)
    }

    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn set(&mut self, val: u64) {
        self.value = val;
    }

    pub fn val(&self) -> u64 {
        self.value
    }
}

impl core::ops::AddAssign<u64> for KStatU64 {
    #[inline]
    fn add_assign(&mut self, other: u64) {
        self.value = self.value.wrapping_add(other);
    }
}

impl core::ops::SubAssign<u64> for KStatU64 {
    #[inline]
    fn sub_assign(&mut self, other: u64) {
        self.value = self.value.wrapping_sub(other);
    }
}

/// A kstat error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    NameTooLong(String),
    NulChar,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NameTooLong(name) => {
                write!(f, "kstat name too long: {}", name)
            }

            Self::NulChar => write!(f, "kstat name contains NUL char"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_ops() {
        let mut c = KStatU64::new();
        c += 7;
        c += 3;
        c -= 2;
        assert_eq!(c.val(), 8);
        c.set(1);
        assert_eq!(c.val(), 1);
    }

    #[test]
    fn names_checked() {
        assert_eq!(check_name("xdp0"), Ok(()));
        assert_eq!(check_name("bad\0name"), Err(Error::NulChar));
        let long = "a".repeat(KSTAT_STRLEN);
        assert_eq!(check_name(&long), Err(Error::NameTooLong(long.clone())));
    }
}
