// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod fwd;
pub mod ip;
pub mod mac;
pub mod token;

pub use fwd::*;
pub use ip::*;
pub use mac::*;
pub use token::*;

/// The overall version of the API. Anytime a type shared between the
/// engine and its control plane changes, this number should
/// increment.
pub const API_VERSION: u64 = 1;

/// Major version of the tokfwd package.
pub const MAJOR_VERSION: u64 = 0;

/// The terminal classification of a single frame.
///
/// The values returned by [`Disposition::xdp_action()`] are the action
/// codes understood by the hosting receive path.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Disposition {
    /// Discard the frame and raise an engine-level error event.
    Aborted,
    /// Discard the frame silently.
    Drop,
    /// Deliver the frame, unmodified, to the normal receive path.
    Pass,
    /// Transmit the (possibly rewritten) frame out of the egress path
    /// found at `egress` in the egress table.
    Redirect { egress: u32 },
}

pub const XDP_ABORTED: u32 = 0;
pub const XDP_DROP: u32 = 1;
pub const XDP_PASS: u32 = 2;
pub const XDP_TX: u32 = 3;
pub const XDP_REDIRECT: u32 = 4;

impl Disposition {
    /// The action code handed back to the receive framework.
    pub const fn xdp_action(self) -> u32 {
        match self {
            Self::Aborted => XDP_ABORTED,
            Self::Drop => XDP_DROP,
            Self::Pass => XDP_PASS,
            Self::Redirect { .. } => XDP_REDIRECT,
        }
    }

    /// Does the frame leave the engine (as opposed to being discarded)?
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Pass | Self::Redirect { .. })
    }
}

impl Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "ABORTED"),
            Self::Drop => write!(f, "DROP"),
            Self::Pass => write!(f, "PASS"),
            Self::Redirect { egress } => write!(f, "REDIRECT({egress})"),
        }
    }
}
