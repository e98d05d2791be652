// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The per-packet engine.
//!
//! Everything reachable from [`fwd::Forwarder::process()`] runs to
//! completion on a single frame without allocating, blocking, or
//! logging. The only std-only piece is the concrete [`table::FwdTable`].
pub mod checksum;
pub mod cursor;
pub mod ether;
pub mod fwd;
pub mod ip4;
pub mod ip6;
pub mod stat;
pub mod table;
pub mod tcp;
pub mod token;
pub mod udp;

pub use cursor::Cursor;
pub use cursor::ParseError;
pub use fwd::Forwarder;
pub use fwd::ProcessError;
