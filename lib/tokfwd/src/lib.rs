// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! tokfwd: an in-line, token-addressed frame rewriter.
//!
//! Frames are classified as they arrive, an 8-byte token is pulled
//! out of a custom header behind the transport header, and the token
//! is resolved against a forwarding table to a new destination. The
//! frame's IPv4 destination and the checksums covering it are then
//! rewritten in place and the frame is handed back with a
//! [`api::Disposition`].
//!
//! The per-packet path never allocates, never blocks and never loops
//! on packet data; see [`engine::fwd`].

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

// This is needed so that the kstat-macro (`#[derive(KStatProvider)]`)
// can use fully-qualified type paths.
extern crate self as tokfwd;

pub mod api;
pub mod ddi;
pub mod engine;
#[cfg(feature = "std")]
pub mod print;
