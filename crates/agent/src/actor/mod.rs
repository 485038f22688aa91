// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attribution of authorisation requests to a user-facing application.
//!
//! A polkit subject pid is walked up the `/proc` ancestry until a desktop
//! application is found, guarding against processes that merely claim to be
//! a privilege bridge.

pub mod desktop;
pub mod proc;
pub mod resolve;

pub use desktop::{DesktopEntry, DesktopIndex};
pub use proc::{ProcInfo, ProcSource, ProcfsSource};
pub use resolve::{extract_subject_pid, resolve_requestor, ActorInfo, Confidence};
