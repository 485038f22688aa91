// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket transport: the line-framed server and the blocking
//! one-shot client.

pub mod client;
pub mod server;

pub use client::IpcClient;
pub use server::serve;
