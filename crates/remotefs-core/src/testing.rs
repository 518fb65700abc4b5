// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test utilities for code built on remotefs
//!
//! [`memory`] provides an in-memory server whose sessions behave like a
//! remote file protocol session, including injectable failures.

pub mod memory;
