// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The crop engine: region store, constraints, history, grid and the
//! session that ties them together.

pub mod constraints;
pub mod grid;
pub mod history;
pub mod session;
pub mod store;
