// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O: image acquisition, decoding, crop export and settings files.

pub mod acquire;
pub mod export;
pub mod media;
pub mod serialization;
