// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! State-changing operations.
//!
//! ## Module Organization
//!
//! - `revisions`: Revision markers and changed entity names
//! - `audit`: Audit row inserts, deletes, and validity end-revision updates
//! - `entities`: Host entity state and collection elements

pub mod audit;
pub mod entities;
pub mod revisions;
