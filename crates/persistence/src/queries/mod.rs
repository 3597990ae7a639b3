// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read-only queries.
//!
//! ## Module Organization
//!
//! - `revisions`: Revision markers and changed entity names
//! - `audit`: Audit history of entities (the audit reader)
//! - `entities`: Current host entity state

pub mod audit;
pub mod entities;
pub mod revisions;
