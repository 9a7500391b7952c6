// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis stages — luminance preprocessing, edge map, window search, and
// candidate ranking. Each stage takes its input by reference and returns a
// new owned value.

pub mod edges;
pub mod preprocess;
pub mod rank;
pub mod search;

pub use edges::{EdgeMap, detect_edges};
pub use preprocess::prepare;
pub use rank::{filter_and_rank, iou};
pub use search::{RectangleSearcher, SearchOutcome};
