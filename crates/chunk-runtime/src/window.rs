// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Prior-window construction and conditioning slicing.

use crate::Frame;
use std::ops::Range;

/// The window for chunk 0: `copies` copies of the reference frame.
pub fn initial_window(reference: &Frame, copies: usize) -> Vec<Frame> {
    vec![reference.clone(); copies]
}

/// The window for chunk t > 0: the last `window_size` frames of the
/// previous chunk, rescaled to the input convention.
///
/// A previous chunk shorter than `window_size` contributes all its frames.
pub fn steady_window(previous: &[Frame], window_size: usize) -> Vec<Frame> {
    let start = previous.len().saturating_sub(window_size);
    previous[start..].iter().map(Frame::rescaled).collect()
}

/// Conditioning rows for chunk `index`, clamped to `len`.
pub fn conditioning_range(index: usize, chunk_length: usize, len: usize) -> Range<usize> {
    let start = (index * chunk_length).min(len);
    let end = ((index + 1) * chunk_length).min(len);
    start..end
}
