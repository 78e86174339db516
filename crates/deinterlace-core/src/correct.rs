use ndarray::{ArrayViewMut1, ArrayViewMut3, Axis, Slice};

use crate::frame::Pixel;
use crate::schedule::Block;

/// Shift the backward-scan (odd) rows of every frame in `block` by `offset`
/// columns, in place.
///
/// The shift crops rather than wraps: samples pushed past the edge are
/// discarded and the vacated columns keep their previous values. An offset
/// of zero, or one at least as wide as the frame, leaves the rows untouched.
pub fn correct_block<T: Pixel>(mut images: ArrayViewMut3<'_, T>, block: Block, offset: i32) {
    let frames = images.slice_axis_mut(Axis(0), Slice::from(block.range()));
    shift_backward_rows(frames, offset);
}

/// [`correct_block`] over every frame of an already-sliced block.
pub fn shift_backward_rows<T: Pixel>(mut frames: ArrayViewMut3<'_, T>, offset: i32) {
    if offset == 0 {
        return;
    }
    for mut frame in frames.axis_iter_mut(Axis(0)) {
        for mut row in frame.axis_iter_mut(Axis(0)).skip(1).step_by(2) {
            shift_row(&mut row, offset);
        }
    }
}

fn shift_row<T: Pixel>(row: &mut ArrayViewMut1<'_, T>, offset: i32) {
    let width = row.len();
    let k = offset.unsigned_abs() as usize;
    if k >= width {
        return;
    }

    if let Some(slice) = row.as_slice_mut() {
        if offset > 0 {
            slice.copy_within(0..width - k, k);
        } else {
            slice.copy_within(k..width, 0);
        }
        return;
    }

    if offset > 0 {
        for c in (k..width).rev() {
            row[c] = row[c - k];
        }
    } else {
        for c in 0..width - k {
            row[c] = row[c + k];
        }
    }
}
