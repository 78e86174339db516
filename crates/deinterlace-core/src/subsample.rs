use ndarray::{Array2, Array3, ArrayView3, Axis};
use num_traits::NumCast;

use crate::consts::SUBSAMPLE_PROXY_FRAMES;
use crate::error::{DeinterlaceError, Result};
use crate::frame::Pixel;

/// Per-pixel population standard deviation across the frames of a block,
/// cast back to the block's pixel type.
///
/// Integer types truncate toward zero, matching a plain numeric cast.
pub fn std_projection<T: Pixel>(block: ArrayView3<'_, T>) -> Result<Array2<T>> {
    let (frames, rows, cols) = block.dim();
    if frames == 0 {
        return Err(DeinterlaceError::InvalidBlockShape {
            frames,
            rows,
            cols,
            reason: "block has no frames",
        });
    }

    let n = frames as f64;
    let mut sum = Array2::<f64>::zeros((rows, cols));
    for frame in block.axis_iter(Axis(0)) {
        sum.zip_mut_with(&frame, |s, &v| *s += v.as_f64());
    }
    let mean = sum / n;

    let mut sq_dev = Array2::<f64>::zeros((rows, cols));
    for frame in block.axis_iter(Axis(0)) {
        ndarray::Zip::from(&mut sq_dev)
            .and(&mean)
            .and(&frame)
            .for_each(|acc, &m, &v| {
                let d = v.as_f64() - m;
                *acc += d * d;
            });
    }

    let mut out = Array2::<T>::default((rows, cols));
    for (dst, &acc) in out.iter_mut().zip(sq_dev.iter()) {
        let std = (acc / n).sqrt();
        *dst = <T as NumCast>::from(std).ok_or(DeinterlaceError::PixelCast(std))?;
    }
    Ok(out)
}

/// Build the synthetic stack the estimator runs on when subsampling: the
/// standard-deviation frame repeated [`SUBSAMPLE_PROXY_FRAMES`] times.
///
/// The proxy is scratch input for estimation only; the offset it yields is
/// applied to the original frames.
pub fn subsample_proxy<T: Pixel>(block: ArrayView3<'_, T>) -> Result<Array3<T>> {
    let projection = std_projection(block)?;
    let (rows, cols) = projection.dim();
    let proxy = projection
        .insert_axis(Axis(0))
        .broadcast((SUBSAMPLE_PROXY_FRAMES, rows, cols))
        .map(|view| view.to_owned())
        .ok_or(DeinterlaceError::InvalidBlockShape {
            frames: SUBSAMPLE_PROXY_FRAMES,
            rows,
            cols,
            reason: "cannot replicate projection",
        })?;
    Ok(proxy)
}
