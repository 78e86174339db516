use approx::assert_abs_diff_eq;
use deinterlace_core::error::DeinterlaceError;
use deinterlace_core::subsample::{std_projection, subsample_proxy};
use ndarray::{array, stack, Array3, Axis};

#[test]
fn test_population_std_f64() {
    let block = stack![
        Axis(0),
        array![[1.0, 5.0], [2.0, 0.0]],
        array![[3.0, 5.0], [6.0, 0.0]]
    ];
    let std = std_projection(block.view()).unwrap();
    assert_abs_diff_eq!(std[[0, 0]], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(std[[0, 1]], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(std[[1, 0]], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(std[[1, 1]], 0.0, epsilon = 1e-12);
}

#[test]
fn test_integer_std_truncates() {
    // Values 0 and 3: std = 1.5, cast to 1.
    let block = stack![Axis(0), array![[0u8, 10]], array![[3u8, 17]]];
    let std = std_projection(block.view()).unwrap();
    assert_eq!(std, array![[1u8, 3]]);
}

#[test]
fn test_single_frame_block_has_zero_spread() {
    let block = Array3::<u16>::from_elem((1, 3, 3), 500);
    let std = std_projection(block.view()).unwrap();
    assert!(std.iter().all(|&v| v == 0));
}

#[test]
fn test_empty_block_rejected() {
    let block = Array3::<f32>::zeros((0, 4, 4));
    assert!(matches!(
        std_projection(block.view()),
        Err(DeinterlaceError::InvalidBlockShape { frames: 0, .. })
    ));
}

#[test]
fn test_proxy_is_two_identical_frames() {
    let block = Array3::from_shape_fn((5, 4, 6), |(f, r, c)| (f * (r + 1) + c) as f32);
    let proxy = subsample_proxy(block.view()).unwrap();
    let projection = std_projection(block.view()).unwrap();

    assert_eq!(proxy.dim(), (2, 4, 6));
    assert_eq!(proxy.index_axis(Axis(0), 0), projection);
    assert_eq!(proxy.index_axis(Axis(0), 1), projection);
}
