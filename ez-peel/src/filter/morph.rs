//! 二维二值形态学.

use ndarray::{Array2, ArrayView2};

use crate::data::slice::PosIter;

/// 以 3x3 方形结构元做一次二值腐蚀 (最小值滤波).
///
/// 只考虑图像范围内的邻居, 所以贴边的前景不会因越界而被腐蚀.
pub fn erode_3x3(image: ArrayView2<bool>) -> Array2<bool> {
    let (h, w) = image.dim();
    let mut out = Array2::from_elem((h, w), false);
    for (y, x) in PosIter::new((h, w)) {
        if !image[(y, x)] {
            continue;
        }
        let ys = y.saturating_sub(1)..=(y + 1).min(h - 1);
        out[(y, x)] = ys.into_iter().all(|ny| {
            (x.saturating_sub(1)..=(x + 1).min(w - 1)).all(|nx| image[(ny, nx)])
        });
    }
    out
}

/// 连续腐蚀 `times` 次.
pub fn erode_n(image: ArrayView2<bool>, times: u32) -> Array2<bool> {
    let mut cur = image.to_owned();
    for _ in 0..times {
        cur = erode_3x3(cur.view());
    }
    cur
}
