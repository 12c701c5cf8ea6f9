//! 三维椭球最小值滤波.

use ndarray::{Array3, ArrayView3, Axis};

use crate::Idx3d;

/// 三个轴向上的椭球半径, 顺序同数据轴 (切片, 深度, 列).
pub type Radii = (usize, usize, usize);

/// 椭球结构元内的所有偏移 (含中心).
///
/// 半径为 0 的轴向没有延伸.
fn ellipsoid_offsets((rs, rd, rw): Radii) -> Vec<(isize, isize, isize)> {
    let term = |d: isize, r: usize| {
        if r == 0 {
            0.0
        } else {
            (d as f64 / r as f64).powi(2)
        }
    };
    let span = |r: usize| -(r as isize)..=(r as isize);
    let mut offsets = Vec::new();
    for ds in span(rs) {
        for dd in span(rd) {
            for dw in span(rw) {
                if term(ds, rs) + term(dd, rd) + term(dw, rw) <= 1.0 {
                    offsets.push((ds, dd, dw));
                }
            }
        }
    }
    offsets
}

#[inline]
fn shifted((s, d, w): Idx3d, (ds, dd, dw): (isize, isize, isize), (n, h, m): Idx3d) -> Option<Idx3d> {
    let s = s.checked_add_signed(ds).filter(|v| *v < n)?;
    let d = d.checked_add_signed(dd).filter(|v| *v < h)?;
    let w = w.checked_add_signed(dw).filter(|v| *v < m)?;
    Some((s, d, w))
}

/// 二值椭球腐蚀: 体素保留当且仅当结构元内所有 **位于数据范围内** 的邻居都为前景.
///
/// 越界的邻居被忽略, 所以贴边的前景不会被腐蚀.
pub fn erode_ellipsoid(volume: ArrayView3<bool>, radii: Radii) -> Array3<bool> {
    let shape = volume.dim();
    let offsets = ellipsoid_offsets(radii);
    let keep = |pos: Idx3d| {
        volume[pos]
            && offsets
                .iter()
                .filter_map(|o| shifted(pos, *o, shape))
                .all(|p| volume[p])
    };

    let mut out = Array3::from_elem(shape, false);
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(s, mut plane)| {
                    for ((d, w), v) in plane.indexed_iter_mut() {
                        *v = keep((s, d, w));
                    }
                });
        } else {
            for (s, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
                for ((d, w), v) in plane.indexed_iter_mut() {
                    *v = keep((s, d, w));
                }
            }
        }
    }
    out
}
