//! 剥离掩膜的光栅化.
//!
//! 掩膜先在重切片方向 (切片, 深度, 列) 上逐切片生成, 然后转回原始的 (z, h, w) 方向,
//! 以便直接与原始帧逐体素相乘.

mod erode;
mod polygon;

use log::{debug, warn};
use ndarray::{Array3, Array4, ArrayView1, ArrayView3, ArrayView4, ArrayViewMut2, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::mask::{is_inside, INSIDE, OUTSIDE};
use crate::error::{PeelError, PeelResult};
use crate::filter::blur_planes;
use crate::scan::HeightProfile;
use crate::Idx3d;

pub use erode::{erode_ellipsoid, Radii};
pub use polygon::Polygon;

/// 掩膜生成方式.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskMode {
    /// 在每个深度切片上填充 `[h + offset, h + offset + thickness)` 的多边形.
    #[default]
    Polygon,

    /// 将表面以下整体填满, 再做两次椭球腐蚀并相减, 得到固定厚度的壳.
    ///
    /// # 注意
    ///
    /// 负的偏移或厚度会被当作 0 处理 (并输出警告), 与交互式工具中的已知问题保持一致.
    Erode {
        /// 切片方向与列方向的偏移半径.
        xz_offset: i32,

        /// 切片方向与列方向的厚度半径.
        xz_thickness: i32,
    },
}

/// 掩膜参数.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskParams {
    /// 深度方向偏移, 可以为负.
    pub depth_offset: i32,

    /// 深度方向厚度.
    pub thickness: i32,

    /// 生成方式.
    pub mode: MaskMode,

    /// 对每个 z 切片做二维高斯模糊的 sigma, 以减弱台阶状伪影. `None` 表示不模糊.
    pub smoothing: Option<f64>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            depth_offset: 0,
            thickness: 10,
            mode: MaskMode::Polygon,
            smoothing: Some(1.0),
        }
    }
}

impl MaskParams {
    /// 参数合法性检查.
    pub fn validate(&self) -> PeelResult<()> {
        if self.thickness < 0 {
            return Err(PeelError::invalid(
                "thickness",
                format!("{} is negative", self.thickness),
            ));
        }
        if let Some(sigma) = self.smoothing {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(PeelError::invalid(
                    "smoothing",
                    format!("{sigma} must be positive"),
                ));
            }
        }
        Ok(())
    }
}

/// 与原始帧同方向 (z, h, w) 的掩膜体. 内部为 1, 外部为 0, 模糊后可取中间值.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskVolume {
    data: Array3<f32>,
}

impl MaskVolume {
    /// 由修正后的高度图生成掩膜.
    pub fn build(profile: &HeightProfile, params: &MaskParams) -> PeelResult<Self> {
        params.validate()?;
        let (n, width) = profile.shape();
        let depth = profile.depth();

        // (切片, 深度, 列)
        let resliced = match params.mode {
            MaskMode::Polygon => {
                let offset = params.depth_offset as f64;
                let thickness = params.thickness as f64;
                let mut data = Array3::from_elem((n, depth, width), OUTSIDE);
                cfg_if::cfg_if! {
                    if #[cfg(feature = "rayon")] {
                        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
                        data.axis_iter_mut(Axis(0))
                            .into_par_iter()
                            .enumerate()
                            .for_each(|(s, mut plane)| {
                                fill_band(profile.row(s), offset, thickness, &mut plane);
                            });
                    } else {
                        for (s, mut plane) in data.axis_iter_mut(Axis(0)).enumerate() {
                            fill_band(profile.row(s), offset, thickness, &mut plane);
                        }
                    }
                }
                data
            }
            MaskMode::Erode {
                xz_offset,
                xz_thickness,
            } => {
                let mut filled = Array3::from_elem((n, depth, width), OUTSIDE);
                for (s, mut plane) in filled.axis_iter_mut(Axis(0)).enumerate() {
                    let heights = profile.row(s);
                    Polygon::to_bottom(heights.iter().map(|h| *h as f64), 1.0, depth as f64)
                        .fill(&mut plane, INSIDE);
                }
                let filled = filled.mapv(is_inside);
                let first = (
                    radius("xz_offset", xz_offset),
                    radius("depth_offset", params.depth_offset),
                    radius("xz_offset", xz_offset),
                );
                let second = (
                    radius("xz_thickness", xz_thickness),
                    radius("thickness", params.thickness),
                    radius("xz_thickness", xz_thickness),
                );
                let once = erode_ellipsoid(filled.view(), first);
                let twice = erode_ellipsoid(once.view(), second);
                ndarray::Zip::from(&once)
                    .and(&twice)
                    .map_collect(|&a, &b| if a && !b { INSIDE } else { OUTSIDE })
            }
        };

        let mut data = resliced
            .permuted_axes([1, 0, 2])
            .as_standard_layout()
            .into_owned();
        if let Some(sigma) = params.smoothing {
            blur_planes(data.view_mut(), sigma);
        }
        let mask = Self { data };
        debug!(
            "mask {:?} built: {} voxels inside ({:?})",
            mask.shape(),
            mask.count_inside(),
            params.mode
        );
        Ok(mask)
    }

    /// 直接以 (z, h, w) 数据创建.
    #[inline]
    pub fn from_raw(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// (z, h, w) 形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<f32> {
        self.data.view()
    }

    /// 值大于 0 的体素个数.
    pub fn count_inside(&self) -> usize {
        self.data.iter().filter(|v| is_inside(**v)).count()
    }

    /// 将掩膜广播到 (c, z, h, w) 帧的每个通道并逐体素相乘.
    ///
    /// # 返回值
    ///
    /// 剥离后的帧. 若帧的 (z, h, w) 与掩膜不一致, 返回 `ShapeMismatch`.
    pub fn apply(&self, frame: ArrayView4<f32>) -> PeelResult<Array4<f32>> {
        let (_, z, h, w) = frame.dim();
        if (z, h, w) != self.shape() {
            let (mz, mh, mw) = self.shape();
            return Err(PeelError::ShapeMismatch {
                expected: vec![mz, mh, mw],
                found: vec![z, h, w],
            });
        }
        let mut out = frame.to_owned();
        for mut channel in out.axis_iter_mut(Axis(0)) {
            channel *= &self.data;
        }
        Ok(out)
    }
}

/// 对剥离后的 (c, z, h, w) 帧沿 z 求和, 得到 (c, h, w) 投影.
#[inline]
pub fn sum_projection(peeled: ArrayView4<f32>) -> Array3<f32> {
    peeled.sum_axis(Axis(1))
}

fn fill_band(heights: ArrayView1<f32>, offset: f64, thickness: f64, plane: &mut ArrayViewMut2<f32>) {
    Polygon::band(heights.iter().map(|h| *h as f64), offset, thickness).fill(plane, INSIDE);
}

/// 椭球半径. 负值按 0 处理.
fn radius(name: &str, value: i32) -> usize {
    if value < 0 {
        warn!("erode mask: negative {name} {value} treated as 0");
    }
    value.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn flat_profile(h: f32, slices: usize, width: usize, depth: usize) -> HeightProfile {
        HeightProfile::new(Array2::from_elem((slices, width), h), depth).unwrap()
    }

    /// 第 `s` 个切片第 `x` 列中位于掩膜内的深度.
    fn inside_depths(mask: &MaskVolume, s: usize, x: usize) -> Vec<usize> {
        let (z, _, _) = mask.shape();
        (0..z).filter(|d| mask.data()[(*d, s, x)] == INSIDE).collect()
    }

    #[test]
    fn test_polygon_flat_offset_thickness() {
        let profile = flat_profile(10.0, 3, 8, 30);
        let params = MaskParams {
            depth_offset: 2,
            thickness: 5,
            smoothing: None,
            ..Default::default()
        };
        let mask = MaskVolume::build(&profile, &params).unwrap();
        assert_eq!(mask.shape(), (30, 3, 8));
        for s in 0..3 {
            for x in 0..8 {
                assert_eq!(inside_depths(&mask, s, x), (12..=16).collect::<Vec<_>>());
            }
        }
        assert_eq!(mask.count_inside(), 5 * 3 * 8);
    }

    #[test]
    fn test_polygon_round_trip_thickness() {
        for t in [1, 4, 9] {
            let profile = flat_profile(6.0, 2, 5, 20);
            let params = MaskParams {
                thickness: t,
                smoothing: None,
                ..Default::default()
            };
            let mask = MaskVolume::build(&profile, &params).unwrap();
            for x in 0..5 {
                assert_eq!(inside_depths(&mask, 1, x).len(), t as usize);
            }
        }
    }

    #[test]
    fn test_erode_shell_thickness() {
        let profile = flat_profile(5.0, 4, 6, 30);
        let params = MaskParams {
            depth_offset: 2,
            thickness: 4,
            mode: MaskMode::Erode {
                xz_offset: 1,
                xz_thickness: 1,
            },
            smoothing: None,
        };
        let mask = MaskVolume::build(&profile, &params).unwrap();
        for s in 0..4 {
            for x in 0..6 {
                assert_eq!(inside_depths(&mask, s, x), (8..=11).collect::<Vec<_>>());
            }
        }
    }

    /// 负偏移与偏移 0 的结果相同. 这是已知的局限.
    #[test]
    fn test_erode_negative_offset_behaves_like_zero() {
        let profile = flat_profile(5.0, 2, 4, 30);
        let erode = MaskMode::Erode {
            xz_offset: -2,
            xz_thickness: 0,
        };
        let negative = MaskParams {
            depth_offset: -3,
            thickness: 4,
            mode: erode,
            smoothing: None,
        };
        let zero = MaskParams {
            depth_offset: 0,
            mode: MaskMode::Erode {
                xz_offset: 0,
                xz_thickness: 0,
            },
            ..negative
        };
        let a = MaskVolume::build(&profile, &negative).unwrap();
        let b = MaskVolume::build(&profile, &zero).unwrap();
        assert_eq!(a, b);
        assert_eq!(inside_depths(&a, 0, 0), (6..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_smoothing_softens_edges() {
        let profile = flat_profile(4.0, 6, 6, 12);
        let mut heights = profile.into_inner();
        heights[(3, 3)] = 8.0;
        let profile = HeightProfile::new(heights, 12).unwrap();
        let params = MaskParams {
            thickness: 2,
            ..Default::default()
        };
        let mask = MaskVolume::build(&profile, &params).unwrap();
        assert!(mask.data().iter().all(|v| (0.0..=1.0 + 1e-5).contains(v)));
        assert!(mask.data().iter().any(|v| *v > 0.0 && *v < 1.0));
    }

    #[test]
    fn test_apply_broadcasts_channels() {
        let profile = flat_profile(1.0, 2, 2, 4);
        let params = MaskParams {
            thickness: 1,
            smoothing: None,
            ..Default::default()
        };
        let mask = MaskVolume::build(&profile, &params).unwrap();
        let frame = Array4::from_elem((3, 4, 2, 2), 2.0f32);
        let peeled = mask.apply(frame.view()).unwrap();
        assert_eq!(peeled[(2, 1, 0, 1)], 2.0);
        assert_eq!(peeled[(2, 2, 0, 1)], 0.0);

        let proj = sum_projection(peeled.view());
        assert_eq!(proj.dim(), (3, 2, 2));
        assert!(proj.iter().all(|v| *v == 2.0));

        let wrong = Array4::<f32>::zeros((1, 5, 2, 2));
        assert!(matches!(
            mask.apply(wrong.view()),
            Err(PeelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_negative_thickness_rejected() {
        let params = MaskParams {
            thickness: -1,
            ..Default::default()
        };
        assert!(MaskVolume::build(&flat_profile(1.0, 1, 1, 2), &params).is_err());
    }
}
