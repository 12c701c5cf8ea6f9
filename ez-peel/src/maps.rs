//! 标定高度图与面积图.

use ndarray::{Array2, ArrayView2};

use crate::data::{Calibrated, Calibration};
use crate::scan::HeightProfile;

/// 标定高度图: 逐列高度乘以深度方向间距, 形状为 (切片, 列).
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    calibration: Calibration,
    data: Array2<f32>,
}

impl Calibrated for HeightMap {
    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}

impl HeightMap {
    /// 由修正后的高度图构建.
    pub fn from_profile(profile: &HeightProfile, calibration: &Calibration) -> Self {
        let depth = calibration.pixel_depth as f32;
        Self {
            calibration: *calibration,
            data: profile.data().mapv(|h| h * depth),
        }
    }

    /// 由已经标定好的数据直接构建.
    #[inline]
    pub fn from_raw(data: Array2<f32>, calibration: Calibration) -> Self {
        Self { calibration, data }
    }

    /// (切片数, 列数).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }
}

/// 面积图: 每个像素对应的表面实际面积.
///
/// 对每个像素求上、下、左、右四条边长 `sqrt(dh^2 + s^2)`,
/// 取值为 `0.5 * (下 * 右 + 上 * 左)`. 平坦表面恰好得到 `x_scale * y_scale`,
/// 任意坡度都只会使其增大.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaMap {
    data: Array2<f32>,
}

impl AreaMap {
    /// 以高度图的标定计算面积图.
    #[inline]
    pub fn from_calibrated(height_map: &HeightMap) -> Self {
        Self::from_height_map(height_map, height_map.pixel_width(), height_map.pixel_height())
    }

    /// 以给定的 x, y 方向像素间距计算面积图.
    ///
    /// # 注意
    ///
    /// 越界的邻居按复制边缘处理, 即该方向高度差为 0.
    pub fn from_height_map(height_map: &HeightMap, x_scale: f64, y_scale: f64) -> Self {
        let (sx2, sy2) = (x_scale * x_scale, y_scale * y_scale);
        let d = height_map.data();
        let (h, w) = d.dim();
        let at = |y: usize, x: usize| d[(y, x)] as f64;

        let mut data = Array2::<f32>::zeros((h, w));
        for ((y, x), out) in data.indexed_iter_mut() {
            let c = at(y, x);
            let down = c - at((y + 1).min(h - 1), x);
            let up = c - at(y.saturating_sub(1), x);
            let right = c - at(y, (x + 1).min(w - 1));
            let left = c - at(y, x.saturating_sub(1));

            let [down, up, right, left] = [(down, sy2), (up, sy2), (right, sx2), (left, sx2)]
                .map(|(dh, s2)| (dh * dh + s2).sqrt());
            *out = (0.5 * (down * right + up * left)) as f32;
        }
        Self { data }
    }

    /// (切片数, 列数).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }
}
