//! 二维卷积核与边缘增强.

use ndarray::{Array2, ArrayView2, ArrayViewMut2, ArrayViewMut3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::StackTransform;

/// 任意尺寸的二维卷积核, 以相关方式作用 (不翻转), 中心位于 `(rows / 2, cols / 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    rows: usize,
    cols: usize,
    taps: Vec<f64>,
}

impl Kernel {
    /// 以行优先的系数构建卷积核. 若 `normalize` 为 `true` 且系数和非零,
    /// 则所有系数除以系数和.
    ///
    /// 行列数必须为正奇数且与系数个数一致, 否则返回 `None`.
    pub fn new(rows: usize, cols: usize, taps: &[f64], normalize: bool) -> Option<Self> {
        if rows % 2 == 0 || cols % 2 == 0 || rows * cols != taps.len() {
            return None;
        }
        let sum: f64 = taps.iter().sum();
        let scale = if normalize && sum != 0.0 { 1.0 / sum } else { 1.0 };
        Some(Self {
            rows,
            cols,
            taps: taps.iter().map(|t| t * scale).collect(),
        })
    }

    /// 卷积核尺寸 (行, 列).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// 对 `image` 求相关, 越界位置取最近的边缘像素.
    pub fn correlate(&self, image: ArrayView2<f32>) -> Array2<f32> {
        let (h, w) = image.dim();
        let (rc, cc) = (self.rows / 2, self.cols / 2);
        Array2::from_shape_fn((h, w), |(y, x)| {
            let mut acc = 0.0f64;
            for dy in 0..self.rows {
                let sy = (y + dy).saturating_sub(rc).min(h - 1);
                for dx in 0..self.cols {
                    let sx = (x + dx).saturating_sub(cc).min(w - 1);
                    acc += self.taps[dy * self.cols + dx] * image[(sy, sx)] as f64;
                }
            }
            acc as f32
        })
    }
}

/// 重切片后使用的边缘增强方式. 核的行方向即深度方向.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeFilter {
    /// 不做边缘增强.
    #[default]
    None,

    /// 3x3 Sobel 梯度幅值.
    Sobel2d,

    /// 仅深度方向的 3x3 Sobel.
    Sobel1d,

    /// 1x3 梯度.
    Gradient1x3,

    /// 3x3 Laplace.
    Laplace,

    /// 1x7 梯度.
    Gradient1x7,

    /// 3x7 梯度.
    Gradient3x7,

    /// 1x7 墨西哥帽.
    MexicanHat1d,
}

const SOBEL_Y: [f64; 9] = [1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0];
const SOBEL_X: [f64; 9] = [1.0, 0.0, -1.0, 2.0, 0.0, -2.0, 1.0, 0.0, -1.0];

impl EdgeFilter {
    /// 对应的单个卷积核. `None` 与 `Sobel2d` 没有单核表示.
    pub fn kernel(&self) -> Option<Kernel> {
        let k = |rows: usize, cols: usize, taps: &[f64]| Kernel::new(rows, cols, taps, true);
        match self {
            EdgeFilter::None | EdgeFilter::Sobel2d => None,
            EdgeFilter::Sobel1d => k(3, 3, &SOBEL_Y),
            EdgeFilter::Gradient1x3 => k(3, 1, &[1.0, 0.0, -1.0]),
            EdgeFilter::Laplace => k(3, 3, &[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0]),
            EdgeFilter::Gradient1x7 => k(7, 1, &[1.0, 1.0, 1.0, 0.0, -1.0, -1.0, -1.0]),
            EdgeFilter::Gradient3x7 => k(
                7,
                3,
                &[
                    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, -1.0, -1.0,
                    -1.0, -1.0, -1.0, -1.0, -1.0, -1.0,
                ],
            ),
            EdgeFilter::MexicanHat1d => k(7, 1, &[-1.0, -2.0, 1.0, 4.0, 1.0, -2.0, -1.0]),
        }
    }

    /// 对单个二维切片做边缘增强, 结果覆写原切片.
    pub fn apply_2d(&self, mut image: ArrayViewMut2<f32>) {
        if image.is_empty() {
            return;
        }
        match self {
            EdgeFilter::None => {}
            EdgeFilter::Sobel2d => {
                // 固定的 3x3 核, 不会构建失败.
                let (Some(ky), Some(kx)) = (
                    Kernel::new(3, 3, &SOBEL_Y, false),
                    Kernel::new(3, 3, &SOBEL_X, false),
                ) else {
                    return;
                };
                let gy = ky.correlate(image.view());
                let gx = kx.correlate(image.view());
                ndarray::Zip::from(&mut image)
                    .and(&gy)
                    .and(&gx)
                    .for_each(|o, &a, &b| *o = (a * a + b * b).sqrt());
            }
            other => {
                if let Some(k) = other.kernel() {
                    let out = k.correlate(image.view());
                    image.assign(&out);
                }
            }
        }
    }
}

/// 作用于 (切片, 深度, 宽) 工作栈, 逐切片处理.
impl StackTransform for EdgeFilter {
    fn apply(&self, mut stack: ArrayViewMut3<f32>) {
        if matches!(self, EdgeFilter::None) {
            return;
        }
        for plane in stack.axis_iter_mut(Axis(0)) {
            self.apply_2d(plane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_kernel_shape_validation() {
        assert!(Kernel::new(2, 1, &[1.0, 1.0], true).is_none());
        assert!(Kernel::new(3, 1, &[1.0, 1.0], true).is_none());
        let k = Kernel::new(3, 1, &[1.0, 2.0, 1.0], true).unwrap();
        assert_eq!(k.shape(), (3, 1));
    }

    #[test]
    fn test_normalized_box_keeps_constant() {
        let k = Kernel::new(3, 3, &[1.0; 9], true).unwrap();
        let img = Array2::<f32>::from_elem((4, 5), 2.0);
        let out = k.correlate(img.view());
        assert!(out.iter().all(|v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_gradient_1x3_on_step() {
        // 深度方向 0 -> 10 的阶跃.
        let mut img = array![[0.0f32], [0.0], [10.0], [10.0]];
        EdgeFilter::Gradient1x3.apply_2d(img.view_mut());
        // out(y) = in(y - 1) - in(y + 1)
        assert_eq!(img, array![[0.0f32], [-10.0], [-10.0], [0.0]]);
    }

    #[test]
    fn test_sobel_2d_flat_is_zero() {
        let mut img = Array2::<f32>::from_elem((5, 5), 7.0);
        EdgeFilter::Sobel2d.apply_2d(img.view_mut());
        assert!(img.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_edge_kernels_exist() {
        for f in [
            EdgeFilter::Sobel1d,
            EdgeFilter::Gradient1x3,
            EdgeFilter::Laplace,
            EdgeFilter::Gradient1x7,
            EdgeFilter::Gradient3x7,
            EdgeFilter::MexicanHat1d,
        ] {
            assert!(f.kernel().is_some(), "{f:?}");
        }
        assert!(EdgeFilter::None.kernel().is_none());
    }
}
