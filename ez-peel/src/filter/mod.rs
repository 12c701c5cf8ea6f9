//! 栈滤波: 预处理平滑, 边缘增强, 二维形态学.
//!
//! 流程只通过 [`StackTransform`] 使用这些滤波器, 因此可以替换为任意外部实现.

mod convolve;
pub mod gaussian;
mod morph;

use ndarray::ArrayViewMut3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use convolve::{EdgeFilter, Kernel};
pub use gaussian::{blur_2d, blur_3d, blur_planes, gaussian_kernel};
pub use morph::{erode_3x3, erode_n};

/// 就地作用于整个三维栈的变换.
pub trait StackTransform {
    /// 处理 `stack`. 第 0 轴为切片方向.
    fn apply(&self, stack: ArrayViewMut3<f32>);
}

/// 预处理平滑方式. 作用于原始 (z, h, w) 方向.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Smoothing {
    /// 不做平滑.
    None,

    /// 每个 z 切片内做二维高斯模糊.
    Gaussian2d {
        /// 高斯 sigma, 以像素为单位.
        sigma: f64,
    },

    /// 三维高斯模糊.
    Gaussian3d {
        /// 高斯 sigma, 以体素为单位.
        sigma: f64,
    },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::Gaussian2d { sigma: 4.0 }
    }
}

impl Smoothing {
    /// sigma 合法性检查.
    pub fn is_valid(&self) -> bool {
        match self {
            Smoothing::None => true,
            Smoothing::Gaussian2d { sigma } | Smoothing::Gaussian3d { sigma } => {
                sigma.is_finite() && *sigma >= 0.0
            }
        }
    }
}

impl StackTransform for Smoothing {
    fn apply(&self, stack: ArrayViewMut3<f32>) {
        match *self {
            Smoothing::None => {}
            Smoothing::Gaussian2d { sigma } => blur_planes(stack, sigma),
            Smoothing::Gaussian3d { sigma } => blur_3d(stack, sigma),
        }
    }
}
