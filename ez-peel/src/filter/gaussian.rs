//! 可分离高斯模糊. 边界按复制边缘像素处理.

use ndarray::{ArrayViewMut, ArrayViewMut1, ArrayViewMut2, ArrayViewMut3, Axis, Dimension};

use crate::consts::GAUSSIAN_ACCURACY;

/// 高斯核半径: `ceil(sigma * sqrt(-2 ln(accuracy)))`.
#[inline]
pub fn kernel_radius(sigma: f64) -> usize {
    (sigma * (-2.0 * GAUSSIAN_ACCURACY.ln()).sqrt()).ceil() as usize
}

/// 长度为 `2r + 1` 的归一化一维高斯核. `sigma <= 0` 时返回恒等核 `[1.0]`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let r = kernel_radius(sigma) as isize;
    let two_s2 = 2.0 * sigma * sigma;
    let mut k: Vec<f64> = (-r..=r)
        .map(|x| (-((x * x) as f64) / two_s2).exp())
        .collect();
    let sum: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// 对单条 lane 做一维相关运算, 越界位置取最近的边缘像素.
///
/// `buf` 为外部复用的缓冲区.
pub(crate) fn correlate_lane(mut lane: ArrayViewMut1<f32>, kernel: &[f64], buf: &mut Vec<f32>) {
    let n = lane.len();
    if n == 0 {
        return;
    }
    let r = kernel.len() / 2;
    let last = n - 1;
    buf.clear();
    buf.extend(lane.iter().copied());
    for (i, out) in lane.iter_mut().enumerate() {
        let acc: f64 = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * buf[(i + k).saturating_sub(r).min(last)] as f64)
            .sum();
        *out = acc as f32;
    }
}

/// 沿 `axis` 方向以 `sigma` 做高斯模糊.
pub fn blur_axis<D: Dimension>(mut data: ArrayViewMut<f32, D>, axis: Axis, sigma: f64) {
    if !(sigma > 0.0) || data.len_of(axis) < 2 {
        return;
    }
    let kernel = gaussian_kernel(sigma);
    let mut buf = Vec::with_capacity(data.len_of(axis));
    for lane in data.lanes_mut(axis) {
        correlate_lane(lane, &kernel, &mut buf);
    }
}

/// 二维各向同性高斯模糊.
#[inline]
pub fn blur_2d(mut image: ArrayViewMut2<f32>, sigma: f64) {
    blur_axis(image.view_mut(), Axis(0), sigma);
    blur_axis(image, Axis(1), sigma);
}

/// 对 (z, h, w) 栈的每个 z 切片做二维模糊.
pub fn blur_planes(mut stack: ArrayViewMut3<f32>, sigma: f64) {
    blur_axis(stack.view_mut(), Axis(1), sigma);
    blur_axis(stack, Axis(2), sigma);
}

/// 三维各向同性高斯模糊.
pub fn blur_3d(mut stack: ArrayViewMut3<f32>, sigma: f64) {
    blur_axis(stack.view_mut(), Axis(0), sigma);
    blur_planes(stack, sigma);
}
