//! 分割阈值.
//!
//! 扫描器判定 "越过阈值" 的条件是 `(v & mask) > t`, 所以这里求出的阈值
//! 都是背景类的上界: 严格大于它的像素即为前景.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::OTSU_BINS;
use crate::data::ReslicedStack;
use crate::error::{PeelError, PeelResult};

/// 阈值选取方式.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Threshold {
    /// 每帧对整个工作栈求 Otsu 阈值.
    #[default]
    Otsu,

    /// 固定阈值.
    Fixed(f64),
}

impl Threshold {
    /// 求出作用于 `stack` 的实际阈值.
    ///
    /// # 返回值
    ///
    /// `0 <= t <= stack.bit_depth().max_value()`. 固定阈值不满足该范围时返回
    /// `InvalidParameter`.
    pub fn resolve(&self, stack: &ReslicedStack) -> PeelResult<f64> {
        let max = stack.bit_depth().max_value() as f64;
        match *self {
            Threshold::Fixed(t) => {
                if t.is_finite() && (0.0..=max).contains(&t) {
                    Ok(t)
                } else {
                    Err(PeelError::invalid(
                        "threshold",
                        format!("{t} is outside 0..={max}"),
                    ))
                }
            }
            Threshold::Otsu => Ok(otsu(stack).min(max)),
        }
    }
}

/// 工作栈的 [`OTSU_BINS`] 分箱直方图, 覆盖 `0..=max_value`.
///
/// 返回 (直方图, 分箱宽度).
pub fn histogram(stack: &ReslicedStack) -> (Vec<u64>, f64) {
    let bd = stack.bit_depth();
    let max = stack.max_value().max(0) as f64;
    let bin_width = ((max + 1.0) / OTSU_BINS as f64).max(1.0);
    let mut hist = vec![0u64; OTSU_BINS];
    for v in stack.data().iter() {
        let bin = ((bd.apply(*v) as f64) / bin_width) as usize;
        hist[bin.min(OTSU_BINS - 1)] += 1;
    }
    (hist, bin_width)
}

/// Otsu 分割: 最大化类间方差的分箱下标. 若有多个最大值, 取最小下标.
pub fn otsu_level(hist: &[u64]) -> usize {
    let total: f64 = hist.iter().map(|c| *c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, c)| i as f64 * *c as f64)
        .sum();

    let (mut w_bg, mut sum_bg) = (0.0, 0.0);
    let (mut best, mut best_var) = (0usize, -1.0f64);
    for (t, &count) in hist.iter().enumerate() {
        w_bg += count as f64;
        sum_bg += t as f64 * count as f64;
        let w_fg = total - w_bg;
        if w_bg == 0.0 || w_fg == 0.0 {
            continue;
        }
        let mean_bg = sum_bg / w_bg;
        let mean_fg = (sum_total - sum_bg) / w_fg;
        let var = w_bg * w_fg * (mean_bg - mean_fg).powi(2);
        if var > best_var {
            best_var = var;
            best = t;
        }
    }
    best
}

/// 工作栈的 Otsu 阈值: 背景类最后一个分箱的上界 (整数).
pub fn otsu(stack: &ReslicedStack) -> f64 {
    let (hist, bin_width) = histogram(stack);
    let level = otsu_level(&hist);
    (((level + 1) as f64) * bin_width).ceil() - 1.0
}
