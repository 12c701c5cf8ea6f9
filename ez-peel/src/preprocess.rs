//! 预处理: 选取通道, 量化, 平滑, 重切片, 边缘增强.

use log::debug;
use ndarray::{Array3, ArrayView3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::{BitDepth, Calibrated, Hyperstack, ReslicedStack};
use crate::error::{PeelError, PeelResult};
use crate::filter::{EdgeFilter, Smoothing, StackTransform};

/// 预处理参数.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreprocessParams {
    /// 用于分割的通道 (从 0 开始).
    pub channel: usize,

    /// 帧 (从 0 开始). 时间序列处理时会被逐帧覆盖.
    pub frame: usize,

    /// 量化位深.
    pub bit_depth: BitDepth,

    /// 重切片前的平滑.
    pub smoothing: Smoothing,

    /// 重切片后的边缘增强.
    pub edge: EdgeFilter,
}

impl PreprocessParams {
    /// 参数合法性检查. 通道、帧是否越界要等拿到超栈后才能判断.
    pub fn validate(&self) -> PeelResult<()> {
        if !self.smoothing.is_valid() {
            return Err(PeelError::invalid(
                "smoothing",
                format!("{:?} has an invalid sigma", self.smoothing),
            ));
        }
        Ok(())
    }
}

/// 将体数据量化到 `bit_depth`, 仍以 `f32` 保存.
///
/// 8-bit 时把 `[min, max]` 线性拉伸到 `[0, 255]`; 16-bit 时仅舍入并截断.
pub fn quantize(volume: ArrayView3<f32>, bit_depth: BitDepth) -> Array3<f32> {
    match bit_depth {
        BitDepth::Eight => {
            let (min, max) = volume
                .iter()
                .filter(|v| v.is_finite())
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                });
            let scale = if max > min {
                bit_depth.max_value() as f32 / (max - min)
            } else {
                0.0
            };
            volume.mapv(|v| bit_depth.clamp((v - min) * scale) as f32)
        }
        BitDepth::Sixteen => volume.mapv(|v| bit_depth.clamp(v) as f32),
    }
}

/// 单帧体数据的工作内存估计 (字节): 量化后的浮点栈加上整数工作栈.
#[inline]
pub fn working_bytes(stack: &Hyperstack) -> usize {
    let (z, h, w) = stack.volume_shape();
    z * h * w * (std::mem::size_of::<f32>() + std::mem::size_of::<i32>())
}

/// 由超栈生成分割用的工作栈.
///
/// # 返回值
///
/// (切片 = 原 h, 深度 = 原 z, 列 = 原 w) 组织的工作栈.
/// 帧或通道越界时返回 `IndexOutOfRange`.
pub fn preprocess(stack: &Hyperstack, params: &PreprocessParams) -> PeelResult<ReslicedStack> {
    params.validate()?;
    let volume = stack.channel(params.frame, params.channel)?;
    let bit_depth = params.bit_depth;

    let mut quantized = quantize(volume, bit_depth);
    params.smoothing.apply(quantized.view_mut());
    // 边缘核的行方向是深度, 所以在重切片方向上处理.
    params
        .edge
        .apply(quantized.view_mut().permuted_axes([1, 0, 2]));

    let resliced = ReslicedStack::reslice(quantized.view(), bit_depth, *stack.calibration());
    debug!(
        "frame {} channel {}: resliced to {:?} at {:?}",
        params.frame,
        params.channel,
        resliced.shape(),
        bit_depth
    );
    Ok(resliced)
}
