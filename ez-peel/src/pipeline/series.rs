//! 时间序列: 以同一组参数逐帧执行单帧流程, 并按需保留各帧输出.

use log::{info, warn};
use ndarray::{s, Array3, Array4, Array5, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{run_frame, CancelToken, PeelParams, Stage, WorkBudget};
use crate::data::Hyperstack;
use crate::error::{PeelError, PeelResult};
use crate::preprocess::PreprocessParams;

/// 时间序列处理时保留哪些输出.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeepOutputs {
    /// 剥离后的超栈 (t, c, z, h, w).
    pub peel_stack: bool,

    /// 求和投影 (t, c, h, w).
    pub projection: bool,

    /// 标定高度图 (t, h, w).
    pub height_map: bool,

    /// 面积图 (t, h, w).
    pub area_map: bool,
}

impl Default for KeepOutputs {
    fn default() -> Self {
        Self {
            peel_stack: false,
            projection: true,
            height_map: false,
            area_map: false,
        }
    }
}

impl KeepOutputs {
    /// 保留项需要的总字节数.
    fn bytes(&self, stack: &Hyperstack) -> usize {
        let (t, c, z, h, w) = stack.shape();
        let plane = t * h * w * std::mem::size_of::<f32>();
        let mut total = 0;
        if self.peel_stack {
            total += c * z * plane;
        }
        if self.projection {
            total += c * plane;
        }
        if self.height_map {
            total += plane;
        }
        if self.area_map {
            total += plane;
        }
        total
    }
}

/// 时间序列输出. 未保留的项为 `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesOutput {
    /// 剥离后的超栈 (t, c, z, h, w).
    pub peeled: Option<Array5<f32>>,

    /// 高度图 (t, h, w).
    pub height_maps: Option<Array3<f32>>,

    /// 面积图 (t, h, w).
    pub area_maps: Option<Array3<f32>>,

    /// 求和投影 (t, c, h, w).
    pub projections: Option<Array4<f32>>,

    /// 每帧实际使用的阈值.
    pub thresholds: Vec<f64>,
}

/// 对超栈的每一帧执行 [`run_frame`].
///
/// 帧之间检查 `cancel`; 取消时丢弃已处理的全部帧并返回
/// `UserAbort { resume_at: Stage::Scan }`. 任一帧出错则整个序列失败.
pub fn run_series(
    stack: &Hyperstack,
    params: &PeelParams,
    keep: &KeepOutputs,
    budget: &WorkBudget,
    cancel: &CancelToken,
) -> PeelResult<SeriesOutput> {
    params.validate()?;
    let (t, c, z, h, w) = stack.shape();
    let _lease = budget.acquire("series", keep.bytes(stack), params.preprocess.bit_depth)?;

    let mut out = SeriesOutput {
        peeled: keep.peel_stack.then(|| Array5::zeros((t, c, z, h, w))),
        height_maps: keep.height_map.then(|| Array3::zeros((t, h, w))),
        area_maps: keep.area_map.then(|| Array3::zeros((t, h, w))),
        projections: keep.projection.then(|| Array4::zeros((t, c, h, w))),
        thresholds: Vec::with_capacity(t),
    };

    for frame in 0..t {
        if cancel.reset() {
            warn!("series cancelled at frame {frame}/{t}, partial output discarded");
            return Err(PeelError::UserAbort {
                resume_at: Stage::Scan,
            });
        }
        let params = PeelParams {
            preprocess: PreprocessParams {
                frame,
                ..params.preprocess
            },
            ..params.clone()
        };
        let result = run_frame(stack, frame, &params, budget, cancel).map_err(|e| match e {
            PeelError::UserAbort { .. } => PeelError::UserAbort {
                resume_at: Stage::Scan,
            },
            e => e,
        })?;

        if let Some(peeled) = out.peeled.as_mut() {
            peeled.index_axis_mut(Axis(0), frame).assign(&result.peeled);
        }
        if let Some(maps) = out.height_maps.as_mut() {
            maps.slice_mut(s![frame, .., ..]).assign(&result.height_map.data());
        }
        if let Some(maps) = out.area_maps.as_mut() {
            maps.slice_mut(s![frame, .., ..]).assign(&result.area_map.data());
        }
        if let Some(proj) = out.projections.as_mut() {
            proj.index_axis_mut(Axis(0), frame).assign(&result.projection);
        }
        out.thresholds.push(result.threshold);
        info!("frame {}/{t} peeled (threshold {})", frame + 1, result.threshold);
    }
    Ok(out)
}
