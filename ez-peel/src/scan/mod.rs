//! 逐列阈值扫描.
//!
//! 每个深度切片的每一列自起始深度向下扫描, 记录第一个越过阈值的深度.
//! 扫描本身是纯函数, 返回 `Option` 序列; 之后由已解析的列构建折线,
//! 空缺列的高度在稠密化时由相邻顶点线性插值得到.

mod polyline;

use log::{debug, warn};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_INTERPOLATION_INTERVAL;
use crate::data::{BitDepth, DepthSlice, ReslicedStack};
use crate::error::{PeelError, PeelResult};
use crate::threshold::Threshold;

pub use polyline::Polyline;

/// 折线插值参数.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interpolation {
    /// 相邻顶点沿折线的距离, 以像素为单位.
    pub interval: f64,

    /// 重采样前是否做三点平滑.
    pub smooth: bool,
}

impl Default for Interpolation {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERPOLATION_INTERVAL,
            smooth: true,
        }
    }
}

/// 扫描参数.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanParams {
    /// 阈值选取方式.
    pub threshold: Threshold,

    /// 起始深度. 此前的层被忽略.
    pub start_depth: usize,

    /// 可选的折线插值.
    pub interpolation: Option<Interpolation>,
}

impl ScanParams {
    /// 参数合法性检查.
    pub fn validate(&self) -> PeelResult<()> {
        if let Threshold::Fixed(t) = self.threshold {
            if !(t.is_finite() && t >= 0.0) {
                return Err(PeelError::invalid("threshold", format!("{t} is negative")));
            }
        }
        if let Some(i) = self.interpolation {
            if !(i.interval.is_finite() && i.interval > 0.0) {
                return Err(PeelError::invalid(
                    "interpolation.interval",
                    format!("{} must be positive", i.interval),
                ));
            }
        }
        Ok(())
    }
}

/// 逐列表面高度, 按 (切片, 列) 组织. 每个值都在 `[0, depth]` 内.
///
/// 扫描、修正两个阶段各自产出新的 `HeightProfile`, 不会就地修改上游结果.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightProfile {
    data: Array2<f32>,
    depth: usize,
}

impl HeightProfile {
    /// 直接创建. `data` 中任一值不在 `[0, depth]` 内 (或非有限) 时返回 `Err`.
    pub fn new(data: Array2<f32>, depth: usize) -> PeelResult<Self> {
        let limit = depth as f32;
        if let Some(v) = data
            .iter()
            .find(|v| !(v.is_finite() && (0.0..=limit).contains(*v)))
        {
            return Err(PeelError::invalid(
                "heights",
                format!("{v} is outside 0..={depth}"),
            ));
        }
        Ok(Self { data, depth })
    }

    /// 由已知合法的数据创建.
    #[inline]
    pub(crate) fn from_valid(data: Array2<f32>, depth: usize) -> Self {
        debug_assert!(data.iter().all(|v| (0.0..=depth as f32).contains(v)));
        Self { data, depth }
    }

    /// (切片数, 列数).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 切片数.
    #[inline]
    pub fn n_slices(&self) -> usize {
        self.shape().0
    }

    /// 列数.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 深度方向层数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 第 `s` 个切片的逐列高度.
    ///
    /// 当 `s` 越界时 panic.
    #[inline]
    pub fn row(&self, s: usize) -> ArrayView1<f32> {
        self.data.index_axis(Axis(0), s)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 取出底层数据.
    #[inline]
    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }
}

/// 逐列扫描: 对每一列, 返回 `[start_depth, depth)` 中第一个满足
/// `(v & mask) > threshold` 的深度. 找不到则为 `None`.
pub fn scan_columns(
    slice: &DepthSlice,
    threshold: f64,
    start_depth: usize,
    bit_depth: BitDepth,
) -> Vec<Option<usize>> {
    (0..slice.width())
        .map(|x| {
            slice
                .column(x)
                .iter()
                .enumerate()
                .skip(start_depth)
                .find(|(_, v)| bit_depth.apply(**v) as f64 > threshold)
                .map(|(y, _)| y)
        })
        .collect()
}

/// 单个切片的扫描结果.
#[derive(Debug, Clone)]
pub struct SliceTrace {
    /// 逐列原始扫描值.
    pub raw: Vec<Option<usize>>,

    /// 折线. 整个切片都没有越过阈值时为 `None`.
    pub polyline: Option<Polyline>,

    /// 稠密化后的逐列高度. 与 `polyline` 同时为 `None`.
    pub dense: Option<Vec<f32>>,
}

/// 扫描单个切片, 并依次完成折线构建、可选插值和稠密化.
pub fn trace_slice(
    slice: &DepthSlice,
    threshold: f64,
    params: &ScanParams,
    bit_depth: BitDepth,
) -> SliceTrace {
    let raw = scan_columns(slice, threshold, params.start_depth, bit_depth);
    let Some(mut polyline) = Polyline::from_scan(&raw) else {
        return SliceTrace {
            raw,
            polyline: None,
            dense: None,
        };
    };
    if let Some(i) = params.interpolation {
        polyline = polyline.interpolated(i.interval, i.smooth);
    }
    let max = slice.depth().saturating_sub(1) as f32;
    let dense = polyline
        .densify(slice.width())
        .into_iter()
        .map(|y| y.clamp(0.0, max))
        .collect();
    SliceTrace {
        raw,
        polyline: Some(polyline),
        dense: Some(dense),
    }
}

/// 对整个工作栈逐切片扫描, 得到 (切片, 列) 高度图.
///
/// 若某个切片整体未越过阈值, 则复制最近的已解析切片 (距离相同时取较小下标);
/// 若全部切片都未解析, 返回 `DegenerateInput`.
pub fn scan_stack(
    stack: &ReslicedStack,
    threshold: f64,
    params: &ScanParams,
    frame: usize,
) -> PeelResult<HeightProfile> {
    let bit_depth = stack.bit_depth();
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            let rows: Vec<Option<Vec<f32>>> = stack
                .par_map_slices(|_, s| trace_slice(&s, threshold, params, bit_depth).dense);
        } else {
            let rows: Vec<Option<Vec<f32>>> = stack
                .slice_iter()
                .map(|s| trace_slice(&s, threshold, params, bit_depth).dense)
                .collect();
        }
    }

    let resolved: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.is_some().then_some(i))
        .collect();
    if resolved.is_empty() {
        return Err(PeelError::DegenerateInput {
            frame,
            reason: format!("no column exceeds threshold {threshold}"),
        });
    }
    let unresolved = rows.len() - resolved.len();
    if unresolved > 0 {
        warn!("frame {frame}: {unresolved} slice(s) without surface copied from neighbours");
    }

    let (n, width) = (stack.n_slices(), stack.width());
    let mut data = Array2::<f32>::zeros((n, width));
    for (s, mut out) in data.axis_iter_mut(Axis(0)).enumerate() {
        let src = rows[s]
            .as_ref()
            .or_else(|| rows[nearest_resolved(&resolved, s)].as_ref());
        if let Some(src) = src {
            out.iter_mut().zip(src).for_each(|(o, v)| *o = *v);
        }
    }
    debug!(
        "frame {frame}: scanned {n} slices x {width} columns at threshold {threshold}"
    );
    Ok(HeightProfile::from_valid(data, stack.depth()))
}

/// `resolved` 升序. 返回与 `s` 距离最近的下标, 距离相同时取较小者.
fn nearest_resolved(resolved: &[usize], s: usize) -> usize {
    let i = resolved.partition_point(|&r| r < s);
    match (i.checked_sub(1).map(|j| resolved[j]), resolved.get(i)) {
        (Some(l), Some(&r)) => {
            if s - l <= r - s {
                l
            } else {
                r
            }
        }
        (Some(l), None) => l,
        (None, Some(&r)) => r,
        (None, None) => s,
    }
}
