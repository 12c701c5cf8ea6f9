//! 重切片后的工作栈.

use ndarray::{Array3, ArrayView3, Axis};

use super::slice::{DepthSlice, DepthSliceMut};
use super::{BitDepth, Calibrated, Calibration};
use crate::Idx3d;

/// 分割用的工作栈. 原始 (z, h, w) 通道体数据经量化、滤波后,
/// 重切片为 (切片 = 原 h, 深度 = 原 z, 列 = 原 w).
///
/// 每个 `depth_slice(s)` 都是一个 (深度, 宽) 的二维横截面,
/// 表皮表面在其中表现为 "每列自上而下第一个亮像素".
#[derive(Debug, Clone)]
pub struct ReslicedStack {
    calibration: Calibration,
    bit_depth: BitDepth,
    data: Array3<i32>,
}

impl Calibrated for ReslicedStack {
    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}

impl ReslicedStack {
    /// 直接以 (切片, 深度, 宽) 组织的量化数据创建.
    pub fn new(data: Array3<i32>, bit_depth: BitDepth, calibration: Calibration) -> Self {
        Self {
            calibration,
            bit_depth,
            data,
        }
    }

    /// 将 (z, h, w) 组织的浮点体数据重切片为工作栈.
    /// 每个体素会被舍入并截断到 `bit_depth` 的取值范围.
    pub fn reslice(volume: ArrayView3<f32>, bit_depth: BitDepth, calibration: Calibration) -> Self {
        let (z, h, w) = volume.dim();
        let resliced = volume.permuted_axes([1, 0, 2]);
        let mut stack = Self::new(Array3::zeros((h, z, w)), bit_depth, calibration);
        for (mut dst, src) in stack.slice_iter_mut().zip(resliced.axis_iter(Axis(0))) {
            dst.store(src, bit_depth);
        }
        stack
    }

    /// 工作栈形状 (切片数, 深度, 宽).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 切片个数, 即原始体数据的高.
    #[inline]
    pub fn n_slices(&self) -> usize {
        self.shape().0
    }

    /// 深度方向层数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.shape().1
    }

    /// 每个切片的列数.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().2
    }

    /// 量化位深.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// 所有体素按位深解释后的最大值. 栈为空时返回 0.
    pub fn max_value(&self) -> i32 {
        let bd = self.bit_depth;
        self.data.iter().map(|v| bd.apply(*v)).max().unwrap_or(0)
    }

    /// 获取第 `index` 个深度切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn depth_slice(&self, index: usize) -> DepthSlice<'_> {
        DepthSlice::new(self.data.index_axis(Axis(0), index))
    }

    /// 获取第 `index` 个可变深度切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn depth_slice_mut(&mut self, index: usize) -> DepthSliceMut<'_> {
        DepthSliceMut::new(self.data.index_axis_mut(Axis(0), index))
    }

    /// 获取能按升序迭代深度切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = DepthSlice> {
        self.data.axis_iter(Axis(0)).map(DepthSlice::new)
    }

    /// 获取能按升序迭代可变深度切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = DepthSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(DepthSliceMut::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, i32> {
        self.data.view()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl ReslicedStack {
    /// 借助 `rayon`, 并行地对每个深度切片求值, 结果按切片顺序收集.
    pub fn par_map_slices<T, F>(&self, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize, DepthSlice) -> T + Sync + Send,
    {
        self.data
            .axis_iter(Axis(0))
            .into_par_iter()
            .enumerate()
            .map(|(i, v)| op(i, DepthSlice::new(v)))
            .collect()
    }
}
