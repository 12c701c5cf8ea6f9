use crate::data::BitDepth;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, Ix2};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维深度切片, 按 (深度, 宽) 组织.
pub struct DepthSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::ReslicedStack`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, i32>,
}

impl Index<Idx2d> for DepthSlice<'_> {
    type Output = i32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维深度切片.
pub struct DepthSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::ReslicedStack`].
    data: ArrayViewMut2<'a, i32>,
}

/// 可变方法集合.
impl<'a> DepthSliceMut<'a> {
    /// 用浮点图像 `values` 覆写切片, 每个值按 `bit_depth` 舍入并截断.
    ///
    /// 如果形状不符, 则程序 panic.
    pub fn store(&mut self, values: ArrayView2<f32>, bit_depth: BitDepth) {
        assert_eq!(self.data.dim(), values.dim(), "切片形状不符");
        self.data
            .zip_mut_with(&values, |dst, &src| *dst = bit_depth.clamp(src));
    }
}

impl Index<Idx2d> for DepthSliceMut<'_> {
    type Output = i32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for DepthSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 深度切片不可变方法集合.
macro_rules! impl_depth_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, i32, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (深度, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&i32> {
                self.data.get(pos)
            }

            /// 获取给定位置按 `bit_depth` 解释后的像素值. 越界时返回 `None`.
            #[inline]
            pub fn masked(&self, pos: Idx2d, bit_depth: BitDepth) -> Option<i32> {
                self.get(pos).map(|v| bit_depth.apply(*v))
            }

            /// 图像的分辨率 (深度, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 图像的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 深度方向层数.
            #[inline]
            pub fn depth(&self) -> usize {
                self.shape().0
            }

            /// 列数.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 获取第 `x` 列沿深度方向的视图.
            ///
            /// 当 `x` 越界时 panic.
            #[inline]
            pub fn column(&self, x: usize) -> ArrayView1<i32> {
                self.data.index_axis(Axis(1), x)
            }

            /// 转换为浮点图像, 便于滤波.
            pub fn to_f32(&self) -> Array2<f32> {
                self.data.mapv(|v| v as f32)
            }

            /// 以行优先规则, 获取能迭代图像所有索引的迭代器.
            #[inline]
            pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
                super::iter::PosIter::new(self.shape())
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &i32)> {
                self.data.indexed_iter()
            }
        }
    };
}

impl_depth_slice_immut!('a, DepthSlice<'a>, ArrayView2<'a, i32>);
impl_depth_slice_immut!('a, DepthSliceMut<'a>, ArrayViewMut2<'a, i32>);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_masked_and_column() {
        let data = array![[1, -1], [0x1_00, 7]];
        let s = DepthSlice::new(data.view());
        assert_eq!(s.masked((0, 1), BitDepth::Eight), Some(0xFF));
        assert_eq!(s.masked((1, 0), BitDepth::Eight), Some(0));
        assert_eq!(s.masked((2, 0), BitDepth::Eight), None);
        assert_eq!(s.column(1).to_vec(), vec![-1, 7]);
        assert_eq!((s.depth(), s.width(), s.size()), (2, 2, 4));
    }

    #[test]
    fn test_store_clamps() {
        let mut data = Array2::<i32>::zeros((1, 3));
        let mut s = DepthSliceMut::new(data.view_mut());
        s.store(array![[-3.0f32, 2.6, 999.0]].view(), BitDepth::Eight);
        s[(0, 0)] += 1;
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), vec![1, 3, 255]);
    }

    #[test]
    fn test_pos_iter_matches_indexed() {
        let data = Array2::<i32>::zeros((3, 4));
        let s = DepthSlice::new(data.view());
        let a: Vec<_> = s.pos_iter().collect();
        let b: Vec<_> = s.indexed_iter().map(|(p, _)| p).collect();
        assert_eq!(a, b);
    }
}
