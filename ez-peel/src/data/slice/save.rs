//! 图像与数组的持久化存储.

use crate::consts::gray::{BLACK, WHITE};
use crate::correct::{DivergenceMap, ExclusionMap};
use crate::data::{DepthSlice, DepthSliceMut, DisplayWindow};
use crate::maps::{AreaMap, HeightMap};
use crate::mask::MaskVolume;
use image::ImageResult;
use ndarray::ArrayView2;
use ndarray_npy::WriteNpyError;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 图像会先经过 [`DisplayWindow::fit`] 拉伸到 0..=255 再保存,
/// 因此高度图、面积图这类浮点图像也能直接查看.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以以 `.npy` 格式导出原始数值的对象.
pub trait NpyWrite {
    /// 将数值按原样写入 `path`.
    fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError>;
}

/// 以数据自身范围为窗口, 把浮点图像存为灰度图.
fn save_windowed<P: AsRef<Path>>(data: ArrayView2<f32>, path: P) -> ImageResult<()> {
    let (height, width) = data.dim();
    let window = DisplayWindow::fit(data.iter());
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in data.indexed_iter() {
        let gray = window.eval(v).unwrap_or(BLACK);
        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
    }
    buf.save(path)
}

macro_rules! impl_slice_vis {
    ($($slice: ty),+) => {
        $(
            /// 以切片自身的最小/最大值为窗口.
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    save_windowed(self.to_f32().view(), path)
                }
            }
        )+
    };
}

macro_rules! impl_map_io {
    ($($map: ty),+) => {
        $(
            /// 以图像自身的最小/最大值为窗口.
            impl ImgWriteVis for $map {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    save_windowed(self.data(), path)
                }
            }

            impl NpyWrite for $map {
                fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
                    ndarray_npy::write_npy(path, &self.data())
                }
            }
        )+
    };
}

impl_slice_vis!(DepthSlice<'_>, DepthSliceMut<'_>);
impl_map_io!(HeightMap, AreaMap, DivergenceMap);

/// 被排除的像素为白色, 其余为黑色.
impl ImgWriteRaw for ExclusionMap {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &excluded) in self.data().indexed_iter() {
            let gray = if excluded { WHITE } else { BLACK };
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf.save(path)
    }
}

impl NpyWrite for MaskVolume {
    fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        ndarray_npy::write_npy(path, &self.data())
    }
}
