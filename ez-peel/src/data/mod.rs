use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, Array5, ArrayView3, ArrayView4, Axis, Ix5};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PeelError, PeelResult};
use crate::Idx3d;

mod resliced;
pub mod slice;
pub mod window;

pub use resliced::ReslicedStack;
pub use slice::{DepthSlice, DepthSliceMut, ImgWriteRaw, ImgWriteVis, NpyWrite};
pub use window::DisplayWindow;

/// (t, c, z, h, w) 索引.
pub type Idx5d = (usize, usize, usize, usize, usize);

/// 体素物理尺寸, 单位由采集设备决定 (通常为微米).
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    /// 宽方向 (x) 像素间距.
    pub pixel_width: f64,

    /// 高方向 (y) 像素间距.
    pub pixel_height: f64,

    /// 深度方向 (z, 相邻切片) 间距.
    pub pixel_depth: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            pixel_depth: 1.0,
        }
    }
}

impl Calibration {
    /// 构建标定. 三个间距都必须是正有限数, 否则返回 `None`.
    pub fn new(pixel_width: f64, pixel_height: f64, pixel_depth: f64) -> Option<Self> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        (ok(pixel_width) && ok(pixel_height) && ok(pixel_depth)).then_some(Self {
            pixel_width,
            pixel_height,
            pixel_depth,
        })
    }
}

/// 带标定信息的体数据的共用属性.
pub trait Calibrated {
    /// 获取标定.
    fn calibration(&self) -> &Calibration;

    /// 宽方向像素间距.
    #[inline]
    fn pixel_width(&self) -> f64 {
        self.calibration().pixel_width
    }

    /// 高方向像素间距.
    #[inline]
    fn pixel_height(&self) -> f64 {
        self.calibration().pixel_height
    }
}

/// 量化位深. 扫描时像素值会先与对应掩码按位与, 再与阈值比较.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitDepth {
    /// 8-bit, 掩码 `0xFF`.
    Eight,

    /// 16-bit, 掩码 `0xFFFF`.
    #[default]
    Sixteen,
}

impl BitDepth {
    /// 按位与掩码.
    #[inline]
    pub const fn mask(self) -> i32 {
        match self {
            BitDepth::Eight => 0xFF,
            BitDepth::Sixteen => 0xFFFF,
        }
    }

    /// 该位深可表示的最大值.
    #[inline]
    pub const fn max_value(self) -> i32 {
        self.mask()
    }

    /// 单个像素占用的字节数.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }

    /// 以该位深解释像素值.
    #[inline]
    pub const fn apply(self, raw: i32) -> i32 {
        raw & self.mask()
    }

    /// 舍入并截断到该位深的取值范围.
    #[inline]
    pub fn clamp(self, v: f32) -> i32 {
        if v.is_nan() {
            return 0;
        }
        (v.round() as i32).clamp(0, self.max_value())
    }
}

/// 共聚焦超栈 (hyperstack), 按 (t, c, z, h, w) 组织, 强度以 `f32` 保存.
///
/// 该结构只读. 流程的每一阶段都只借用它.
#[derive(Debug, Clone)]
pub struct Hyperstack {
    calibration: Calibration,
    data: Array5<f32>,
}

impl Calibrated for Hyperstack {
    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}

impl Index<Idx5d> for Hyperstack {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx5d) -> &Self::Output {
        &self.data[index]
    }
}

impl Hyperstack {
    /// 直接创建超栈. `data` 按 (t, c, z, h, w) 组织, 任一维度为 0 时返回 `Err`.
    pub fn new(data: Array5<f32>, calibration: Calibration) -> PeelResult<Self> {
        if data.is_empty() {
            return Err(PeelError::invalid("data", "hyperstack must not be empty"));
        }
        Ok(Self { calibration, data })
    }

    /// 由单帧单通道的 (z, h, w) 体数据创建.
    pub fn from_volume(volume: Array3<f32>, calibration: Calibration) -> PeelResult<Self> {
        let data = volume.insert_axis(Axis(0)).insert_axis(Axis(0));
        Self::new(data, calibration)
    }

    /// 打开 nii 文件格式的超栈. 支持 3D (x, y, z), 4D (x, y, z, t) 与 5D (x, y, z, t, c).
    /// 标定取自 header 的 `pixdim`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header();
        let [_, pw, ph, pz, ..] = header.pixdim;
        let calibration = Calibration::new(pw as f64, ph as f64, pz as f64).unwrap_or_default();

        let mut data = obj.into_volume().into_ndarray::<f32>()?;
        if data.ndim() > 5 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unsupported volume rank {}", data.ndim()),
            )
            .into());
        }
        while data.ndim() < 5 {
            let n = data.ndim();
            data = data.insert_axis(Axis(n));
        }

        // [W, H, z, t, c] -> [t, c, z, H, W].
        let data = data
            .into_dimensionality::<Ix5>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
            .permuted_axes([3, 4, 2, 1, 0]);
        let data = data.as_standard_layout().into_owned();
        Ok(Self { calibration, data })
    }

    /// (t, c, z, h, w) 形状.
    #[inline]
    pub fn shape(&self) -> Idx5d {
        self.data.dim()
    }

    /// 单个通道体数据的 (z, h, w) 形状.
    #[inline]
    pub fn volume_shape(&self) -> Idx3d {
        let (_, _, z, h, w) = self.shape();
        (z, h, w)
    }

    /// 帧数.
    #[inline]
    pub fn n_frames(&self) -> usize {
        self.shape().0
    }

    /// 通道数.
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.shape().1
    }

    /// 获取第 `t` 帧的 (c, z, h, w) 视图. 越界时返回 `Err`.
    pub fn frame(&self, t: usize) -> PeelResult<ArrayView4<'_, f32>> {
        check_index("frame", t, self.n_frames())?;
        Ok(self.data.index_axis(Axis(0), t))
    }

    /// 获取第 `t` 帧第 `c` 通道的 (z, h, w) 视图. 越界时返回 `Err`.
    pub fn channel(&self, t: usize, c: usize) -> PeelResult<ArrayView3<'_, f32>> {
        check_index("channel", c, self.n_channels())?;
        Ok(self.frame(t)?.index_axis_move(Axis(0), c))
    }

    /// 单帧数据的字节数.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        let (_, c, z, h, w) = self.shape();
        c * z * h * w * std::mem::size_of::<f32>()
    }
}

#[inline]
fn check_index(what: &'static str, index: usize, len: usize) -> PeelResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(PeelError::IndexOutOfRange { what, index, len })
    }
}
