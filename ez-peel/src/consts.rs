//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 掩膜体素值.
pub mod mask {
    /// 剥离层内部.
    pub const INSIDE: f32 = 1.0;

    /// 剥离层外部.
    pub const OUTSIDE: f32 = 0.0;

    /// 体素是否位于剥离层内部 (允许平滑后的非二值情况).
    #[inline]
    pub fn is_inside(v: f32) -> bool {
        v > OUTSIDE
    }
}

/// 高斯核截断精度. 核半径为 `ceil(sigma * sqrt(-2 ln(ACCURACY)))`.
pub const GAUSSIAN_ACCURACY: f64 = 0.01;

/// 求参考表面时的默认高斯 sigma.
pub const DEFAULT_REFERENCE_SIGMA: f64 = 30.0;

/// 空洞填补时默认的 (sigma, 重复次数) 级联.
pub const DEFAULT_FILL_SCHEDULE: [(f64, u32); 3] = [(50.0, 1), (2.0, 10), (1.5, 10)];

/// 排除区域默认的腐蚀次数.
pub const DEFAULT_EXCLUSION_EROSIONS: u32 = 2;

/// 预览滑块的离散度阈值刻度: 滑块值除以该值才是体素层单位.
pub const DIVERGENCE_SLIDER_SCALE: f64 = 10.0;

/// 折线插值的默认间隔 (像素).
pub const DEFAULT_INTERPOLATION_INTERVAL: f64 = 8.0;

/// Otsu 直方图的分箱数.
pub const OTSU_BINS: usize = 256;
