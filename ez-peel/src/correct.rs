//! 表面修正: 离散度图, 排除区域, 级联高斯填补.
//!
//! 原始高度图先以大 sigma 模糊得到参考表面, `参考 - 原始` 即离散度.
//! 离散度绝对值超过阈值的像素被排除, 排除区域腐蚀后作为填补掩膜:
//! 每一轮模糊整幅图像, 但只写回掩膜内的像素, 让周围的可靠高度逐渐渗入.

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_EXCLUSION_EROSIONS, DEFAULT_FILL_SCHEDULE, DEFAULT_REFERENCE_SIGMA,
    DIVERGENCE_SLIDER_SCALE,
};
use crate::error::{PeelError, PeelResult};
use crate::filter::{blur_2d, erode_n};
use crate::scan::HeightProfile;

/// 离散度阈值, 以体素层为单位.
///
/// # 注意
///
/// 预览滑块上的数值是体素层的 10 倍 (滑块 15 即 1.5 层), 而偏移、厚度滑块没有这个倍数.
/// 从滑块取值时请使用 [`Self::from_slider_ticks`].
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DivergenceThreshold(f64);

impl DivergenceThreshold {
    /// 以体素层为单位直接构建.
    #[inline]
    pub const fn voxels(v: f64) -> Self {
        Self(v)
    }

    /// 由预览滑块刻度构建, 即 `ticks / 10`.
    #[inline]
    pub fn from_slider_ticks(ticks: f64) -> Self {
        Self(ticks / DIVERGENCE_SLIDER_SCALE)
    }

    /// 体素层数值.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for DivergenceThreshold {
    fn default() -> Self {
        Self::from_slider_ticks(15.0)
    }
}

/// 填补级联中的一轮: 以 `sigma` 模糊 `repeats` 次.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlurPass {
    /// 高斯 sigma.
    pub sigma: f64,

    /// 重复次数.
    pub repeats: u32,
}

/// 修正参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectParams {
    /// 是否移除高度突变 (峰/洞). 为 `false` 时本阶段原样返回输入.
    pub hole_removal: bool,

    /// 离散度阈值.
    pub divergence: DivergenceThreshold,

    /// 参考表面的高斯 sigma.
    pub reference_sigma: f64,

    /// 排除区域的 3x3 腐蚀次数.
    pub erosions: u32,

    /// 依次执行的填补模糊.
    pub fill_schedule: Vec<BlurPass>,
}

impl Default for CorrectParams {
    fn default() -> Self {
        Self {
            hole_removal: true,
            divergence: DivergenceThreshold::default(),
            reference_sigma: DEFAULT_REFERENCE_SIGMA,
            erosions: DEFAULT_EXCLUSION_EROSIONS,
            fill_schedule: DEFAULT_FILL_SCHEDULE
                .iter()
                .map(|&(sigma, repeats)| BlurPass { sigma, repeats })
                .collect(),
        }
    }
}

impl CorrectParams {
    /// 参数合法性检查.
    pub fn validate(&self) -> PeelResult<()> {
        let d = self.divergence.value();
        if !(d.is_finite() && d >= 0.0) {
            return Err(PeelError::invalid("divergence", format!("{d} is negative")));
        }
        if !(self.reference_sigma.is_finite() && self.reference_sigma > 0.0) {
            return Err(PeelError::invalid(
                "reference_sigma",
                format!("{} must be positive", self.reference_sigma),
            ));
        }
        if let Some(p) = self
            .fill_schedule
            .iter()
            .find(|p| !(p.sigma.is_finite() && p.sigma > 0.0))
        {
            return Err(PeelError::invalid(
                "fill_schedule",
                format!("sigma {} must be positive", p.sigma),
            ));
        }
        Ok(())
    }
}

/// 离散度图: `gaussian(raw, sigma) - raw`, 形状同高度图.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceMap {
    data: Array2<f32>,
}

impl DivergenceMap {
    /// 计算 `profile` 的离散度图.
    pub fn compute(profile: &HeightProfile, reference_sigma: f64) -> Self {
        let mut data = profile.data().to_owned();
        blur_2d(data.view_mut(), reference_sigma);
        data.zip_mut_with(&profile.data(), |r, raw| *r -= raw);
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 离散度绝对值的最大值. 可作为滑块上界.
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }
}

/// 排除区域. `true` 表示该像素的高度不可靠, 需要填补.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionMap {
    data: Array2<bool>,
}

impl ExclusionMap {
    /// 标记 `|div| > threshold` 的像素, 再腐蚀 `erosions` 次.
    pub fn compute(divergence: &DivergenceMap, threshold: DivergenceThreshold, erosions: u32) -> Self {
        let t = threshold.value();
        let raw = divergence.data().mapv(|v| (v as f64).abs() > t);
        Self {
            data: erode_n(raw.view(), erosions),
        }
    }

    /// (切片数, 列数).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<bool> {
        self.data.view()
    }

    /// 被排除的像素个数.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    /// 是否没有任何排除像素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|v| *v)
    }
}

/// 修正阶段的输出.
#[derive(Debug, Clone, PartialEq)]
pub struct Corrected {
    /// 修正后的高度图.
    pub heights: HeightProfile,

    /// 离散度图, 供预览使用.
    pub divergence: DivergenceMap,

    /// 腐蚀后的排除区域.
    pub exclusion: ExclusionMap,
}

/// 修正高度图. 输入不会被修改.
///
/// 若未开启 `hole_removal`, 或排除区域为空, 则高度原样通过.
/// 因此对已经没有离散像素的高度图重复修正, 结果不变.
pub fn correct(profile: &HeightProfile, params: &CorrectParams) -> PeelResult<Corrected> {
    params.validate()?;
    let divergence = DivergenceMap::compute(profile, params.reference_sigma);
    let exclusion = ExclusionMap::compute(&divergence, params.divergence, params.erosions);

    if !params.hole_removal || exclusion.is_empty() {
        return Ok(Corrected {
            heights: profile.clone(),
            divergence,
            exclusion,
        });
    }

    let mut heights = profile.data().to_owned();
    let mut blurred = Array2::<f32>::zeros(heights.dim());
    for pass in params.fill_schedule.iter() {
        for _ in 0..pass.repeats {
            blurred.assign(&heights);
            blur_2d(blurred.view_mut(), pass.sigma);
            Zip::from(&mut heights)
                .and(&blurred)
                .and(&exclusion.data)
                .for_each(|h, &b, &ex| {
                    if ex {
                        *h = b;
                    }
                });
        }
    }
    let depth = profile.depth() as f32;
    heights.mapv_inplace(|v| v.clamp(0.0, depth));
    debug!(
        "corrected {} of {} heights over {} fill passes",
        exclusion.count(),
        heights.len(),
        params.fill_schedule.len()
    );

    Ok(Corrected {
        heights: HeightProfile::from_valid(heights, profile.depth()),
        divergence,
        exclusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn flat(value: f32, shape: (usize, usize)) -> Array2<f32> {
        Array2::from_elem(shape, value)
    }

    #[test]
    fn test_slider_ticks_are_tenths() {
        assert_eq!(DivergenceThreshold::from_slider_ticks(15.0).value(), 1.5);
        assert_eq!(DivergenceThreshold::voxels(15.0).value(), 15.0);
        assert_eq!(DivergenceThreshold::default().value(), 1.5);
    }

    #[test]
    fn test_flat_profile_passes_through() {
        let profile = HeightProfile::new(flat(10.0, (20, 30)), 40).unwrap();
        let out = correct(&profile, &CorrectParams::default()).unwrap();
        assert_eq!(out.heights, profile);
        assert!(out.exclusion.is_empty());
        assert!(out.divergence.max_abs() < 1e-4);
    }

    #[test]
    fn test_correct_is_idempotent_on_gentle_slope() {
        let data = Array2::from_shape_fn((24, 24), |(s, x)| 10.0 + 0.01 * (s + x) as f32);
        let profile = HeightProfile::new(data, 40).unwrap();
        let params = CorrectParams::default();
        let once = correct(&profile, &params).unwrap().heights;
        let twice = correct(&once, &params).unwrap().heights;
        assert_eq!(once, profile);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_outlier_block_is_filled() {
        let mut data = flat(10.0, (40, 40));
        data.slice_mut(s![17..23, 17..23]).fill(30.0);
        let profile = HeightProfile::new(data, 64).unwrap();
        let out = correct(&profile, &CorrectParams::default()).unwrap();

        // 6x6 的排除块腐蚀两次后只剩中心 2x2.
        assert_eq!(out.exclusion.count(), 4);
        assert!(out.exclusion.data()[(19, 19)]);
        let h = out.heights.data();
        assert!(h[(19, 19)] < 29.0);
        assert!(h[(19, 19)] > 10.0);
        assert_eq!(h[(17, 17)], 30.0);
        assert_eq!(h[(0, 0)], 10.0);
        // 输入不被修改.
        assert_eq!(profile.data()[(19, 19)], 30.0);
    }

    #[test]
    fn test_small_outlier_vanishes_under_erosion() {
        let mut data = flat(10.0, (30, 30));
        data.slice_mut(s![10..14, 10..14]).fill(40.0);
        let profile = HeightProfile::new(data, 64).unwrap();
        let out = correct(&profile, &CorrectParams::default()).unwrap();
        assert!(out.exclusion.is_empty());
        assert_eq!(out.heights, profile);
    }

    #[test]
    fn test_disabled_hole_removal_is_noop() {
        let mut data = flat(10.0, (40, 40));
        data.slice_mut(s![10..30, 10..30]).fill(50.0);
        let profile = HeightProfile::new(data, 64).unwrap();
        let params = CorrectParams {
            hole_removal: false,
            ..Default::default()
        };
        let out = correct(&profile, &params).unwrap();
        assert_eq!(out.heights, profile);
        assert!(!out.exclusion.is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let p = CorrectParams {
            reference_sigma: 0.0,
            ..Default::default()
        };
        assert!(p.validate().is_err());
        let p = CorrectParams {
            fill_schedule: vec![BlurPass {
                sigma: -1.0,
                repeats: 1,
            }],
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(PeelError::InvalidParameter {
                name: "fill_schedule",
                ..
            })
        ));
    }
}
