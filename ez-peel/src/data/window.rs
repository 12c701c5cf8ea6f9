/// 显示窗口, 将任意标量线性映射到 8-bit 灰度.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DisplayWindow {
    lower: f32,
    upper: f32,
}

impl DisplayWindow {
    /// 构建显示窗口.
    ///
    /// `lower` 和 `upper` 必须为有限值且 `lower < upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<DisplayWindow> {
        if lower.is_finite() && upper.is_finite() && lower < upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 用数据自身的最小值和最大值构建窗口 (类似 "auto contrast").
    ///
    /// 忽略非有限值. 若数据为空或为常数, 则返回 `[v, v + 1]` 的退化窗口,
    /// 常数图像将显示为全黑.
    pub fn fit<'a, I: IntoIterator<Item = &'a f32>>(values: I) -> DisplayWindow {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo < hi {
            Self {
                lower: lo,
                upper: hi,
            }
        } else if lo.is_finite() {
            Self {
                lower: lo,
                upper: lo + 1.0,
            }
        } else {
            Self {
                lower: 0.0,
                upper: 1.0,
            }
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 求在当前窗口设置下, `v` 对应的灰度图像素整数值 (0 <= value <= 255)
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        self.eval_f32(v).map(|g| g as u8)
    }

    /// 求在当前窗口设置下, `v` 对应的灰度图像素分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.lower {
            Some(0.0)
        } else if v >= self.upper {
            Some(255.0)
        } else {
            // 255, not 256.
            Some((v - self.lower) / self.width() * 255.0)
        }
    }
}
