//! 流程编排.
//!
//! 单帧流程依次为 扫描 -> 修正 -> 生成图 -> 掩膜. [`Session`] 以状态机的形式
//! 逐阶段执行并缓存结果, 允许回退一个阶段或修改参数后从受影响的阶段重新计算;
//! [`run_frame`] 与 [`run_series`] 则是无交互的纯流程.
//!
//! # 注意
//!
//! 1. 每个阶段只借用上游结果并返回新分配的输出, 上游缓存不会被下游修改.
//! 2. 取消请求只在阶段之间 (以及帧之间) 检查.

mod event;
mod resource;
mod series;

use std::fmt;

use log::{debug, info};
use ndarray::{Array3, Array4};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::correct::{correct, CorrectParams, Corrected};
use crate::data::{BitDepth, Calibrated, Hyperstack, ReslicedStack};
use crate::error::{PeelError, PeelResult};
use crate::maps::{AreaMap, HeightMap};
use crate::mask::{sum_projection, MaskParams, MaskVolume};
use crate::preprocess::{preprocess, working_bytes, PreprocessParams};
use crate::scan::{scan_stack, HeightProfile, ScanParams};

pub use event::{CancelToken, ParamEvent, StageObserver};
pub use resource::{Lease, WorkBudget};
pub use series::{run_series, KeepOutputs, SeriesOutput};

/// 流程阶段. 声明顺序即执行顺序.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stage {
    /// 预处理并逐列扫描.
    Scan,

    /// 修正高度图.
    Correct,

    /// 生成高度图与面积图.
    Map,

    /// 生成掩膜并剥离.
    Mask,

    /// 全部完成.
    Done,
}

impl Stage {
    /// 下一个阶段. `Done` 之后仍为 `Done`.
    pub const fn next(self) -> Self {
        match self {
            Stage::Scan => Stage::Correct,
            Stage::Correct => Stage::Map,
            Stage::Map => Stage::Mask,
            Stage::Mask | Stage::Done => Stage::Done,
        }
    }

    /// 上一个阶段. `Scan` 之前仍为 `Scan`.
    pub const fn prev(self) -> Self {
        match self {
            Stage::Scan | Stage::Correct => Stage::Scan,
            Stage::Map => Stage::Correct,
            Stage::Mask => Stage::Map,
            Stage::Done => Stage::Mask,
        }
    }

    /// 阶段名.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Scan => "scan",
            Stage::Correct => "correct",
            Stage::Map => "map",
            Stage::Mask => "mask",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 全部流程参数.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeelParams {
    /// 预处理.
    pub preprocess: PreprocessParams,

    /// 扫描.
    pub scan: ScanParams,

    /// 修正.
    pub correct: CorrectParams,

    /// 掩膜.
    pub mask: MaskParams,
}

impl PeelParams {
    /// 依次检查各组参数.
    pub fn validate(&self) -> PeelResult<()> {
        self.preprocess.validate()?;
        self.scan.validate()?;
        self.correct.validate()?;
        self.mask.validate()
    }
}

/// 单帧流程的全部输出.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    /// 帧索引.
    pub frame: usize,

    /// 实际使用的阈值.
    pub threshold: f64,

    /// 修正后的高度图 (切片, 列), 以体素层为单位.
    pub heights: HeightProfile,

    /// 标定高度图.
    pub height_map: HeightMap,

    /// 面积图.
    pub area_map: AreaMap,

    /// 掩膜 (z, h, w).
    pub mask: MaskVolume,

    /// 剥离后的帧 (c, z, h, w).
    pub peeled: Array4<f32>,

    /// 剥离后沿 z 的求和投影 (c, h, w).
    pub projection: Array3<f32>,
}

/// 各阶段的工作内存估计 (字节).
fn stage_bytes(stage: Stage, stack: &Hyperstack) -> usize {
    let (_, c, z, h, w) = stack.shape();
    let f = std::mem::size_of::<f32>();
    match stage {
        Stage::Scan => working_bytes(stack) + h * w * f,
        Stage::Correct => 4 * h * w * f,
        Stage::Map => 2 * h * w * f,
        Stage::Mask => (2 + c) * z * h * w * f + c * h * w * f,
        Stage::Done => 0,
    }
}

/// 扫描阶段: 求阈值并逐列扫描.
fn scan_stage(
    resliced: &ReslicedStack,
    params: &ScanParams,
    frame: usize,
) -> PeelResult<(f64, HeightProfile)> {
    params.validate()?;
    let threshold = params.threshold.resolve(resliced)?;
    let profile = scan_stack(resliced, threshold, params, frame)?;
    Ok((threshold, profile))
}

/// 生成图阶段.
fn map_stage(heights: &HeightProfile, stack: &Hyperstack) -> (HeightMap, AreaMap) {
    let height_map = HeightMap::from_profile(heights, stack.calibration());
    let area_map = AreaMap::from_calibrated(&height_map);
    (height_map, area_map)
}

/// 掩膜阶段: 生成掩膜, 剥离, 求和投影.
fn mask_stage(
    heights: &HeightProfile,
    params: &MaskParams,
    stack: &Hyperstack,
    frame: usize,
) -> PeelResult<(MaskVolume, Array4<f32>, Array3<f32>)> {
    let mask = MaskVolume::build(heights, params)?;
    let peeled = mask.apply(stack.frame(frame)?)?;
    let projection = sum_projection(peeled.view());
    Ok((mask, peeled, projection))
}

#[inline]
fn check_cancel(cancel: &CancelToken, resume_at: Stage) -> PeelResult<()> {
    if cancel.reset() {
        info!("cancelled before {resume_at}");
        return Err(PeelError::UserAbort { resume_at });
    }
    Ok(())
}

/// 无交互地对第 `frame` 帧执行完整流程. `params.preprocess.frame` 被忽略.
///
/// 每个阶段开始前检查 `cancel`, 并从 `budget` 申请该阶段的工作内存.
pub fn run_frame(
    stack: &Hyperstack,
    frame: usize,
    params: &PeelParams,
    budget: &WorkBudget,
    cancel: &CancelToken,
) -> PeelResult<FrameOutput> {
    params.validate()?;
    let pre = PreprocessParams {
        frame,
        ..params.preprocess
    };
    let precision = pre.bit_depth;
    let lease = move |stage: Stage| {
        budget.acquire(stage.as_str(), stage_bytes(stage, stack), precision)
    };

    check_cancel(cancel, Stage::Scan)?;
    let (threshold, raw) = {
        let _lease = lease(Stage::Scan)?;
        let resliced = preprocess(stack, &pre)?;
        scan_stage(&resliced, &params.scan, frame)?
    };

    check_cancel(cancel, Stage::Correct)?;
    let heights = {
        let _lease = lease(Stage::Correct)?;
        correct(&raw, &params.correct)?.heights
    };

    check_cancel(cancel, Stage::Map)?;
    let (height_map, area_map) = {
        let _lease = lease(Stage::Map)?;
        map_stage(&heights, stack)
    };

    check_cancel(cancel, Stage::Mask)?;
    let (mask, peeled, projection) = {
        let _lease = lease(Stage::Mask)?;
        mask_stage(&heights, &params.mask, stack, frame)?
    };
    debug!("frame {frame}: done at threshold {threshold}");

    Ok(FrameOutput {
        frame,
        threshold,
        heights,
        height_map,
        area_map,
        mask,
        peeled,
        projection,
    })
}

/// 各阶段的缓存结果.
#[derive(Debug, Default)]
struct Cache {
    resliced: Option<ReslicedStack>,
    threshold: Option<f64>,
    raw: Option<HeightProfile>,
    corrected: Option<Corrected>,
    maps: Option<(HeightMap, AreaMap)>,
    masked: Option<(MaskVolume, Array4<f32>, Array3<f32>)>,
}

impl Cache {
    /// 丢弃 `stage` 及其下游阶段的结果. 预处理得到的工作栈不在此列.
    fn discard_from(&mut self, stage: Stage) {
        if stage <= Stage::Scan {
            self.threshold = None;
            self.raw = None;
        }
        if stage <= Stage::Correct {
            self.corrected = None;
        }
        if stage <= Stage::Map {
            self.maps = None;
        }
        if stage <= Stage::Mask {
            self.masked = None;
        }
    }
}

/// 交互式单帧会话.
///
/// 会话只读地借用超栈, 持有参数、预算、取消令牌以及各阶段的缓存结果.
/// [`Self::stage`] 是下一个将要执行的阶段.
///
/// # 注意
///
/// 取消时会话回退到上一个已完成的阶段, 并丢弃该阶段 (尚未被确认) 的结果,
/// 更上游的结果保持不变.
#[derive(Debug)]
pub struct Session<'a> {
    source: &'a Hyperstack,
    params: PeelParams,
    keep: KeepOutputs,
    budget: WorkBudget,
    cancel: CancelToken,
    stage: Stage,
    cache: Cache,
}

impl<'a> Session<'a> {
    /// 以不限量预算创建会话.
    pub fn new(source: &'a Hyperstack, params: PeelParams) -> PeelResult<Self> {
        params.validate()?;
        source.channel(params.preprocess.frame, params.preprocess.channel)?;
        Ok(Self {
            source,
            params,
            keep: KeepOutputs::default(),
            budget: WorkBudget::unlimited(),
            cancel: CancelToken::new(),
            stage: Stage::Scan,
            cache: Cache::default(),
        })
    }

    /// 替换工作内存预算.
    pub fn with_budget(mut self, budget: WorkBudget) -> Self {
        self.budget = budget;
        self
    }

    /// 下一个将要执行的阶段.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 当前参数.
    #[inline]
    pub fn params(&self) -> &PeelParams {
        &self.params
    }

    /// 时间序列保留项.
    #[inline]
    pub fn keep(&self) -> &KeepOutputs {
        &self.keep
    }

    /// 源超栈.
    #[inline]
    pub fn source(&self) -> &'a Hyperstack {
        self.source
    }

    /// 工作内存预算.
    #[inline]
    pub fn budget(&self) -> &WorkBudget {
        &self.budget
    }

    /// 取消令牌的一个克隆, 可交给界面线程.
    #[inline]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 预处理得到的工作栈.
    #[inline]
    pub fn resliced(&self) -> Option<&ReslicedStack> {
        self.cache.resliced.as_ref()
    }

    /// 扫描使用的阈值.
    #[inline]
    pub fn threshold(&self) -> Option<f64> {
        self.cache.threshold
    }

    /// 扫描得到的原始高度图.
    #[inline]
    pub fn raw_profile(&self) -> Option<&HeightProfile> {
        self.cache.raw.as_ref()
    }

    /// 修正结果, 包含离散度图与排除区域.
    #[inline]
    pub fn corrected(&self) -> Option<&Corrected> {
        self.cache.corrected.as_ref()
    }

    /// 标定高度图.
    #[inline]
    pub fn height_map(&self) -> Option<&HeightMap> {
        self.cache.maps.as_ref().map(|m| &m.0)
    }

    /// 面积图.
    #[inline]
    pub fn area_map(&self) -> Option<&AreaMap> {
        self.cache.maps.as_ref().map(|m| &m.1)
    }

    /// 掩膜.
    #[inline]
    pub fn mask(&self) -> Option<&MaskVolume> {
        self.cache.masked.as_ref().map(|m| &m.0)
    }

    /// 剥离后的帧.
    #[inline]
    pub fn peeled(&self) -> Option<&Array4<f32>> {
        self.cache.masked.as_ref().map(|m| &m.1)
    }

    /// 剥离后的求和投影.
    #[inline]
    pub fn projection(&self) -> Option<&Array3<f32>> {
        self.cache.masked.as_ref().map(|m| &m.2)
    }

    fn precision(&self) -> BitDepth {
        self.params.preprocess.bit_depth
    }

    /// 执行当前阶段, 缓存结果并前进一个阶段.
    ///
    /// # 返回值
    ///
    /// 前进后的阶段. 已经是 `Done` 时什么也不做.
    /// 若已请求取消, 则回退并返回 `UserAbort`; 若阶段失败, 该阶段的缓存被清空,
    /// 阶段不变.
    pub fn advance<O: StageObserver>(&mut self, observer: &mut O) -> PeelResult<Stage> {
        let stage = self.stage;
        if stage == Stage::Done {
            return Ok(stage);
        }
        if self.cancel.reset() {
            let resume_at = self.back();
            info!("cancelled before {stage}, resuming at {resume_at}");
            return Err(PeelError::UserAbort { resume_at });
        }

        if let Err(e) = self.execute(stage) {
            self.cache.discard_from(stage);
            return Err(e);
        }
        self.stage = stage.next();
        info!("{stage} finished");
        observer.stage_finished(stage, self);
        Ok(self.stage)
    }

    fn execute(&mut self, stage: Stage) -> PeelResult<()> {
        let source = self.source;
        let frame = self.params.preprocess.frame;
        let bytes = stage_bytes(stage, source);
        let precision = self.precision();
        let _lease = self.budget.acquire(stage.as_str(), bytes, precision)?;
        let cache = &mut self.cache;
        let params = &self.params;

        match stage {
            Stage::Scan => {
                if cache.resliced.is_none() {
                    cache.resliced = Some(preprocess(source, &params.preprocess)?);
                }
                let resliced = cache.resliced.as_ref().ok_or_else(|| missing(Stage::Scan))?;
                let (threshold, raw) = scan_stage(resliced, &params.scan, frame)?;
                cache.threshold = Some(threshold);
                cache.raw = Some(raw);
            }
            Stage::Correct => {
                let raw = cache.raw.as_ref().ok_or_else(|| missing(Stage::Scan))?;
                cache.corrected = Some(correct(raw, &params.correct)?);
            }
            Stage::Map => {
                let corrected = cache.corrected.as_ref().ok_or_else(|| missing(Stage::Correct))?;
                cache.maps = Some(map_stage(&corrected.heights, source));
            }
            Stage::Mask => {
                let corrected = cache.corrected.as_ref().ok_or_else(|| missing(Stage::Correct))?;
                cache.masked = Some(mask_stage(&corrected.heights, &params.mask, source, frame)?);
            }
            Stage::Done => {}
        }
        Ok(())
    }

    /// 反复前进直到下一个阶段不早于 `target`.
    pub fn run_to<O: StageObserver>(&mut self, target: Stage, observer: &mut O) -> PeelResult<Stage> {
        while self.stage < target {
            self.advance(observer)?;
        }
        Ok(self.stage)
    }

    /// 回退一个阶段, 丢弃该阶段及其下游的结果.
    ///
    /// # 返回值
    ///
    /// 回退后的阶段. 已经在 `Scan` 时什么也不丢弃.
    pub fn back(&mut self) -> Stage {
        if self.stage == Stage::Scan {
            return self.stage;
        }
        self.stage = self.stage.prev();
        self.cache.discard_from(self.stage);
        debug!("back to {}", self.stage);
        self.stage
    }

    /// 替换一组参数, 并回退到受影响的最早阶段 (若当前阶段更早, 则保持不变).
    ///
    /// # 返回值
    ///
    /// 回退后的阶段. 参数非法时返回 `InvalidParameter`, 会话不变.
    pub fn apply(&mut self, event: ParamEvent) -> PeelResult<Stage> {
        let target = event.invalidates();
        match event {
            ParamEvent::Preprocess(p) => {
                p.validate()?;
                self.source.channel(p.frame, p.channel)?;
                self.params.preprocess = p;
                self.cache.resliced = None;
            }
            ParamEvent::Scan(p) => {
                p.validate()?;
                self.params.scan = p;
            }
            ParamEvent::Correct(p) => {
                p.validate()?;
                self.params.correct = p;
            }
            ParamEvent::Mask(p) => {
                p.validate()?;
                self.params.mask = p;
            }
            ParamEvent::Keep(k) => self.keep = k,
        }
        if let Some(target) = target {
            self.cache.discard_from(target);
            self.stage = self.stage.min(target);
        }
        Ok(self.stage)
    }

    /// 确认当前结果: 执行剩余阶段, 然后返回本帧的完整输出.
    pub fn confirm<O: StageObserver>(&mut self, observer: &mut O) -> PeelResult<FrameOutput> {
        self.run_to(Stage::Done, observer)?;
        let c = &self.cache;
        match (c.threshold, &c.corrected, &c.maps, &c.masked) {
            (Some(threshold), Some(corrected), Some(maps), Some(masked)) => Ok(FrameOutput {
                frame: self.params.preprocess.frame,
                threshold,
                heights: corrected.heights.clone(),
                height_map: maps.0.clone(),
                area_map: maps.1.clone(),
                mask: masked.0.clone(),
                peeled: masked.1.clone(),
                projection: masked.2.clone(),
            }),
            _ => Err(missing(Stage::Mask)),
        }
    }

    /// 以确认后的参数处理整个时间序列. 会话必须已到达 `Done`.
    pub fn run_series(&self) -> PeelResult<SeriesOutput> {
        if self.stage != Stage::Done {
            return Err(PeelError::invalid(
                "stage",
                format!("series needs a confirmed session, currently at {}", self.stage),
            ));
        }
        run_series(self.source, &self.params, &self.keep, &self.budget, &self.cancel)
    }
}

#[inline]
fn missing(stage: Stage) -> PeelError {
    PeelError::invalid("stage", format!("{stage} has not been run"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::Calibration;
    use crate::error::Guidance;
    use crate::filter::Smoothing;
    use crate::threshold::Threshold;
    use ndarray::Array5;

    /// 表面位于 `z = 4 + x % 3` 的合成超栈, 形状 (t, 2, 16, 6, 8).
    /// 通道 0 在表面以下为 1000, 通道 1 为与坐标相关的强度.
    pub(crate) fn synthetic(frames: usize) -> Hyperstack {
        // 第 t 帧的表面整体下移 t 层, 各帧结果互不相同.
        let data = Array5::from_shape_fn((frames, 2, 16, 6, 8), |(t, c, z, y, x)| {
            if c == 0 {
                if z >= 4 + x % 3 + t {
                    1000.0
                } else {
                    0.0
                }
            } else {
                (z * 7 + y * 3 + x) as f32
            }
        });
        let cal = Calibration::new(0.5, 0.5, 2.0).unwrap();
        Hyperstack::new(data, cal).unwrap()
    }

    pub(crate) fn params() -> PeelParams {
        PeelParams {
            preprocess: PreprocessParams {
                smoothing: Smoothing::None,
                ..Default::default()
            },
            scan: ScanParams {
                threshold: Threshold::Fixed(500.0),
                ..Default::default()
            },
            mask: MaskParams {
                thickness: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 记录完成的阶段.
    #[derive(Default)]
    struct Recorder(Vec<Stage>);

    impl StageObserver for Recorder {
        fn stage_finished(&mut self, stage: Stage, session: &Session<'_>) {
            assert_eq!(session.stage(), stage.next());
            self.0.push(stage);
        }
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Scan.next(), Stage::Correct);
        assert_eq!(Stage::Done.next(), Stage::Done);
        assert_eq!(Stage::Correct.prev(), Stage::Scan);
        assert_eq!(Stage::Scan.prev(), Stage::Scan);
        assert!(Stage::Map < Stage::Mask);
        assert_eq!(Stage::Mask.to_string(), "mask");
    }

    #[test]
    fn test_session_runs_all_stages() {
        let stack = synthetic(1);
        let mut session = Session::new(&stack, params()).unwrap();
        let mut rec = Recorder::default();
        let out = session.confirm(&mut rec).unwrap();
        assert_eq!(
            rec.0,
            vec![Stage::Scan, Stage::Correct, Stage::Map, Stage::Mask]
        );
        assert_eq!(session.stage(), Stage::Done);
        assert_eq!(out.threshold, 500.0);
        for x in 0..8 {
            assert_eq!(out.heights.row(2)[x], (4 + x % 3) as f32);
        }
        // 高度图以深度间距标定.
        assert_eq!(out.height_map.data()[(0, 0)], 8.0);
        assert_eq!(out.peeled.dim(), (2, 16, 6, 8));
        assert_eq!(out.projection.dim(), (2, 6, 8));

        let direct = run_frame(
            &stack,
            0,
            session.params(),
            &WorkBudget::unlimited(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(direct, out);
    }

    #[test]
    fn test_back_discards_downstream() {
        let stack = synthetic(1);
        let mut session = Session::new(&stack, params()).unwrap();
        assert_eq!(session.run_to(Stage::Mask, &mut ()).unwrap(), Stage::Mask);
        assert!(session.height_map().is_some());

        assert_eq!(session.back(), Stage::Map);
        assert!(session.height_map().is_none());
        assert!(session.corrected().is_some());
        assert!(session.raw_profile().is_some());

        assert_eq!(session.back(), Stage::Correct);
        assert!(session.corrected().is_none());
        assert!(session.raw_profile().is_some());

        assert_eq!(session.back(), Stage::Scan);
        assert!(session.raw_profile().is_none());
        assert!(session.resliced().is_some());
        assert_eq!(session.back(), Stage::Scan);
    }

    #[test]
    fn test_apply_rewinds_to_affected_stage() {
        let stack = synthetic(1);
        let mut session = Session::new(&stack, params()).unwrap();
        session.run_to(Stage::Done, &mut ()).unwrap();

        let mask = MaskParams {
            thickness: 5,
            ..session.params().mask
        };
        assert_eq!(session.apply(ParamEvent::Mask(mask)).unwrap(), Stage::Mask);
        assert!(session.mask().is_none());
        assert!(session.height_map().is_some());

        let keep = KeepOutputs {
            height_map: true,
            ..Default::default()
        };
        assert_eq!(session.apply(ParamEvent::Keep(keep)).unwrap(), Stage::Mask);

        let correct = CorrectParams {
            hole_removal: false,
            ..Default::default()
        };
        assert_eq!(
            session.apply(ParamEvent::Correct(correct)).unwrap(),
            Stage::Correct
        );
        assert!(session.corrected().is_none());
        assert!(session.raw_profile().is_some());

        // 当前阶段已早于掩膜阶段, 不再回退.
        assert_eq!(
            session.apply(ParamEvent::Mask(MaskParams::default())).unwrap(),
            Stage::Correct
        );

        let pre = session.params().preprocess;
        assert_eq!(session.apply(ParamEvent::Preprocess(pre)).unwrap(), Stage::Scan);
        assert!(session.resliced().is_none());

        let bad = MaskParams {
            thickness: -2,
            ..Default::default()
        };
        assert!(session.apply(ParamEvent::Mask(bad)).is_err());
        assert_eq!(session.params().mask, MaskParams::default());
    }

    #[test]
    fn test_cancel_rewinds_and_keeps_upstream() {
        let stack = synthetic(1);
        let mut session = Session::new(&stack, params()).unwrap();
        session.run_to(Stage::Map, &mut ()).unwrap();
        let raw = session.raw_profile().cloned();

        session.cancel_token().cancel();
        let err = session.advance(&mut ()).unwrap_err();
        assert_eq!(
            err,
            PeelError::UserAbort {
                resume_at: Stage::Correct
            }
        );
        assert_eq!(session.stage(), Stage::Correct);
        assert!(session.corrected().is_none());
        assert_eq!(session.raw_profile().cloned(), raw);

        // 取消请求已被消费, 可以继续.
        assert_eq!(session.advance(&mut ()).unwrap(), Stage::Map);
    }

    #[test]
    fn test_budget_exhaustion_is_recoverable() {
        let stack = synthetic(1);
        let mut session = Session::new(&stack, params())
            .unwrap()
            .with_budget(WorkBudget::new(64));
        let err = session.advance(&mut ()).unwrap_err();
        assert!(err.is_recoverable());
        let PeelError::ResourceExhausted {
            stage, guidance, ..
        } = err
        else {
            panic!("expected resource exhaustion");
        };
        assert_eq!(stage, "scan");
        assert_eq!(guidance[0], Guidance::ReducePrecision);
        assert_eq!(session.stage(), Stage::Scan);
        assert_eq!(session.budget().in_use(), 0);
    }

    #[test]
    fn test_run_frame_cancel_before_start() {
        let stack = synthetic(1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_frame(&stack, 0, &params(), &WorkBudget::unlimited(), &cancel).unwrap_err();
        assert_eq!(
            err,
            PeelError::UserAbort {
                resume_at: Stage::Scan
            }
        );
    }

    #[test]
    fn test_degenerate_frame_reports_error() {
        let stack = synthetic(1);
        let mut p = params();
        p.preprocess.channel = 1;
        p.scan.threshold = Threshold::Fixed(60000.0);
        let mut session = Session::new(&stack, p).unwrap();
        let err = session.advance(&mut ()).unwrap_err();
        assert!(matches!(err, PeelError::DegenerateInput { frame: 0, .. }));
        assert!(session.raw_profile().is_none());
        assert_eq!(session.stage(), Stage::Scan);
    }
}
