//! 参数变更事件, 阶段观察者与取消令牌.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::series::KeepOutputs;
use super::{Session, Stage};
use crate::correct::CorrectParams;
use crate::mask::MaskParams;
use crate::preprocess::PreprocessParams;
use crate::scan::ScanParams;

/// 一次参数组变更. 由界面层在用户修改参数后发给 [`Session::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamEvent {
    /// 预处理参数变更, 回退到扫描阶段并丢弃工作栈.
    Preprocess(PreprocessParams),

    /// 扫描参数变更, 回退到扫描阶段.
    Scan(ScanParams),

    /// 修正参数变更, 回退到修正阶段.
    Correct(CorrectParams),

    /// 掩膜参数变更, 回退到掩膜阶段.
    Mask(MaskParams),

    /// 时间序列保留项变更, 不回退.
    Keep(KeepOutputs),
}

impl ParamEvent {
    /// 该事件使之失效的最早阶段. `None` 表示不影响任何阶段.
    pub fn invalidates(&self) -> Option<Stage> {
        match self {
            ParamEvent::Preprocess(_) | ParamEvent::Scan(_) => Some(Stage::Scan),
            ParamEvent::Correct(_) => Some(Stage::Correct),
            ParamEvent::Mask(_) => Some(Stage::Mask),
            ParamEvent::Keep(_) => None,
        }
    }
}

/// 阶段完成回调. 可用于刷新预览.
pub trait StageObserver {
    /// `stage` 刚刚完成, 其结果已缓存在 `session` 中.
    fn stage_finished(&mut self, stage: Stage, session: &Session<'_>);
}

/// 不做任何事.
impl StageObserver for () {
    #[inline]
    fn stage_finished(&mut self, _: Stage, _: &Session<'_>) {}
}

/// 取消令牌. 可以被克隆到界面线程; 流程只在阶段之间 (以及帧之间) 检查它.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// 新的未取消令牌.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// 是否已请求取消.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 清除取消请求, 返回清除前的状态.
    #[inline]
    pub fn reset(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancelToken::new();
        let ui = token.clone();
        assert!(!token.is_cancelled());
        std::thread::spawn(move || ui.cancel()).join().unwrap();
        assert!(token.is_cancelled());
        assert!(token.reset());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_invalidated_stage() {
        assert_eq!(
            ParamEvent::Scan(ScanParams::default()).invalidates(),
            Some(Stage::Scan)
        );
        assert_eq!(
            ParamEvent::Mask(MaskParams::default()).invalidates(),
            Some(Stage::Mask)
        );
        assert_eq!(ParamEvent::Keep(KeepOutputs::default()).invalidates(), None);
    }
}
