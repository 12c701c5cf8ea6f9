//! 运行时错误.

use std::fmt;

use crate::pipeline::Stage;

/// 资源不足时给调用方的补救建议. 排列顺序即建议尝试的顺序.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Guidance {
    /// 以 8-bit 而不是 16-bit 处理.
    ReducePrecision,

    /// 裁剪或缩放图像.
    Crop,

    /// 换一个资源更充足的设备 (或放宽预算) 后重试.
    ChooseDevice,
}

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Guidance::ReducePrecision => "process as 8-bit",
            Guidance::Crop => "crop or scale the image",
            Guidance::ChooseDevice => "choose a different device",
        };
        f.write_str(s)
    }
}

/// 剥离流程中的运行时错误.
#[derive(Debug, Clone, PartialEq)]
pub enum PeelError {
    /// 工作内存不足以容纳某阶段的数据. 该错误可恢复: 按 `guidance` 调整后重试即可.
    ResourceExhausted {
        /// 申请资源的阶段.
        stage: &'static str,

        /// 申请的字节数.
        requested: usize,

        /// 当前剩余的字节数.
        available: usize,

        /// 补救建议.
        guidance: Vec<Guidance>,
    },

    /// 整帧没有任何一列越过阈值, 无法从邻居推断表面.
    DegenerateInput {
        /// 帧索引.
        frame: usize,

        /// 具体原因.
        reason: String,
    },

    /// 用户取消. 会话已回退, `resume_at` 为下一次将要执行的阶段.
    UserAbort {
        /// 回退后的阶段.
        resume_at: Stage,
    },

    /// 参数非法.
    InvalidParameter {
        /// 参数名.
        name: &'static str,

        /// 非法原因.
        reason: String,
    },

    /// 通道或帧索引越界.
    IndexOutOfRange {
        /// 索引对象.
        what: &'static str,

        /// 给定索引.
        index: usize,

        /// 实际长度.
        len: usize,
    },

    /// 数据形状不一致.
    ShapeMismatch {
        /// 期望形状.
        expected: Vec<usize>,

        /// 实际形状.
        found: Vec<usize>,
    },
}

impl PeelError {
    /// 构造 `InvalidParameter`.
    #[inline]
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PeelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// 该错误是否可以通过调整资源后重试来恢复?
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PeelError::ResourceExhausted { .. } | PeelError::UserAbort { .. }
        )
    }
}

impl fmt::Display for PeelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeelError::ResourceExhausted {
                stage,
                requested,
                available,
                guidance,
            } => {
                write!(
                    f,
                    "stage `{stage}` needs {requested} bytes but only {available} are available"
                )?;
                if !guidance.is_empty() {
                    let hint = guidance
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", or ");
                    write!(f, "; try to {hint}")?;
                }
                Ok(())
            }
            PeelError::DegenerateInput { frame, reason } => {
                write!(f, "frame {frame} has no detectable surface: {reason}")
            }
            PeelError::UserAbort { resume_at } => {
                write!(f, "aborted by user, resuming at stage {resume_at}")
            }
            PeelError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter `{name}`: {reason}")
            }
            PeelError::IndexOutOfRange { what, index, len } => {
                write!(f, "{what} index {index} out of range (len {len})")
            }
            PeelError::ShapeMismatch { expected, found } => {
                write!(f, "shape mismatch: expected {expected:?}, found {found:?}")
            }
        }
    }
}

impl std::error::Error for PeelError {}

/// 剥离流程运行时结果.
pub type PeelResult<T> = Result<T, PeelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_message_lists_guidance() {
        let e = PeelError::ResourceExhausted {
            stage: "mask",
            requested: 10,
            available: 4,
            guidance: vec![Guidance::Crop, Guidance::ChooseDevice],
        };
        let msg = e.to_string();
        assert!(msg.contains("mask"));
        assert!(msg.contains("crop or scale the image, or choose a different device"));
        assert!(e.is_recoverable());
    }

    #[test]
    fn test_degenerate_not_recoverable() {
        let e = PeelError::DegenerateInput {
            frame: 2,
            reason: "empty".into(),
        };
        assert!(!e.is_recoverable());
        assert!(e.to_string().starts_with("frame 2"));
    }
}
