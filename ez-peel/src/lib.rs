#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从共聚焦显微 z-stack 中提取表皮表面, 生成高度图与面积图,
//! 并按固定厚度剥离表皮.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 超栈按 (t, c, z, h, w) 组织. 分割在重切片后的 (切片 = h, 深度 = z, 列 = w)
//!   工作栈上进行, 表面被定义为每一列自上而下第一个严格大于阈值的体素.
//! 2. 各阶段只借用上游结果并返回新的输出; 原始超栈在整个流程中只读.
//! 3. 参数非法、资源不足、用户取消等情况均以 [`error::PeelError`] 返回, 不会 panic.
//!
//! # 开发计划
//!
//! ### 工作栈与深度切片 ✅
//!
//! 量化到 8/16-bit, 平滑, 重切片, 边缘增强.
//!
//! 实现位于 `ez-peel/src/data` 与 `ez-peel/src/preprocess.rs`.
//!
//! ### 阈值与逐列扫描 ✅
//!
//! Otsu 或固定阈值. 扫描空缺沿折线线性插值, 可选折线重采样.
//!
//! 实现位于 `ez-peel/src/scan`.
//!
//! ### 高度图修正 ✅
//!
//! 离散度图 -> 排除区域 (两次 3x3 腐蚀) -> 逐级高斯填补.
//!
//! 实现位于 `ez-peel/src/correct.rs`.
//!
//! ### 高度图与面积图 ✅
//!
//! 实现位于 `ez-peel/src/maps.rs`.
//!
//! ### 掩膜 ✅
//!
//! 1. 多边形模式: 逐切片栅格化表面以下的定厚带. ✅
//! 2. 腐蚀模式: 对表面以下的实体做两次三维椭球腐蚀, 取差集. ✅
//!
//! 实现位于 `ez-peel/src/mask`.
//!
//! ### 交互式会话与时间序列 ✅
//!
//! 阶段回退, 参数变更失效, 取消, 工作内存预算.
//!
//! 实现位于 `ez-peel/src/pipeline`.
//!
//! ### 完善代码文档 ✅

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 超栈与工作栈基础数据结构.
mod data;

pub use data::{
    BitDepth, Calibrated, Calibration, DepthSlice, DepthSliceMut, DisplayWindow, Hyperstack,
    ImgWriteRaw, ImgWriteVis, NpyWrite, ReslicedStack,
};

pub mod consts;

pub mod error;

pub mod filter;

pub mod preprocess;
pub mod threshold;

pub mod scan;

pub mod correct;
pub mod maps;
pub mod mask;

pub mod pipeline;
pub mod prelude;
