//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    BitDepth, Calibrated, Calibration, DepthSlice, DepthSliceMut, DisplayWindow, Hyperstack,
    ImgWriteRaw, ImgWriteVis, NpyWrite, ReslicedStack,
};

pub use crate::error::{Guidance, PeelError, PeelResult};

pub use crate::filter::{EdgeFilter, Smoothing};
pub use crate::preprocess::PreprocessParams;
pub use crate::threshold::Threshold;

pub use crate::correct::{CorrectParams, DivergenceThreshold};
pub use crate::maps::{AreaMap, HeightMap};
pub use crate::mask::{MaskMode, MaskParams, MaskVolume};
pub use crate::scan::{HeightProfile, Interpolation, ScanParams};

pub use crate::pipeline::{
    run_frame, run_series, CancelToken, FrameOutput, KeepOutputs, ParamEvent, PeelParams,
    Session, SeriesOutput, Stage, StageObserver, WorkBudget,
};
