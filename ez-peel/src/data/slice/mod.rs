//! 深度切片对象的操作.

mod core;
mod iter;
mod save;

pub use core::{DepthSlice, DepthSliceMut};

pub use iter::PosIter;

pub use save::{ImgWriteRaw, ImgWriteVis, NpyWrite};
