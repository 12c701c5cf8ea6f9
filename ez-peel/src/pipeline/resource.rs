//! 工作内存预算.

use std::cell::Cell;

use log::debug;

use crate::data::BitDepth;
use crate::error::{Guidance, PeelError, PeelResult};

/// 工作内存预算. 每个阶段执行前按估计的字节数申请一份 [`Lease`],
/// 阶段返回时 `Lease` 被丢弃, 字节随之归还.
///
/// 预算只在单线程编排中使用, 不可跨线程共享.
#[derive(Debug)]
pub struct WorkBudget {
    limit: Option<usize>,
    in_use: Cell<usize>,
}

impl Default for WorkBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl WorkBudget {
    /// 最多 `limit` 字节的预算.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            in_use: Cell::new(0),
        }
    }

    /// 不限量的预算.
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            in_use: Cell::new(0),
        }
    }

    /// 上限. 不限量时为 `None`.
    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// 已被借出的字节数.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    /// 剩余可借字节数.
    #[inline]
    pub fn available(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |l| l.saturating_sub(self.in_use()))
    }

    /// 为 `stage` 申请 `bytes` 字节.
    ///
    /// # 返回值
    ///
    /// 剩余不足时返回 `ResourceExhausted`. 补救建议依次为: 降低精度 (仅 16-bit 时),
    /// 裁剪图像, 更换设备.
    pub fn acquire(
        &self,
        stage: &'static str,
        bytes: usize,
        precision: BitDepth,
    ) -> PeelResult<Lease<'_>> {
        let available = self.available();
        if bytes > available {
            let mut guidance = Vec::with_capacity(3);
            if precision == BitDepth::Sixteen {
                guidance.push(Guidance::ReducePrecision);
            }
            guidance.push(Guidance::Crop);
            guidance.push(Guidance::ChooseDevice);
            return Err(PeelError::ResourceExhausted {
                stage,
                requested: bytes,
                available,
                guidance,
            });
        }
        self.in_use.set(self.in_use() + bytes);
        debug!("{stage}: leased {bytes} bytes ({} in use)", self.in_use());
        Ok(Lease {
            budget: self,
            bytes,
        })
    }
}

/// 一份借出的工作内存. 被丢弃时自动归还.
#[derive(Debug)]
#[must_use = "dropping a lease releases its bytes immediately"]
pub struct Lease<'a> {
    budget: &'a WorkBudget,
    bytes: usize,
}

impl Lease<'_> {
    /// 借出的字节数.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let b = self.budget;
        b.in_use.set(b.in_use().saturating_sub(self.bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_released_on_drop() {
        let budget = WorkBudget::new(100);
        {
            let a = budget.acquire("scan", 60, BitDepth::Eight).unwrap();
            assert_eq!(a.bytes(), 60);
            assert_eq!(budget.available(), 40);
            assert!(budget.acquire("mask", 41, BitDepth::Eight).is_err());
            let _b = budget.acquire("mask", 40, BitDepth::Eight).unwrap();
            assert_eq!(budget.available(), 0);
        }
        assert_eq!(budget.in_use(), 0);
        assert_eq!(budget.available(), 100);
    }

    #[test]
    fn test_guidance_order() {
        let budget = WorkBudget::new(10);
        let Err(PeelError::ResourceExhausted { guidance, .. }) =
            budget.acquire("scan", 11, BitDepth::Sixteen)
        else {
            panic!("expected resource exhaustion");
        };
        assert_eq!(
            guidance,
            vec![Guidance::ReducePrecision, Guidance::Crop, Guidance::ChooseDevice]
        );

        let Err(PeelError::ResourceExhausted { guidance, .. }) =
            budget.acquire("scan", 11, BitDepth::Eight)
        else {
            panic!("expected resource exhaustion");
        };
        assert_eq!(guidance, vec![Guidance::Crop, Guidance::ChooseDevice]);
    }

    #[test]
    fn test_unlimited() {
        let budget = WorkBudget::unlimited();
        let _l = budget.acquire("mask", usize::MAX / 2, BitDepth::Sixteen).unwrap();
        assert_eq!(budget.limit(), None);
    }
}
