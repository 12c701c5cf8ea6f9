use crate::Idx2d;

/// 行优先索引迭代器.
///
/// 内部只记录线性游标, 因此可以精确报告剩余长度,
/// 供 `collect` 等操作预分配空间.
#[derive(Debug, Clone)]
pub struct PosIter {
    cur: usize,
    end: usize,
    w: usize,
}

impl PosIter {
    /// 创建迭代 `(h, w)` 图像全部索引的迭代器.
    #[inline]
    pub fn new((h, w): Idx2d) -> Self {
        Self {
            cur: 0,
            end: h * w,
            w,
        }
    }
}

impl Iterator for PosIter {
    type Item = Idx2d;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == self.end {
            return None;
        }
        let ret_pos = (self.cur / self.w, self.cur % self.w);
        self.cur += 1;
        Some(ret_pos)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.cur;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PosIter {}

#[cfg(test)]
mod completeness_tests {
    use super::PosIter;
    use crate::Idx2d;

    fn pos_iter_builtin((h, w): Idx2d) -> impl Iterator<Item = Idx2d> {
        (0..h).flat_map(move |first| (0..w).map(move |second| (first, second)))
    }

    #[test]
    fn test_pos_iter() {
        for i in 0..=4 {
            for j in 0..=4 {
                let tup = (i, j);
                assert!(Iterator::eq(pos_iter_builtin(tup), PosIter::new(tup)));
            }
        }
    }

    #[test]
    fn test_exact_len() {
        let mut it = PosIter::new((3, 5));
        assert_eq!(it.len(), 15);
        it.nth(6);
        assert_eq!(it.len(), 8);
        assert_eq!(PosIter::new((0, 7)).len(), 0);
    }
}
