//! 表面折线: 冗余压缩, 等弧长插值, 逐列稠密化.

use itertools::Itertools;

/// 一个深度切片上的表面折线, 顶点按 x 单调不减排列.
///
/// 折线从 `x = 0` 开始, 到 `x = width` 结束 (注意不是 `width - 1`),
/// 因此稠密化后正好覆盖 `0..width` 的每一列.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Polyline {
    /// 由逐列扫描结果构建冗余压缩后的折线.
    ///
    /// 首尾顶点总是保留; 内部的列只有在与左右邻居不全相等时才保留.
    /// 内部未越过阈值的列不成为顶点, 其高度留给相邻顶点之间的线性插值;
    /// 与空缺相邻的已解析列总会因为 "与邻居不全相等" 而被保留.
    /// 首尾顶点若未解析, 分别取最近的已解析顶点的高度.
    ///
    /// # 返回值
    ///
    /// 没有任何一列被解析 (含空输入) 时返回 `None`.
    pub fn from_scan(raw: &[Option<usize>]) -> Option<Self> {
        let (&first, &last) = (raw.first()?, raw.last()?);
        let mut vertices = vec![(0.0, first)];
        for (x, (l, c, r)) in raw.iter().tuple_windows().enumerate() {
            if !(l == c && c == r) && c.is_some() {
                vertices.push(((x + 1) as f64, *c));
            }
        }
        vertices.push((raw.len() as f64, last));

        let head = vertices.iter().find_map(|v| v.1)?;
        let tail = vertices.iter().rev().find_map(|v| v.1)?;
        let (xs, ys): (Vec<f64>, Vec<f64>) = vertices
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let fallback = if i == 0 { head } else { tail };
                (x, y.unwrap_or(fallback) as f64)
            })
            .unzip();
        Some(Self { xs, ys })
    }

    /// 顶点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// 是否没有顶点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// 顶点 x 坐标.
    #[inline]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// 顶点 y (深度) 坐标.
    #[inline]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// 折线总长度.
    pub fn length(&self) -> f64 {
        self.points()
            .tuple_windows()
            .map(|((x0, y0), (x1, y1))| (x1 - x0).hypot(y1 - y0))
            .sum()
    }

    #[inline]
    fn points(&self) -> impl Iterator<Item = (f64, f64)> + Clone + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    /// 三点滑动平均平滑内部顶点, 首尾不变.
    pub fn smoothed(&self) -> Self {
        let n = self.len();
        if n < 3 {
            return self.clone();
        }
        let avg = |v: &[f64], i: usize| (v[i - 1] + v[i] + v[i + 1]) / 3.0;
        let mut out = self.clone();
        for i in 1..n - 1 {
            out.xs[i] = avg(&self.xs, i);
            out.ys[i] = avg(&self.ys, i);
        }
        out
    }

    /// 等弧长重采样, 相邻顶点沿折线的距离为 `interval`, 末顶点保留.
    /// 若 `smooth` 为 `true`, 则先做三点平滑.
    ///
    /// 重采样后第一个顶点的 x 被强制为 0, 最后一个被强制为原折线末端的 x.
    ///
    /// `interval` 必须为正, 否则原样返回.
    pub fn interpolated(&self, interval: f64, smooth: bool) -> Self {
        if !(interval > 0.0) || self.len() < 2 {
            return self.clone();
        }
        let src = if smooth { self.smoothed() } else { self.clone() };
        let total = src.length();
        let end_x = self.xs[self.len() - 1];

        let mut xs = vec![src.xs[0]];
        let mut ys = vec![src.ys[0]];
        let mut next = interval;
        let mut walked = 0.0;
        for ((x0, y0), (x1, y1)) in src.points().tuple_windows() {
            let seg = (x1 - x0).hypot(y1 - y0);
            while seg > 0.0 && next <= walked + seg && next < total {
                let t = (next - walked) / seg;
                xs.push(x0 + (x1 - x0) * t);
                ys.push(y0 + (y1 - y0) * t);
                next += interval;
            }
            walked += seg;
        }
        xs.push(src.xs[src.len() - 1]);
        ys.push(src.ys[src.len() - 1]);

        xs[0] = 0.0;
        let last = xs.len() - 1;
        xs[last] = end_x;
        Self { xs, ys }
    }

    /// 折线经过的每个整数列的高度, 长度为 `width`.
    ///
    /// 每段取其覆盖的整数 x, 高度取线性插值后四舍五入; 按 x 稳定排序后,
    /// 同一 x 只保留第一个点. 超出 `width` 的部分被截断.
    pub fn densify(&self, width: usize) -> Vec<f32> {
        let mut points: Vec<(usize, f64)> = Vec::with_capacity(width + self.len());
        if self.len() == 1 {
            points.push((self.xs[0].max(0.0) as usize, self.ys[0].round()));
        }
        for ((x0, y0), (x1, y1)) in self.points().tuple_windows() {
            let (lo, hi) = (x0.min(x1).max(0.0).ceil(), x0.max(x1).floor());
            if lo > hi {
                continue;
            }
            for x in (lo as usize)..=(hi as usize) {
                let y = if x1 == x0 {
                    y0
                } else {
                    y0 + (y1 - y0) * (x as f64 - x0) / (x1 - x0)
                };
                points.push((x, y.round()));
            }
        }
        points.sort_by_key(|p| p.0);
        points.dedup_by_key(|p| p.0);

        let mut dense = Vec::with_capacity(width);
        let mut it = points.into_iter().peekable();
        let mut last = None;
        for x in 0..width {
            while let Some(&(px, py)) = it.peek() {
                if px > x {
                    break;
                }
                if px == x {
                    last = Some(py);
                }
                it.next();
            }
            // 折线未覆盖的列沿用左侧最近的值, 最左端则借用第一个点.
            let y = last.or_else(|| it.peek().map(|p| p.1)).unwrap_or(0.0);
            dense.push(y as f32);
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 全部列都已解析的折线.
    fn resolved(heights: &[usize]) -> Polyline {
        let raw: Vec<_> = heights.iter().map(|h| Some(*h)).collect();
        Polyline::from_scan(&raw).unwrap()
    }

    #[test]
    fn test_compression_keeps_changes_and_ends() {
        let h = [5, 5, 5, 7, 7, 7, 7, 4];
        let p = resolved(&h);
        assert_eq!(p.xs(), &[0.0, 2.0, 3.0, 6.0, 8.0]);
        assert_eq!(p.ys(), &[5.0, 5.0, 7.0, 7.0, 4.0]);
    }

    #[test]
    fn test_interior_gap_is_interpolated() {
        let raw = [Some(2), None, None, Some(8), Some(8), Some(8), Some(8), Some(8)];
        let p = Polyline::from_scan(&raw).unwrap();
        assert_eq!(p.xs(), &[0.0, 3.0, 8.0]);
        assert_eq!(p.ys(), &[2.0, 8.0, 8.0]);
        assert_eq!(
            p.densify(raw.len()),
            vec![2.0, 4.0, 6.0, 8.0, 8.0, 8.0, 8.0, 8.0]
        );
    }

    #[test]
    fn test_unresolved_ends_borrow_nearest_vertex() {
        let raw = [None, None, Some(4), Some(4), None];
        let p = Polyline::from_scan(&raw).unwrap();
        assert_eq!(p.xs(), &[0.0, 2.0, 3.0, 5.0]);
        assert_eq!(p.ys(), &[4.0, 4.0, 4.0, 4.0]);
        assert_eq!(p.densify(5), vec![4.0; 5]);

        let p = Polyline::from_scan(&[Some(2), None, Some(4), None, None]).unwrap();
        assert_eq!(p.densify(5), vec![2.0, 3.0, 4.0, 4.0, 4.0]);

        assert_eq!(Polyline::from_scan(&[None, None]), None);
        assert_eq!(Polyline::from_scan(&[]), None);
    }

    #[test]
    fn test_flat_is_two_vertices() {
        let p = resolved(&[3; 6]);
        assert_eq!(p.xs(), &[0.0, 6.0]);
        assert_eq!(p.densify(6), vec![3.0; 6]);
    }

    #[test]
    fn test_densify_interpolates_between_vertices() {
        let p = Polyline {
            xs: vec![0.0, 4.0, 6.0],
            ys: vec![0.0, 8.0, 8.0],
        };
        assert_eq!(p.densify(6), vec![0.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
    }

    #[test]
    fn test_densify_round_trip_of_compression() {
        let h = [2, 3, 9, 9, 9, 1, 0, 0, 4, 4];
        let dense = resolved(&h).densify(h.len());
        let expected: Vec<f32> = h.iter().map(|v| *v as f32).collect();
        assert_eq!(dense, expected);
    }

    /// 末顶点位于 `x = width`, 最后一列本身不是顶点, 其高度由插值得到.
    #[test]
    fn test_last_column_is_interpolated() {
        let dense = resolved(&[0, 0, 0, 4]).densify(4);
        assert_eq!(dense, vec![0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_interpolated_endpoints_pinned() {
        let h: Vec<usize> = (0..40).map(|x| if x % 2 == 0 { 10 } else { 12 }).collect();
        let p = resolved(&h).interpolated(8.0, true);
        assert_eq!(p.xs()[0], 0.0);
        assert_eq!(*p.xs().last().unwrap(), 40.0);
        assert!(p.len() < 41);
        let dense = p.densify(40);
        assert_eq!(dense.len(), 40);
        assert!(dense.iter().all(|y| (10.0..=12.0).contains(y)));
    }

    #[test]
    fn test_interval_non_positive_is_identity() {
        let p = resolved(&[1, 2, 3]);
        assert_eq!(p.interpolated(0.0, false), p);
    }
}
