//! 多边形扫描线填充.

use ndarray::ArrayViewMut2;

/// 以 (x, y) 顶点描述的闭合多边形. x 对应列, y 对应行 (深度).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    points: Vec<(f64, f64)>,
}

impl Polygon {
    /// 以顶点序列构建. 最后一个顶点自动与第一个相连.
    #[inline]
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// 剥离层多边形: 下边界为 `heights + offset`, 上边界再加 `thickness`.
    ///
    /// 每一列的顶点位于像素中心 `x + 0.5`, 两端另补 `x = 0` 与 `x = width` 的顶点,
    /// 使每一列都被完整覆盖.
    pub fn band<I>(heights: I, offset: f64, thickness: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut lower = Self::surface(heights, offset);
        let upper: Vec<_> = lower.iter().rev().map(|&(x, y)| (x, y + thickness)).collect();
        lower.extend(upper);
        Self::new(lower)
    }

    /// 从 `heights + offset` 一直延伸到 `bottom` 的多边形.
    pub fn to_bottom<I>(heights: I, offset: f64, bottom: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut points = Self::surface(heights, offset);
        if let (Some(&(first, _)), Some(&(last, _))) = (points.first(), points.last()) {
            points.push((last, bottom));
            points.push((first, bottom));
        }
        Self::new(points)
    }

    fn surface<I>(heights: I, offset: f64) -> Vec<(f64, f64)>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut points: Vec<_> = heights
            .into_iter()
            .enumerate()
            .map(|(x, h)| (x as f64 + 0.5, h + offset))
            .collect();
        let (Some(&(_, first)), Some(&(last_x, last))) = (points.first(), points.last()) else {
            return points;
        };
        points.insert(0, (0.0, first));
        points.push((last_x + 0.5, last));
        points
    }

    /// 顶点.
    #[inline]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// 以奇偶规则填充到 `image`, 在像素中心 `(row + 0.5, col + 0.5)` 处采样.
    /// 每条边的 y 范围为左闭右开, 所以相邻多边形共用的边不会被重复填充.
    ///
    /// # 返回值
    ///
    /// 被写入的像素个数.
    pub fn fill(&self, image: &mut ArrayViewMut2<f32>, value: f32) -> usize {
        let (h, w) = image.dim();
        let n = self.points.len();
        if n < 3 || w == 0 {
            return 0;
        }
        let mut crossings: Vec<f64> = Vec::with_capacity(n);
        let mut written = 0;
        for row in 0..h {
            let yc = row as f64 + 0.5;
            crossings.clear();
            for i in 0..n {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                // 列中心落在 [a, b) 内的列.
                let lo = (pair[0] - 0.5).ceil().max(0.0) as usize;
                let hi = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(w);
                for col in lo..hi {
                    image[(row, col)] = value;
                    written += 1;
                }
            }
        }
        written
    }
}
