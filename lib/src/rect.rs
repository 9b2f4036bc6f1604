use crate::Coord;

/// Axis-aligned bounding rectangle of a subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct Rect {
    pub lower: Vec<Coord>,
    pub upper: Vec<Coord>,
}

impl Rect {
    /// The empty rectangle: expanding it by anything yields that thing.
    pub fn empty(dimensions: usize) -> Rect {
        Rect {
            lower: vec![Coord::MAX; dimensions],
            upper: vec![Coord::MIN; dimensions],
        }
    }

    pub fn point(point: &[Coord]) -> Rect {
        Rect {
            lower: point.to_vec(),
            upper: point.to_vec(),
        }
    }

    pub fn expand(&mut self, other: &Rect) {
        for (lo, o) in self.lower.iter_mut().zip(&other.lower) {
            *lo = lo.min(*o);
        }
        for (hi, o) in self.upper.iter_mut().zip(&other.upper) {
            *hi = hi.max(*o);
        }
    }

    pub fn intersects(&self, lower: &[Coord], upper: &[Coord]) -> bool {
        self.lower
            .iter()
            .zip(&self.upper)
            .zip(lower.iter().zip(upper))
            .all(|((lo, hi), (qlo, qhi))| lo <= qhi && qlo <= hi)
    }

    /// Overlap test restricted to one dimension.
    pub fn intersects_on(&self, dimension: usize, lower: Coord, upper: Coord) -> bool {
        self.lower[dimension] <= upper && lower <= self.upper[dimension]
    }

    pub fn contains(&self, point: &[Coord]) -> bool {
        self.lower
            .iter()
            .zip(&self.upper)
            .zip(point)
            .all(|((lo, hi), v)| lo <= v && v <= hi)
    }

    pub fn center(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| (f64::from(*lo) + f64::from(*hi)) / 2.0)
            .collect()
    }

    /// Sum of side lengths.
    pub fn margin(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| (f64::from(*hi) - f64::from(*lo)).max(0.0))
            .sum()
    }

    /// Growth in margin if `other` were added to this rectangle.
    pub fn enlargement(&self, other: &Rect) -> f64 {
        let mut grown = self.clone();
        grown.expand(other);
        grown.margin() - self.margin()
    }

    pub fn center_distance(&self, other: &Rect) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .zip(other.lower.iter().zip(&other.upper))
            .map(|((lo, hi), (olo, ohi))| {
                let a = (f64::from(*lo) + f64::from(*hi)) / 2.0;
                let b = (f64::from(*olo) + f64::from(*ohi)) / 2.0;
                (a - b).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }
}
