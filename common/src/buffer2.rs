//! Dense row-major 2D buffer.
//!
//! Element `(x, y)` lives at flat index `y * width + x`. Rows are contiguous,
//! which is what the row-parallel constructors rely on.

use std::ops::{Index, IndexMut};

use rayon::prelude::*;

/// Offsets of the 8-connected neighbourhood, row above first.
pub const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    values: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Buffer2<T> {
    pub fn new(width: usize, height: usize, values: Vec<T>) -> Self {
        assert_eq!(
            values.len(),
            width * height,
            "values length must equal width * height"
        );
        Self {
            values,
            width,
            height,
        }
    }

    /// Build a buffer by evaluating `f(x, y)` for every element, row by row.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            values,
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        debug_assert!(x < self.width && y < self.height);
        &self.values[y * self.width + x]
    }

    /// Checked access with signed coordinates; `None` outside the buffer.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize) -> Option<&T> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(&self.values[y as usize * self.width + x as usize])
    }

    #[inline]
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn coords_of(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn map<U, F>(&self, f: F) -> Buffer2<U>
    where
        F: FnMut(&T) -> U,
    {
        Buffer2 {
            values: self.values.iter().map(f).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// Element-wise combination of two equally sized buffers.
    pub fn zip_with<U, V, F>(&self, other: &Buffer2<U>, mut f: F) -> Buffer2<V>
    where
        F: FnMut(&T, &U) -> V,
    {
        assert_eq!(self.width, other.width, "width mismatch");
        assert_eq!(self.height, other.height, "height mismatch");
        Buffer2 {
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Send> Buffer2<T> {
    /// Row-parallel counterpart of [`Buffer2::from_fn`].
    ///
    /// `f(y, row)` fills row `y`. Each row is written by exactly one task, so
    /// the result does not depend on scheduling.
    pub fn par_from_rows<F>(width: usize, height: usize, f: F) -> Self
    where
        T: Default + Clone,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        let mut values = vec![T::default(); width * height];
        if width > 0 {
            values
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| f(y, row));
        }
        Self {
            values,
            width,
            height,
        }
    }
}

impl<T: Default + Clone> Buffer2<T> {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self {
            values: vec![T::default(); width * height],
            width,
            height,
        }
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.values[y * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.values[y * self.width + x]
    }
}

impl<T> Index<usize> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.values[idx]
    }
}

impl<T> IndexMut<usize> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.values[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_is_row_major() {
        let buf = Buffer2::from_fn(3, 2, |x, y| x + 10 * y);
        assert_eq!(buf.values(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(buf[(2, 1)], 12);
        assert_eq!(buf.coords_of(4), (1, 1));
    }

    #[test]
    fn par_from_rows_matches_serial() {
        let serial = Buffer2::from_fn(37, 11, |x, y| (x * 31 + y * 7) as f64);
        let parallel = Buffer2::<f64>::par_from_rows(37, 11, |y, row| {
            for (x, v) in row.iter_mut().enumerate() {
                *v = (x * 31 + y * 7) as f64;
            }
        });
        assert_eq!(serial, parallel);
    }

    #[test]
    fn get_signed_rejects_out_of_bounds() {
        let buf = Buffer2::from_fn(2, 2, |x, y| (x + 2 * y) as i32);
        assert_eq!(buf.get_signed(-1, 0), None);
        assert_eq!(buf.get_signed(0, 2), None);
        assert_eq!(buf.get_signed(1, 1), Some(&3));
        assert!(NEIGHBORS_8
            .iter()
            .all(|&(dx, dy)| buf.get_signed(dx, dy).is_none() == (dx < 0 || dy < 0)));
    }

    #[test]
    fn zip_with_combines_elementwise() {
        let a = Buffer2::from_fn(2, 2, |x, y| (x + y) as f64);
        let b = Buffer2::from_fn(2, 2, |_, _| 0.5);
        let c = a.zip_with(&b, |p, q| p + q);
        assert_eq!(c.values(), &[0.5, 1.5, 1.5, 2.5]);
    }

    #[test]
    #[should_panic(expected = "values length must equal width * height")]
    fn new_rejects_wrong_length() {
        let _ = Buffer2::new(3, 3, vec![0.0f32; 8]);
    }
}
