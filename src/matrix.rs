//! Dense row-major matrix used for per-transition weights.
//!
//! `Matrix` keeps the flat layout the rest of the crate (and the on-disk
//! format) relies on: element `(i, j)` lives at `i * cols + j`. For a weight
//! matrix, `i` is the output neuron and `j` the input neuron.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix by calling `f(i, j)` for every element in row-major order.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    /// Wrap a flat row-major buffer with shape `(rows, cols)`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::InvalidData("matrix shape overflow".to_owned()))?;
        if data.len() != expected {
            return Err(Error::InvalidData(format!(
                "matrix data length {} does not match rows * cols ({rows} * {cols})",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Panics if `i >= rows` or `j >= cols`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.rows && j < self.cols, "index ({i}, {j}) out of bounds");
        self.data[i * self.cols + j]
    }

    /// Panics if `i >= rows` or `j >= cols`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(i < self.rows && j < self.cols, "index ({i}, {j}) out of bounds");
        self.data[i * self.cols + j] = value;
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// `self * x + bias`, one entry per row.
    pub(crate) fn affine(&self, x: &[f64], bias: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert_eq!(bias.len(), self.rows);

        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .zip(x)
                    .fold(bias[i], |acc, (&w, &xj)| w.mul_add(xj, acc))
            })
            .collect()
    }

    /// `selfᵀ * v`, one entry per column.
    pub(crate) fn transpose_mul(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.rows);

        let mut out = vec![0.0; self.cols];
        for (k, &vk) in v.iter().enumerate() {
            for (o, &w) in out.iter_mut().zip(self.row(k)) {
                *o = w.mul_add(vk, *o);
            }
        }
        out
    }

    /// Outer product `u vᵀ` with shape `(u.len(), v.len())`.
    pub(crate) fn outer(u: &[f64], v: &[f64]) -> Self {
        Self::from_fn(u.len(), v.len(), |i, j| u[i] * v[j])
    }

    /// `self += scale * other`. Shapes must already agree.
    pub(crate) fn add_scaled(&mut self, other: &Matrix, scale: f64) {
        debug_assert_eq!(self.shape(), other.shape());
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a = b.mul_add(scale, *a);
        }
    }

    pub(crate) fn scale(&mut self, factor: f64) {
        for a in &mut self.data {
            *a *= factor;
        }
    }
}
