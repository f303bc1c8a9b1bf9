//! Forward-mode differentiable evaluation with a fixed number of sensitivity slots.
//!
//! Every closure relation of the well model is written against [`Eval`], so the
//! Jacobian entries fall out of the arithmetic. The slot layout used by the well
//! model is fixed a priori:
//!
//! - slots `0..NUM_EQ` hold derivatives w.r.t. the unknowns of one reservoir cell
//! - slots `NUM_EQ..2*NUM_EQ` hold derivatives w.r.t. the unknowns of one well
//!
//! ```
//! use wf_core::eval::WellEval;
//!
//! let x = WellEval::well_variable(2.0, 0);
//! let y = x * x + 1.0;
//! assert_eq!(y.value(), 5.0);
//! assert_eq!(y.well_derivative(0), 4.0);
//! ```

use core::fmt;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Number of conservation equations (and primary unknowns) per cell and per well.
pub const NUM_EQ: usize = 3;

/// Value with sensitivities w.r.t. one cell's unknowns.
pub type CellEval = Eval<NUM_EQ>;

/// Value with sensitivities w.r.t. one cell's and one well's unknowns.
pub type WellEval = Eval<{ 2 * NUM_EQ }>;

/// A value together with its partial derivatives.
#[derive(Clone, Copy, PartialEq)]
pub struct Eval<const N: usize> {
    value: f64,
    derivatives: [f64; N],
}

impl<const N: usize> Eval<N> {
    /// A constant: all derivatives are zero.
    #[inline]
    pub const fn constant(value: f64) -> Self {
        Self {
            value,
            derivatives: [0.0; N],
        }
    }

    /// An independent variable seeded in slot `slot`.
    #[inline]
    pub fn variable(value: f64, slot: usize) -> Self {
        let mut e = Self::constant(value);
        e.derivatives[slot] = 1.0;
        e
    }

    #[inline]
    pub fn with_derivatives(value: f64, derivatives: [f64; N]) -> Self {
        Self { value, derivatives }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    #[inline]
    pub fn derivative(&self, slot: usize) -> f64 {
        self.derivatives[slot]
    }

    #[inline]
    pub fn derivatives(&self) -> &[f64; N] {
        &self.derivatives
    }

    /// Drop all sensitivities, keeping the value.
    #[inline]
    pub fn detached(&self) -> Self {
        Self::constant(self.value)
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite() && self.derivatives.iter().all(|d| d.is_finite())
    }

    pub fn abs(self) -> Self {
        if self.value < 0.0 { -self } else { self }
    }

    /// The smaller of two evaluations by value; ties keep `self`.
    pub fn min(self, other: Self) -> Self {
        if other.value < self.value { other } else { self }
    }

    /// The larger of two evaluations by value; ties keep `self`.
    pub fn max(self, other: Self) -> Self {
        if other.value > self.value { other } else { self }
    }

    pub fn powi(self, n: i32) -> Self {
        let v = self.value.powi(n);
        let dv = if n == 0 {
            0.0
        } else {
            f64::from(n) * self.value.powi(n - 1)
        };
        self.chain(v, dv)
    }

    pub fn sqrt(self) -> Self {
        let v = self.value.sqrt();
        self.chain(v, 0.5 / v)
    }

    pub fn exp(self) -> Self {
        let v = self.value.exp();
        self.chain(v, v)
    }

    #[inline]
    fn chain(self, value: f64, dvalue: f64) -> Self {
        let mut derivatives = self.derivatives;
        for d in &mut derivatives {
            *d *= dvalue;
        }
        Self { value, derivatives }
    }
}

impl WellEval {
    /// A well unknown seeded in well slot `var` (slot `NUM_EQ + var`).
    #[inline]
    pub fn well_variable(value: f64, var: usize) -> Self {
        Self::variable(value, NUM_EQ + var)
    }

    /// Lift a cell evaluation into the combined cell/well slot layout.
    #[inline]
    pub fn extend_cell(cell: CellEval) -> Self {
        let mut derivatives = [0.0; 2 * NUM_EQ];
        derivatives[..NUM_EQ].copy_from_slice(cell.derivatives());
        Self::with_derivatives(cell.value(), derivatives)
    }

    /// Keep only the cell sensitivities.
    #[inline]
    pub fn cell_part(&self) -> CellEval {
        let mut derivatives = [0.0; NUM_EQ];
        derivatives.copy_from_slice(&self.derivatives[..NUM_EQ]);
        CellEval::with_derivatives(self.value, derivatives)
    }

    #[inline]
    pub fn cell_derivative(&self, pv: usize) -> f64 {
        self.derivatives[pv]
    }

    #[inline]
    pub fn well_derivative(&self, var: usize) -> f64 {
        self.derivatives[NUM_EQ + var]
    }
}

impl<const N: usize> Default for Eval<N> {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl<const N: usize> From<f64> for Eval<N> {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl<const N: usize> PartialEq<f64> for Eval<N> {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl<const N: usize> PartialOrd<f64> for Eval<N> {
    fn partial_cmp(&self, other: &f64) -> Option<core::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}

impl<const N: usize> fmt::Debug for Eval<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eval({:e}; {:?})", self.value, self.derivatives)
    }
}

impl<const N: usize> fmt::Display for Eval<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<const N: usize> Neg for Eval<N> {
    type Output = Self;
    fn neg(self) -> Self {
        self.chain(-self.value, -1.0)
    }
}

impl<const N: usize> Add for Eval<N> {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl<const N: usize> Sub for Eval<N> {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl<const N: usize> Mul for Eval<N> {
    type Output = Self;
    fn mul(mut self, rhs: Self) -> Self {
        self *= rhs;
        self
    }
}

impl<const N: usize> Div for Eval<N> {
    type Output = Self;
    fn div(mut self, rhs: Self) -> Self {
        self /= rhs;
        self
    }
}

impl<const N: usize> AddAssign for Eval<N> {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
        for (a, b) in self.derivatives.iter_mut().zip(rhs.derivatives) {
            *a += b;
        }
    }
}

impl<const N: usize> SubAssign for Eval<N> {
    fn sub_assign(&mut self, rhs: Self) {
        self.value -= rhs.value;
        for (a, b) in self.derivatives.iter_mut().zip(rhs.derivatives) {
            *a -= b;
        }
    }
}

impl<const N: usize> MulAssign for Eval<N> {
    fn mul_assign(&mut self, rhs: Self) {
        for (a, b) in self.derivatives.iter_mut().zip(rhs.derivatives) {
            *a = *a * rhs.value + self.value * b;
        }
        self.value *= rhs.value;
    }
}

impl<const N: usize> DivAssign for Eval<N> {
    fn div_assign(&mut self, rhs: Self) {
        let inv = 1.0 / rhs.value;
        for (a, b) in self.derivatives.iter_mut().zip(rhs.derivatives) {
            *a = (*a * rhs.value - self.value * b) * inv * inv;
        }
        self.value *= inv;
    }
}

impl<const N: usize> Add<f64> for Eval<N> {
    type Output = Self;
    fn add(mut self, rhs: f64) -> Self {
        self.value += rhs;
        self
    }
}

impl<const N: usize> Sub<f64> for Eval<N> {
    type Output = Self;
    fn sub(mut self, rhs: f64) -> Self {
        self.value -= rhs;
        self
    }
}

impl<const N: usize> Mul<f64> for Eval<N> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        self.chain(self.value * rhs, rhs)
    }
}

impl<const N: usize> Div<f64> for Eval<N> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        self.chain(self.value / rhs, 1.0 / rhs)
    }
}

impl<const N: usize> AddAssign<f64> for Eval<N> {
    fn add_assign(&mut self, rhs: f64) {
        self.value += rhs;
    }
}

impl<const N: usize> SubAssign<f64> for Eval<N> {
    fn sub_assign(&mut self, rhs: f64) {
        self.value -= rhs;
    }
}

impl<const N: usize> MulAssign<f64> for Eval<N> {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl<const N: usize> Add<Eval<N>> for f64 {
    type Output = Eval<N>;
    fn add(self, rhs: Eval<N>) -> Eval<N> {
        rhs + self
    }
}

impl<const N: usize> Sub<Eval<N>> for f64 {
    type Output = Eval<N>;
    fn sub(self, rhs: Eval<N>) -> Eval<N> {
        -rhs + self
    }
}

impl<const N: usize> Mul<Eval<N>> for f64 {
    type Output = Eval<N>;
    fn mul(self, rhs: Eval<N>) -> Eval<N> {
        rhs * self
    }
}

impl<const N: usize> Div<Eval<N>> for f64 {
    type Output = Eval<N>;
    fn div(self, rhs: Eval<N>) -> Eval<N> {
        Eval::constant(self) / rhs
    }
}
