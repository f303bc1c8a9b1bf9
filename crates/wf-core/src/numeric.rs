use crate::{WfError, WfResult};

/// Pass `v` through if it is finite.
pub fn ensure_finite(v: f64, what: &'static str) -> WfResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(WfError::NonFinite { what, value: v })
    }
}

/// Sign of `v` as used by bounded Newton updates: exactly `1.0` for strictly
/// positive values and `-1.0` otherwise.
#[inline]
pub fn update_sign(v: f64) -> f64 {
    if v > 0.0 { 1.0 } else { -1.0 }
}

/// Limit the magnitude of a Newton update while keeping its sign.
#[inline]
pub fn limited_update(dx: f64, max_abs: f64) -> f64 {
    update_sign(dx) * dx.abs().min(max_abs)
}
