// wf-core/src/units.rs

//! Unit-aware constructors for the quantities that cross the input boundary.
//! The well equations themselves work on plain SI `f64`.

use uom::si::f64::{Pressure as UomPressure, Time as UomTime, VolumeRate as UomVolumeRate};

pub type Pressure = UomPressure;
pub type Time = UomTime;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn bar(v: f64) -> Pressure {
    use uom::si::pressure::bar;
    Pressure::new::<bar>(v)
}

#[inline]
pub fn days(v: f64) -> Time {
    use uom::si::time::day;
    Time::new::<day>(v)
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Surface volume rate in standard cubic metres per day.
#[inline]
pub fn sm3_per_day(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v / SECONDS_PER_DAY)
}

pub mod constants {
    /// Standard gravity [m/s²]
    pub const G0_MPS2: f64 = 9.806_65;

    /// Wellbore storage volume used in the well accumulation term (0.1 ft³).
    pub const WELLBORE_STORAGE_M3: f64 = 0.002_831_684_659_2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_and_days_are_si() {
        assert!((bar(200.0).value - 200e5).abs() < 1e-6);
        assert!((pa(101_325.0).value - 101_325.0).abs() < 1e-12);
        assert!((days(1.0).value - 86_400.0).abs() < 1e-9);
        assert!((sm3_per_day(86_400.0).value - 1.0).abs() < 1e-12);
    }
}
