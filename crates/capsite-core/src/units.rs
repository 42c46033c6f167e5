//! Physical and per-unit quantities for distribution feeder data.
//!
//! Feeder data arrives in the units field engineers use (kW, kVAr, Ω, kA),
//! while the optimization model works exclusively in per-unit. The newtypes
//! below keep those two worlds apart at compile time, and [`PerUnitBases`]
//! is the single place where one is turned into the other.
//!
//! # Bases
//!
//! For a three-phase system with power base `S` (MVA) and line-to-line
//! voltage base `U` (kV):
//!
//! ```text
//! Z_base = U² / S          [Ω]
//! I_base = S / (U · √3)    [kA]
//! P_pu   = P_kW / (S · 1000)
//! ```
//!
//! # Usage
//!
//! ```
//! use capsite_core::units::{Kilowatts, Ohms, PerUnitBases};
//!
//! let bases = PerUnitBases::new(10.0, 12.66).unwrap();
//! let p = bases.active_to_pu(Kilowatts(100.0));
//! assert!((p.value() - 0.01).abs() < 1e-12);
//!
//! let r = bases.impedance_to_pu(Ohms(0.0922));
//! assert!((bases.impedance_from_pu(r).value() - 0.0922).abs() < 1e-12);
//! ```

use crate::error::{CapsiteError, CapsiteResult};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Arithmetic shared by every quantity newtype
macro_rules! impl_quantity {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn is_negative(self) -> bool {
                self.0 < 0.0
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Physical Units
// =============================================================================

/// Active power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_quantity!(Kilowatts, "kW");

/// Reactive power in kilovolt-amperes reactive (kVAr)
///
/// Also used for capacitor bank nameplate sizes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovars(pub f64);

impl_quantity!(Kilovars, "kVAr");

/// Line-to-line voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_quantity!(Kilovolts, "kV");

/// Apparent power in megavolt-amperes (MVA), the system power base
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_quantity!(MegavoltAmperes, "MVA");

/// Series resistance or reactance in ohms (Ω)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_quantity!(Ohms, "Ω");

/// Current in kiloamperes (kA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kiloamperes(pub f64);

impl_quantity!(Kiloamperes, "kA");

// =============================================================================
// Per-Unit
// =============================================================================

/// Dimensionless per-unit quantity (voltage magnitude, active or reactive power)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_quantity!(PerUnit, "pu");

impl PerUnit {
    pub const ONE: Self = Self(1.0);
    pub const ZERO: Self = Self(0.0);

    /// Square of the value, used for squared-voltage bounds
    #[inline]
    pub fn squared(self) -> f64 {
        self.0 * self.0
    }
}

/// Per-unit series impedance component (R or X on the system base)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ImpedancePu(pub f64);

impl_quantity!(ImpedancePu, "pu");

/// Per-unit current magnitude
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CurrentPu(pub f64);

impl_quantity!(CurrentPu, "pu");

impl CurrentPu {
    #[inline]
    pub fn squared(self) -> f64 {
        self.0 * self.0
    }
}

// =============================================================================
// Bases
// =============================================================================

/// Per-unit system bases derived once from the configured power and voltage base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerUnitBases {
    s_base: MegavoltAmperes,
    u_base: Kilovolts,
    z_base: f64,
    i_base: f64,
}

impl PerUnitBases {
    /// Build bases from `s_base` in MVA and `u_base` in kV.
    pub fn new(s_base_mva: f64, u_base_kv: f64) -> CapsiteResult<Self> {
        if !(s_base_mva.is_finite() && s_base_mva > 0.0) {
            return Err(CapsiteError::config(
                "config",
                format!("base.s_base must be a positive number of MVA, got {s_base_mva}"),
            ));
        }
        if !(u_base_kv.is_finite() && u_base_kv > 0.0) {
            return Err(CapsiteError::config(
                "config",
                format!("base.u_base must be a positive number of kV, got {u_base_kv}"),
            ));
        }
        Ok(Self {
            s_base: MegavoltAmperes(s_base_mva),
            u_base: Kilovolts(u_base_kv),
            z_base: u_base_kv * u_base_kv / s_base_mva,
            i_base: s_base_mva / (u_base_kv * 3f64.sqrt()),
        })
    }

    pub fn s_base(&self) -> MegavoltAmperes {
        self.s_base
    }

    pub fn u_base(&self) -> Kilovolts {
        self.u_base
    }

    /// Impedance base in ohms
    pub fn z_base(&self) -> f64 {
        self.z_base
    }

    /// Current base in kiloamperes
    pub fn i_base(&self) -> f64 {
        self.i_base
    }

    #[inline]
    fn kilo_per_base(&self) -> f64 {
        self.s_base.0 * 1000.0
    }

    pub fn active_to_pu(&self, p: Kilowatts) -> PerUnit {
        PerUnit(p.0 / self.kilo_per_base())
    }

    pub fn active_from_pu(&self, p: PerUnit) -> Kilowatts {
        Kilowatts(p.0 * self.kilo_per_base())
    }

    pub fn reactive_to_pu(&self, q: Kilovars) -> PerUnit {
        PerUnit(q.0 / self.kilo_per_base())
    }

    pub fn reactive_from_pu(&self, q: PerUnit) -> Kilovars {
        Kilovars(q.0 * self.kilo_per_base())
    }

    pub fn impedance_to_pu(&self, z: Ohms) -> ImpedancePu {
        ImpedancePu(z.0 / self.z_base)
    }

    pub fn impedance_from_pu(&self, z: ImpedancePu) -> Ohms {
        Ohms(z.0 * self.z_base)
    }

    pub fn current_to_pu(&self, i: Kiloamperes) -> CurrentPu {
        CurrentPu(i.0 / self.i_base)
    }

    pub fn current_from_pu(&self, i: CurrentPu) -> Kiloamperes {
        Kiloamperes(i.0 * self.i_base)
    }

    /// Capacitor price per kVAr expressed per MVAr, matching per-unit sizes times `s_base`.
    pub fn cost_per_mvar(&self, cost_per_kvar: f64) -> f64 {
        cost_per_kvar * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ieee33_bases() -> PerUnitBases {
        PerUnitBases::new(10.0, 12.66).unwrap()
    }

    #[test]
    fn test_derived_bases() {
        let bases = ieee33_bases();
        assert!((bases.z_base() - 16.02756).abs() < 1e-5);
        assert!((bases.i_base() - 0.456_043).abs() < 1e-6);
    }

    #[test]
    fn test_power_round_trip() {
        let bases = ieee33_bases();
        for kw in [0.0, 60.0, 420.0, 3715.0] {
            let back = bases.active_from_pu(bases.active_to_pu(Kilowatts(kw)));
            assert!((back.value() - kw).abs() <= 1e-12 * kw.max(1.0));
        }
        let q = bases.reactive_to_pu(Kilovars(2300.0));
        assert!((q.value() - 0.23).abs() < 1e-12);
        assert!((bases.reactive_from_pu(q).value() - 2300.0).abs() < 1e-9);
    }

    #[test]
    fn test_impedance_and_current_round_trip() {
        let bases = ieee33_bases();
        let r = Ohms(0.4930);
        let back = bases.impedance_from_pu(bases.impedance_to_pu(r));
        assert!((back.value() - r.value()).abs() < 1e-12);

        let rate = Kiloamperes(0.4);
        let back = bases.current_from_pu(bases.current_to_pu(rate));
        assert!((back.value() - rate.value()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_positive_bases() {
        assert!(PerUnitBases::new(0.0, 12.66).is_err());
        assert!(PerUnitBases::new(10.0, -1.0).is_err());
        assert!(PerUnitBases::new(f64::NAN, 12.66).is_err());
    }

    #[test]
    fn test_quantity_arithmetic() {
        let total: Kilowatts = [Kilowatts(100.0), Kilowatts(60.0)].into_iter().sum();
        assert_eq!(total.value(), 160.0);
        assert_eq!((Kilovars(50.0) - Kilovars(20.0)).value(), 30.0);
        assert_eq!((-PerUnit(0.5)).value(), -0.5);
        assert!((PerUnit(0.95).squared() - 0.9025).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kilowatts(100.0)), "100.0000 kW");
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
    }
}
