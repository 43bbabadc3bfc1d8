// ti-core/src/units.rs
//
// Simulations run in LAMMPS "metal" units: eV, Å, amu, K, bar, ps.
// Reference free energies need SI at a few points (thermal wavelength,
// oscillator frequency), so conversions go through uom.

use uom::si::energy::{electronvolt, joule};
use uom::si::f64::{Energy, Length, Pressure, ThermodynamicTemperature};
use uom::si::length::{angstrom, meter};
use uom::si::pressure::{bar, pascal};
use uom::si::thermodynamic_temperature::kelvin;

pub type Temperature = ThermodynamicTemperature;

#[inline]
pub fn k(v: f64) -> Temperature {
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn bars(v: f64) -> Pressure {
    Pressure::new::<bar>(v)
}

#[inline]
pub fn ev(v: f64) -> Energy {
    Energy::new::<electronvolt>(v)
}

#[inline]
pub fn ev_to_joule(v: f64) -> f64 {
    ev(v).get::<joule>()
}

#[inline]
pub fn joule_to_ev(v: f64) -> f64 {
    Energy::new::<joule>(v).get::<electronvolt>()
}

#[inline]
pub fn meter_to_angstrom(v: f64) -> f64 {
    Length::new::<meter>(v).get::<angstrom>()
}

#[inline]
pub fn angstrom_to_meter(v: f64) -> f64 {
    Length::new::<angstrom>(v).get::<meter>()
}

/// Pressure in bar expressed as an energy density in eV/Å³.
pub fn bar_to_ev_per_cubic_angstrom(p: f64) -> f64 {
    let pa = bars(p).get::<pascal>();
    // Pa = J/m³
    joule_to_ev(pa) * angstrom_to_meter(1.0).powi(3)
}

pub mod constants {
    /// Boltzmann constant [eV/K]
    pub const KB_EV_PER_K: f64 = 8.617_333_262e-5;
    /// Boltzmann constant [J/K]
    pub const KB_J_PER_K: f64 = 1.380_649e-23;
    /// Planck constant [J s]
    pub const PLANCK_J_S: f64 = 6.626_070_15e-34;
    /// Reduced Planck constant [J s]
    pub const HBAR_J_S: f64 = 1.054_571_817e-34;
    /// Atomic mass unit [kg]
    pub const AMU_KG: f64 = 1.660_539_066_60e-27;

    #[inline]
    pub fn kbt_ev(t_k: f64) -> f64 {
        KB_EV_PER_K * t_k
    }
}
