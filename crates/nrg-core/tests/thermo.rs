//! Thermodynamic quantities derived consistently from a running partition
//! function.

use approx::assert_relative_eq;
use nrg_core::stats::Thermo;

#[test]
fn free_energy_matches_negative_log_z() {
    let z = 3.7;
    let t = Thermo::compute(z, 0.0, 0.0);
    assert_relative_eq!(t.free_energy, -z.ln(), epsilon = 1e-12);
}

#[test]
fn entropy_equals_mean_energy_minus_free_energy() {
    let t = Thermo::compute(2.5, 1.2, 3.0);
    assert_relative_eq!(t.entropy, t.mean_e - t.free_energy, epsilon = 1e-12);
}

#[test]
fn heat_capacity_is_variance_of_energy() {
    let t = Thermo::compute(1.0, 2.0, 4.5);
    assert_relative_eq!(t.heat_capacity, 4.5 - 2.0 * 2.0, epsilon = 1e-12);
}

#[test]
fn zero_fluctuation_spectrum_has_zero_heat_capacity() {
    let t = Thermo::compute(1.0, 1.0, 1.0);
    assert_relative_eq!(t.heat_capacity, 0.0, epsilon = 1e-12);
}
