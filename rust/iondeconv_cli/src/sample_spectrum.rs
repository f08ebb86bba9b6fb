//! The built-in demonstration sweep: 100 points from 0 to 99,990 Hz,
//! synthesized as a known mixture of library profiles over a constant
//! baseline with a mild deterministic ripple standing in for sensor
//! noise. Mainly used for demos and end-to-end checks without hardware.

use iondeconv::ions::profile;
use iondeconv::{
    IonLibrary,
    IonSpecies,
};

const NUM_POINTS: usize = 100;
const FREQUENCY_STEP_HZ: f64 = 1010.0;
const BASELINE: f64 = 3.2;
const RIPPLE_AMPLITUDE: f64 = 0.02;

const COMPONENTS: [(IonSpecies, f64); 4] = [
    (IonSpecies::Sodium, 2.4),
    (IonSpecies::Calcium, 1.1),
    (IonSpecies::Chloride, 0.9),
    (IonSpecies::Sulfate, 0.5),
];

/// Returns the (frequencies, conductivities) of the demonstration sweep.
pub fn sample_spectrum() -> (Vec<f64>, Vec<f64>) {
    let frequencies: Vec<f64> = (0..NUM_POINTS)
        .map(|i| i as f64 * FREQUENCY_STEP_HZ)
        .collect();

    let library = IonLibrary::default_library();
    let mut conductivities = vec![BASELINE; NUM_POINTS];
    for (species, amplitude) in COMPONENTS {
        let shape = profile(library.get(species), &frequencies);
        for (c, v) in conductivities.iter_mut().zip(shape.iter()) {
            *c += amplitude * v;
        }
    }
    for (c, f) in conductivities.iter_mut().zip(frequencies.iter()) {
        *c += RIPPLE_AMPLITUDE * (f / 700.0).sin();
    }

    (frequencies, conductivities)
}
