// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Equal-power stereo panning with inverse distance attenuation.
//!
//! The listener sits at the origin facing -z with +y up, so +x is to the right.

use std::f32::consts::FRAC_PI_2;

/// Distance at which attenuation starts.
const REF_DISTANCE: f32 = 1.0;

/// How quickly gain falls off past the reference distance.
const ROLLOFF: f32 = 1.0;

/// Precomputed gains for a source at a fixed position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanLaw {
    /// Azimuth in degrees, -90 (hard left) to 90 (hard right).
    azimuth: f32,
    /// Attenuation for the source's distance from the listener.
    distance_gain: f32,
}

impl PanLaw {
    /// Computes the pan law for a source at `position`.
    pub fn new(position: [f32; 3]) -> PanLaw {
        PanLaw {
            azimuth: azimuth(position),
            distance_gain: distance_gain(position),
        }
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn distance_gain(&self) -> f32 {
        self.distance_gain
    }

    /// Pans a mono sample into a stereo pair.
    #[inline]
    pub fn mono(&self, sample: f32) -> (f32, f32) {
        let x = (self.azimuth + 90.0) / 180.0;
        let (left, right) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
        let sample = sample * self.distance_gain;
        (sample * left, sample * right)
    }

    /// Pans a stereo pair, folding the far channel into the near one.
    #[inline]
    pub fn stereo(&self, left: f32, right: f32) -> (f32, f32) {
        let (left, right) = (left * self.distance_gain, right * self.distance_gain);
        if self.azimuth <= 0.0 {
            let x = (self.azimuth + 90.0) / 90.0;
            let (gain_l, gain_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
            (left + right * gain_l, right * gain_r)
        } else {
            let x = self.azimuth / 90.0;
            let (gain_l, gain_r) = ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin());
            (left * gain_l, right + left * gain_r)
        }
    }
}

fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn distance_gain(position: [f32; 3]) -> f32 {
    let distance = length(position).max(REF_DISTANCE);
    REF_DISTANCE / (REF_DISTANCE + ROLLOFF * (distance - REF_DISTANCE))
}

fn azimuth(position: [f32; 3]) -> f32 {
    let len = length(position);
    if len == 0.0 {
        return 0.0;
    }
    // Project onto the horizontal plane; y is up.
    let projected = [position[0] / len, 0.0, position[2] / len];
    let projected_len = length(projected);
    if projected_len == 0.0 {
        return 0.0;
    }

    // Angle from the listener's right-hand side.
    let right = (projected[0] / projected_len).clamp(-1.0, 1.0);
    let mut azimuth = right.acos().to_degrees();
    // Behind the listener.
    if -projected[2] < 0.0 {
        azimuth = 360.0 - azimuth;
    }
    // Rotate so that 0 is straight ahead.
    azimuth = if (0.0..=270.0).contains(&azimuth) {
        90.0 - azimuth
    } else {
        450.0 - azimuth
    };

    // Fold the rear half onto the front.
    if azimuth < -90.0 {
        -180.0 - azimuth
    } else if azimuth > 90.0 {
        180.0 - azimuth
    } else {
        azimuth
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn straight_ahead_is_centered() {
        let law = PanLaw::new([0.0, 0.0, -2.0]);
        assert!(close(0.0, law.azimuth()));
        assert!(close(0.5, law.distance_gain()));
        let (left, right) = law.mono(1.0);
        assert!(close(left, right));
        // Equal power: both sides at -3dB before distance.
        assert!(close(0.5 * std::f32::consts::FRAC_1_SQRT_2, left));
    }

    #[test]
    fn sides() {
        let left = PanLaw::new([-1.0, 0.0, 0.0]);
        assert!(close(-90.0, left.azimuth()));
        let (l, r) = left.mono(1.0);
        assert!(close(1.0, l));
        assert!(close(0.0, r));

        let right = PanLaw::new([1.0, 0.0, 0.0]);
        assert!(close(90.0, right.azimuth()));
        let (l, r) = right.mono(1.0);
        assert!(close(0.0, l));
        assert!(close(1.0, r));
    }

    #[test]
    fn behind_folds_to_front() {
        let front = PanLaw::new([1.0, 0.0, -1.0]);
        let back = PanLaw::new([1.0, 0.0, 1.0]);
        assert!(close(45.0, front.azimuth()));
        assert!(close(front.azimuth(), back.azimuth()));
    }

    #[test]
    fn hihat_sweep_moves_left_to_right() {
        let start = PanLaw::new([-4.0, 0.0, -1.0]);
        let middle = PanLaw::new([0.0, 0.0, -1.0]);
        let end = PanLaw::new([3.5, 0.0, -1.0]);
        assert!(start.azimuth() < 0.0);
        assert!(close(0.0, middle.azimuth()));
        assert!(end.azimuth() > 0.0);
        assert!(close(1.0, middle.distance_gain()));
        assert!(start.distance_gain() < 0.25);
    }

    #[test]
    fn stereo_hard_left_folds_right_channel() {
        let law = PanLaw::new([-1.0, 0.0, 0.0]);
        let (l, r) = law.stereo(0.25, 0.5);
        assert!(close(0.75, l));
        assert!(close(0.0, r));
    }
}
