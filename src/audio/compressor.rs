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

//! Master bus dynamics compressor.

/// Threshold in dBFS.
const THRESHOLD_DB: f32 = -24.0;
/// Knee width in dB.
const KNEE_DB: f32 = 30.0;
const RATIO: f32 = 12.0;
/// Attack time in seconds.
const ATTACK: f32 = 0.003;
/// Release time in seconds.
const RELEASE: f32 = 0.25;
/// Exponent applied to the full-scale gain to derive makeup gain.
const MAKEUP_EXPONENT: f32 = 0.6;

/// Gain reduction in dB (zero or negative) for a detector level in dB.
pub fn soft_knee_gain(input_db: f32) -> f32 {
    let half_knee = KNEE_DB / 2.0;

    if input_db < THRESHOLD_DB - half_knee {
        0.0
    } else if input_db > THRESHOLD_DB + half_knee {
        (THRESHOLD_DB - input_db) * (1.0 - 1.0 / RATIO)
    } else {
        let x = input_db - THRESHOLD_DB + half_knee;
        -(1.0 - 1.0 / RATIO) * x * x / (2.0 * KNEE_DB)
    }
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn linear_to_db(linear: f32) -> f32 {
    if linear <= 1e-9 {
        -180.0
    } else {
        20.0 * linear.log10()
    }
}

/// A stereo-linked feed-forward compressor.
pub struct Compressor {
    /// Smoothed gain reduction in dB.
    reduction_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    makeup_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: u32) -> Compressor {
        let sample_rate = sample_rate.max(1) as f32;
        let full_range_db = soft_knee_gain(0.0);
        Compressor {
            reduction_db: 0.0,
            attack_coeff: 1.0 - (-1.0 / (ATTACK * sample_rate)).exp(),
            release_coeff: 1.0 - (-1.0 / (RELEASE * sample_rate)).exp(),
            makeup_db: -full_range_db * MAKEUP_EXPONENT,
        }
    }

    /// The current smoothed gain reduction in dB.
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    /// Compresses a block of stereo audio in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let level = l.abs().max(r.abs());
            let target = soft_knee_gain(linear_to_db(level));

            // Reduction grows on attack and shrinks on release.
            let coeff = if target < self.reduction_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.reduction_db += coeff * (target - self.reduction_db);

            let gain = db_to_linear(self.reduction_db + self.makeup_db);
            *l *= gain;
            *r *= gain;
        }
    }
}
