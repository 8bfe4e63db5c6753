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

//! The beat document: a single sixteen-step loop for six voices plus the
//! tempo, swing, kit and effect settings it plays with.
//!
//! Documents are exchanged as flat JSON:
//!
//! ```json
//! {
//!   "kit": "R8", "tempo": 120, "effect": "spring", "effectMix": 0.25, "swingFactor": 0,
//!   "instruments": { "kick": { "pitch": 0.5, "pattern": [2, 0, 0, ...] }, ... }
//! }
//! ```

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::catalog::{
    self, Instrument, DEFAULT_EFFECT, MAX_TEMPO, MIN_TEMPO, STEPS, TEMPO_STEP, VOLUMES,
};

/// Errors produced while reading or validating a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tempo {0} is outside of {min}..={max}", min = MIN_TEMPO, max = MAX_TEMPO)]
    Tempo(u32),

    #[error("unknown kit {0}")]
    UnknownKit(String),

    #[error("unknown effect {0}")]
    UnknownEffect(String),

    #[error("effect mix {0} is outside of 0..=1")]
    EffectMix(f64),

    #[error("swing factor {0} is outside of -1..=1")]
    Swing(f64),

    #[error("pitch {pitch} for {instrument} is outside of 0..=1")]
    Pitch { instrument: Instrument, pitch: f64 },
}

/// A single pattern cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Hit {
    #[default]
    Off,
    Soft,
    Loud,
}

impl Hit {
    /// The gain this cell plays at.
    pub fn level(self) -> f32 {
        VOLUMES[u8::from(self) as usize]
    }

    /// Returns true if the cell makes a sound.
    pub fn is_audible(self) -> bool {
        self != Hit::Off
    }
}

impl TryFrom<u8> for Hit {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Hit::Off),
            1 => Ok(Hit::Soft),
            2 => Ok(Hit::Loud),
            other => Err(format!("pattern value {} is not one of 0, 1, 2", other)),
        }
    }
}

impl From<Hit> for u8 {
    fn from(hit: Hit) -> u8 {
        match hit {
            Hit::Off => 0,
            Hit::Soft => 1,
            Hit::Loud => 2,
        }
    }
}

/// Sixteen cells, one per step.
pub type Pattern = [Hit; STEPS];

/// Pitch and pattern for one voice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Playback pitch in 0..=1; 0.5 plays the sample unchanged.
    pub pitch: f64,
    pub pattern: Pattern,
}

impl Track {
    fn new(pitch: f64, pattern: Pattern) -> Track {
        Track { pitch, pattern }
    }

    /// Returns a track with the given cells set loud.
    fn loud_at(pitch: f64, steps: &[usize]) -> Track {
        let mut pattern = [Hit::Off; STEPS];
        for &step in steps {
            pattern[step] = Hit::Loud;
        }
        Track::new(pitch, pattern)
    }

    /// Converts the pitch to a playback rate: one octave either side of 0.5.
    pub fn playback_rate(&self) -> f64 {
        playback_rate(self.pitch)
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::new(0.5, [Hit::Off; STEPS])
    }
}

/// Converts a pitch in 0..=1 to a playback rate.
pub fn playback_rate(pitch: f64) -> f64 {
    2f64.powf(2.0 * (pitch - 0.5))
}

/// The tracks of all six voices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Instruments {
    pub tom1: Track,
    pub tom2: Track,
    pub tom3: Track,
    pub hihat: Track,
    pub snare: Track,
    pub kick: Track,
}

impl Index<Instrument> for Instruments {
    type Output = Track;

    fn index(&self, instrument: Instrument) -> &Track {
        match instrument {
            Instrument::Tom1 => &self.tom1,
            Instrument::Tom2 => &self.tom2,
            Instrument::Tom3 => &self.tom3,
            Instrument::Hihat => &self.hihat,
            Instrument::Snare => &self.snare,
            Instrument::Kick => &self.kick,
        }
    }
}

impl IndexMut<Instrument> for Instruments {
    fn index_mut(&mut self, instrument: Instrument) -> &mut Track {
        match instrument {
            Instrument::Tom1 => &mut self.tom1,
            Instrument::Tom2 => &mut self.tom2,
            Instrument::Tom3 => &mut self.tom3,
            Instrument::Hihat => &mut self.hihat,
            Instrument::Snare => &mut self.snare,
            Instrument::Kick => &mut self.kick,
        }
    }
}

/// The full, serializable state of a beat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatDocument {
    /// The active kit. `None` until a kit has been chosen.
    pub kit: Option<String>,
    /// Beats per minute.
    pub tempo: u32,
    /// The active effect.
    pub effect: String,
    /// Wet level in 0..=1.
    pub effect_mix: f64,
    /// Scales the maximum swing offset.
    pub swing_factor: f64,
    pub instruments: Instruments,
}

impl BeatDocument {
    /// The blank beat: no hits, no kit, spring reverb at a quarter.
    pub fn empty() -> BeatDocument {
        BeatDocument {
            kit: None,
            tempo: 120,
            effect: "spring".to_string(),
            effect_mix: 0.25,
            swing_factor: 0.0,
            instruments: Instruments::default(),
        }
    }

    /// The bundled demo beat.
    pub fn demo() -> BeatDocument {
        BeatDocument {
            kit: None,
            tempo: 120,
            effect: "spring".to_string(),
            effect_mix: 0.2,
            swing_factor: 0.0,
            instruments: Instruments {
                tom1: Track::loud_at(0.7183098591549295, &[14]),
                tom2: Track::loud_at(0.704225352112676, &[2]),
                tom3: Track::loud_at(0.8028169014084507, &[7, 9, 10]),
                hihat: Track::loud_at(0.15492957746478875, &[6, 8]),
                snare: Track::loud_at(0.45070422535211263, &[4, 12]),
                kick: Track::loud_at(0.46478873239436624, &[0]),
            },
        }
    }

    /// Parses and validates a document.
    pub fn from_json(json: &str) -> Result<BeatDocument, DocumentError> {
        let document: BeatDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Serializes the document.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Checks the ranges that the types alone don't enforce.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.tempo) {
            return Err(DocumentError::Tempo(self.tempo));
        }
        if let Some(kit) = &self.kit {
            if catalog::kit(kit).is_none() {
                return Err(DocumentError::UnknownKit(kit.clone()));
            }
        }
        if catalog::effect(&self.effect).is_none() {
            return Err(DocumentError::UnknownEffect(self.effect.clone()));
        }
        if !(0.0..=1.0).contains(&self.effect_mix) {
            return Err(DocumentError::EffectMix(self.effect_mix));
        }
        if !(-1.0..=1.0).contains(&self.swing_factor) {
            return Err(DocumentError::Swing(self.swing_factor));
        }
        for instrument in Instrument::ORDER {
            let pitch = self.instruments[instrument].pitch;
            if !(0.0..=1.0).contains(&pitch) {
                return Err(DocumentError::Pitch { instrument, pitch });
            }
        }
        Ok(())
    }

    /// The length of one beat at the current tempo, in seconds.
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo as f64
    }

    /// Sets the tempo, clamped to the supported range.
    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    /// Nudges the tempo up by one step.
    pub fn tempo_up(&mut self) {
        self.set_tempo(self.tempo.saturating_add(TEMPO_STEP));
    }

    /// Nudges the tempo down by one step.
    pub fn tempo_down(&mut self) {
        self.set_tempo(self.tempo.saturating_sub(TEMPO_STEP));
    }

    /// Returns the cell at the given column, if the column exists.
    pub fn note(&self, instrument: Instrument, column: usize) -> Option<Hit> {
        self.instruments[instrument].pattern.get(column).copied()
    }

    /// Writes a cell. Returns false if the column doesn't exist.
    pub fn set_note(&mut self, instrument: Instrument, column: usize, hit: Hit) -> bool {
        match self.instruments[instrument].pattern.get_mut(column) {
            Some(cell) => {
                *cell = hit;
                true
            }
            None => false,
        }
    }

    /// Sets an instrument's pitch, clamped to 0..=1.
    pub fn set_pitch(&mut self, instrument: Instrument, pitch: f64) {
        self.instruments[instrument].pitch = pitch.clamp(0.0, 1.0);
    }

    /// Sets the swing factor, clamped to -1..=1.
    pub fn set_swing(&mut self, swing: f64) {
        self.swing_factor = swing.clamp(-1.0, 1.0);
    }

    /// Sets the wet level, clamped to 0..=1.
    pub fn set_effect_mix(&mut self, mix: f64) {
        self.effect_mix = mix.clamp(0.0, 1.0);
    }

    /// The one-line summary shown alongside the grid.
    pub fn status_line(&self) -> String {
        let kit = self
            .kit
            .as_deref()
            .map(|name| catalog::kit(name).map_or(name, |kit| kit.label))
            .unwrap_or("-");
        let effect = catalog::effect(&self.effect)
            .or_else(|| catalog::effect(DEFAULT_EFFECT))
            .map_or(self.effect.as_str(), |effect| effect.label);
        format!("Kit: {} | Effect: {} | Tempo: {}", kit, effect, self.tempo)
    }
}

impl Default for BeatDocument {
    fn default() -> Self {
        BeatDocument::empty()
    }
}
