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

//! Static registries for the instruments, kits and effects the sampler knows about.
//!
//! Everything in here is immutable and shared for the life of the process.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The slowest tempo a beat may have, in BPM.
pub const MIN_TEMPO: u32 = 50;

/// The fastest tempo a beat may have, in BPM.
pub const MAX_TEMPO: u32 = 180;

/// How far a single tempo nudge moves the tempo, in BPM.
pub const TEMPO_STEP: u32 = 10;

/// The number of steps in a pattern.
pub const STEPS: usize = 16;

/// The largest swing offset, as a fraction of a beat.
pub const MAX_SWING: f64 = 0.08;

/// Gain for each pattern cell value: silent, soft, loud.
pub const VOLUMES: [f32; 3] = [0.0, 0.3, 1.0];

/// The kit loaded when a beat doesn't name one.
pub const DEFAULT_KIT: &str = "R8";

/// The effect applied when a beat doesn't name one.
pub const DEFAULT_EFFECT: &str = "none";

/// One of the six voices of the drum machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Tom1,
    Tom2,
    Tom3,
    Hihat,
    Snare,
    Kick,
}

impl Instrument {
    /// Display order, top row first.
    pub const ORDER: [Instrument; 6] = [
        Instrument::Tom1,
        Instrument::Tom2,
        Instrument::Tom3,
        Instrument::Hihat,
        Instrument::Snare,
        Instrument::Kick,
    ];

    /// The order voices are triggered within a single step.
    pub const TRIGGER_ORDER: [Instrument; 6] = [
        Instrument::Kick,
        Instrument::Snare,
        Instrument::Hihat,
        Instrument::Tom1,
        Instrument::Tom2,
        Instrument::Tom3,
    ];

    /// The identifier used in documents and sample paths.
    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Tom1 => "tom1",
            Instrument::Tom2 => "tom2",
            Instrument::Tom3 => "tom3",
            Instrument::Hihat => "hihat",
            Instrument::Snare => "snare",
            Instrument::Kick => "kick",
        }
    }

    /// Routing and gain parameters for this voice.
    pub fn spec(&self) -> &'static InstrumentSpec {
        match self {
            Instrument::Tom1 => &TOM1,
            Instrument::Tom2 => &TOM2,
            Instrument::Tom3 => &TOM3,
            Instrument::Hihat => &HIHAT,
            Instrument::Snare => &SNARE,
            Instrument::Kick => &KICK,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::ORDER
            .into_iter()
            .find(|instrument| instrument.name() == s)
            .ok_or_else(|| format!("unknown instrument {}", s))
    }
}

/// A coordinate of a voice's position in space.
#[derive(Clone, Copy, Debug)]
pub enum Axis {
    /// The same value for every step.
    Constant(f32),
    /// A value computed from the step index.
    PerStep(fn(usize) -> f32),
}

impl Axis {
    /// Resolves the coordinate for the given step.
    pub fn at(&self, step: usize) -> f32 {
        match self {
            Axis::Constant(value) => *value,
            Axis::PerStep(f) => f(step),
        }
    }
}

/// Static parameters for a voice.
#[derive(Debug)]
pub struct InstrumentSpec {
    /// Human readable name.
    pub label: &'static str,
    /// Whether the voice is placed through a panner.
    pub pannable: bool,
    /// The x, y, z position used when the voice is pannable.
    pub position: [Axis; 3],
    /// Gain on the send into the convolver.
    pub send_gain: f32,
    /// Base gain on the dry path.
    pub volume: f32,
}

impl InstrumentSpec {
    /// The panner position for the given step.
    pub fn position_at(&self, step: usize) -> [f32; 3] {
        [
            self.position[0].at(step),
            self.position[1].at(step),
            self.position[2].at(step),
        ]
    }
}

/// The hi-hat sweeps from left to right across the bar.
fn hihat_x(step: usize) -> f32 {
    0.5 * step as f32 - 4.0
}

const CENTER_BACK: [Axis; 3] = [Axis::Constant(0.0), Axis::Constant(0.0), Axis::Constant(-2.0)];

static TOM1: InstrumentSpec = InstrumentSpec {
    label: "Tom 1",
    pannable: false,
    position: CENTER_BACK,
    send_gain: 1.0,
    volume: 0.6,
};

static TOM2: InstrumentSpec = InstrumentSpec {
    label: "Tom 2",
    pannable: false,
    position: CENTER_BACK,
    send_gain: 1.0,
    volume: 0.6,
};

static TOM3: InstrumentSpec = InstrumentSpec {
    label: "Tom 3",
    pannable: false,
    position: CENTER_BACK,
    send_gain: 1.0,
    volume: 0.6,
};

static HIHAT: InstrumentSpec = InstrumentSpec {
    label: "Hi-Hat",
    pannable: true,
    position: [
        Axis::PerStep(hihat_x),
        Axis::Constant(0.0),
        Axis::Constant(-1.0),
    ],
    send_gain: 1.0,
    volume: 0.7,
};

static SNARE: InstrumentSpec = InstrumentSpec {
    label: "Snare",
    pannable: false,
    position: CENTER_BACK,
    send_gain: 1.0,
    volume: 0.6,
};

static KICK: InstrumentSpec = InstrumentSpec {
    label: "Kick",
    pannable: false,
    position: CENTER_BACK,
    send_gain: 0.5,
    volume: 1.0,
};

/// A convolution effect.
#[derive(Debug)]
pub struct EffectSpec {
    /// Identifier used in documents.
    pub name: &'static str,
    /// Human readable name.
    pub label: &'static str,
    /// Impulse response file, relative to the impulse root. `None` for the identity effect.
    pub file: Option<&'static str>,
    /// Scale on the dry path while this effect is active.
    pub dry_mix: f32,
    /// Scale on the effect return while this effect is active.
    pub wet_mix: f32,
}

const fn fx(
    name: &'static str,
    label: &'static str,
    file: &'static str,
    dry_mix: f32,
    wet_mix: f32,
) -> EffectSpec {
    EffectSpec {
        name,
        label,
        file: Some(file),
        dry_mix,
        wet_mix,
    }
}

/// Every effect, in menu order.
pub static EFFECTS: [EffectSpec; 26] = [
    EffectSpec {
        name: "none",
        label: "No Effect",
        file: None,
        dry_mix: 1.0,
        wet_mix: 0.0,
    },
    fx("spreader1", "Spreader 1", "spreader50-65ms.wav", 0.8, 1.4),
    fx("spreader2", "Spreader 2", "noise-spreader1.wav", 1.0, 1.0),
    fx("spring", "Spring Reverb", "feedback-spring.wav", 1.0, 1.0),
    fx("space", "Space Oddity", "filter-rhythm3.wav", 1.0, 0.7),
    fx("reverse", "Reverse", "spatialized5.wav", 1.0, 1.0),
    fx("hreverse", "Huge Reverse", "matrix6-backwards.wav", 0.0, 0.7),
    fx("telephone", "Telephone Filter", "filter-telephone.wav", 0.0, 1.2),
    fx("lopass", "Lopass Filter", "filter-lopass160.wav", 0.0, 0.5),
    fx("hipass", "Hipass Filter", "filter-hipass5000.wav", 0.0, 4.0),
    fx("comb1", "Comb 1", "comb-saw1.wav", 0.0, 0.7),
    fx("comb2", "Comb 2", "comb-saw2.wav", 0.0, 1.0),
    fx("cosmic", "Cosmic Ping", "cosmic-ping-long.wav", 0.0, 0.9),
    fx(
        "kitchen",
        "Kitchen",
        "house-impulses/kitchen-true-stereo.wav",
        1.0,
        1.0,
    ),
    fx(
        "livingroom",
        "Living Room",
        "house-impulses/dining-living-true-stereo.wav",
        1.0,
        1.0,
    ),
    fx(
        "bedroom",
        "Living-Bedroom",
        "house-impulses/living-bedroom-leveled.wav",
        1.0,
        1.0,
    ),
    fx(
        "diningroom",
        "Dining-Far-Kitchen",
        "house-impulses/dining-far-kitchen.wav",
        1.0,
        1.0,
    ),
    fx("mhall1", "Medium Hall 1", "matrix-reverb2.wav", 1.0, 1.0),
    fx("mhall2", "Medium Hall 2", "matrix-reverb3.wav", 1.0, 1.0),
    fx("lhall", "Large Hall", "spatialized4.wav", 1.0, 0.5),
    fx("pecurliar", "Peculiar", "peculiar-backwards.wav", 1.0, 1.0),
    fx("backslap", "Backslap", "backslap1.wav", 1.0, 1.0),
    fx(
        "warehouse",
        "Warehouse",
        "tim-warehouse/cardiod-rear-35-10/cardiod-rear-levelled.wav",
        1.0,
        1.0,
    ),
    fx("diffusor", "Diffusor", "diffusor3.wav", 1.0, 1.0),
    fx("bhall", "Binaural Hall", "bin_dfeq/s2_r4_bd.wav", 1.0, 0.5),
    fx("huge", "Huge", "matrix-reverb6.wav", 1.0, 0.7),
];

/// Looks up an effect by name.
pub fn effect(name: &str) -> Option<&'static EffectSpec> {
    EFFECTS.iter().find(|effect| effect.name == name)
}

/// A drum kit: one sample per instrument under a directory named after the kit.
#[derive(Debug)]
pub struct KitSpec {
    pub name: &'static str,
    pub label: &'static str,
}

impl KitSpec {
    /// The locator of this kit's sample for the given instrument.
    pub fn sample_locator(&self, instrument: Instrument) -> String {
        format!("{}/{}.wav", self.name, instrument.name())
    }
}

/// Every kit, in menu order.
pub static KITS: [KitSpec; 15] = [
    KitSpec {
        name: "R8",
        label: "Roland R-8",
    },
    KitSpec {
        name: "CR78",
        label: "Roland CR-78",
    },
    KitSpec {
        name: "KPR77",
        label: "Korg KPR-77",
    },
    KitSpec {
        name: "LINN",
        label: "LinnDrum",
    },
    KitSpec {
        name: "Kit3",
        label: "Kit 3",
    },
    KitSpec {
        name: "Kit8",
        label: "Kit 8",
    },
    KitSpec {
        name: "Techno",
        label: "Techno",
    },
    KitSpec {
        name: "Stark",
        label: "Stark",
    },
    KitSpec {
        name: "breakbeat8",
        label: "Breakbeat 8",
    },
    KitSpec {
        name: "breakbeat9",
        label: "Breakbeat 9",
    },
    KitSpec {
        name: "breakbeat13",
        label: "Breakbeat 13",
    },
    KitSpec {
        name: "acoustic-kit",
        label: "Acoustic Kit",
    },
    KitSpec {
        name: "4OP-FM",
        label: "4OP-FM",
    },
    KitSpec {
        name: "TheCheebacabra1",
        label: "The Cheebacabra 1",
    },
    KitSpec {
        name: "TheCheebacabra2",
        label: "The Cheebacabra 2",
    },
];

/// Looks up a kit by name.
pub fn kit(name: &str) -> Option<&'static KitSpec> {
    KITS.iter().find(|kit| kit.name == name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn orders_cover_every_instrument() {
        let mut order = Instrument::ORDER.to_vec();
        let mut trigger = Instrument::TRIGGER_ORDER.to_vec();
        order.sort();
        trigger.sort();
        assert_eq!(order, trigger);
        assert_eq!(Instrument::TRIGGER_ORDER[0], Instrument::Kick);
    }

    #[test]
    fn instrument_names_round_trip() {
        for instrument in Instrument::ORDER {
            assert_eq!(Ok(instrument), instrument.name().parse::<Instrument>());
        }
        assert!("cowbell".parse::<Instrument>().is_err());
    }

    #[test]
    fn hihat_pans_across_the_bar() {
        let hihat = Instrument::Hihat.spec();
        assert!(hihat.pannable);
        assert_eq!([-4.0, 0.0, -1.0], hihat.position_at(0));
        assert_eq!([3.5, 0.0, -1.0], hihat.position_at(15));

        let kick = Instrument::Kick.spec();
        assert!(!kick.pannable);
        assert_eq!(0.5, kick.send_gain);
        assert_eq!(1.0, kick.volume);
    }

    #[test]
    fn effect_lookup() {
        let none = effect(DEFAULT_EFFECT).expect("identity effect");
        assert!(none.file.is_none());
        assert_eq!(0.0, none.wet_mix);

        let hipass = effect("hipass").expect("hipass");
        assert_eq!(Some("filter-hipass5000.wav"), hipass.file);
        assert_eq!(0.0, hipass.dry_mix);
        assert_eq!(4.0, hipass.wet_mix);

        assert!(effect("chorus").is_none());
        assert_eq!(
            1,
            EFFECTS.iter().filter(|effect| effect.file.is_none()).count()
        );
    }

    #[test]
    fn kit_lookup() {
        let r8 = kit(DEFAULT_KIT).expect("default kit");
        assert_eq!("Roland R-8", r8.label);
        assert_eq!("R8/kick.wav", r8.sample_locator(Instrument::Kick));
        assert!(kit("808").is_none());
    }
}
