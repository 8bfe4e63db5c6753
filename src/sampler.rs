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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, span, trace, warn, Instrument as _, Level};

use crate::{
    audio::{AudioGraph, Device, NoteGraph, NoteParams},
    catalog::{self, Instrument, DEFAULT_EFFECT, DEFAULT_KIT},
    document::{BeatDocument, Hit},
    error::SamplerError,
    samples::{AssetLoader, AssetSource, EffectBank, KitBank},
    scheduler::{OnStep, Scheduler, Sequence, DEFAULT_GRANULARITY},
};

/// Tuning for a sampler session.
#[derive(Clone)]
pub struct SamplerOptions {
    /// Receives step highlights while playing and `None` when playback stops.
    pub on_step: OnStep,
    /// Pause between scheduler polls. Defaults to [`DEFAULT_GRANULARITY`].
    pub granularity: Duration,
    /// Gives up on a single sample or impulse after this long.
    pub load_timeout: Option<Duration>,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        SamplerOptions {
            on_step: Arc::new(|_| {}),
            granularity: DEFAULT_GRANULARITY,
            load_timeout: None,
        }
    }
}

/// The mutable parts of a session.
struct State {
    document: BeatDocument,
    kit: Option<Arc<KitBank>>,
    effects: Option<Arc<EffectBank>>,
}

/// Turns document cells into note graphs on the device.
struct Voices {
    device: Arc<dyn Device>,
    graph: Arc<AudioGraph>,
    state: RwLock<State>,
}

impl Voices {
    /// Plays one cell at device time `when`. Silent cells and instruments
    /// without a loaded sample do nothing.
    fn play_cell(&self, instrument: Instrument, step: usize, when: f64) {
        let state = self.state.read();
        let Some(hit) = state.document.note(instrument, step) else {
            return;
        };
        if !hit.is_audible() {
            return;
        }
        let buffer = match state.kit.as_ref().and_then(|kit| kit.buffer(instrument)) {
            Some(buffer) => buffer,
            None => {
                trace!(%instrument, step, "No sample loaded, skipping note");
                return;
            }
        };
        let params = NoteParams {
            instrument,
            step,
            hit,
            pitch: state.document.instruments[instrument].pitch,
            dry_mix: catalog::effect(&state.document.effect).map_or(1.0, |e| e.dry_mix),
            when,
        };
        drop(state);

        if let Some(note) = NoteGraph::build(buffer, params) {
            self.device.schedule(note);
        }
    }

    /// Binds the document's effect to the convolver and sets the return level.
    /// Effects without a loaded impulse keep the one already bound.
    fn apply_effect(&self) {
        let state = self.state.read();
        let name = state.document.effect.as_str();
        if let Some(buffer) = state.effects.as_ref().and_then(|bank| bank.buffer(name)) {
            if self.graph.set_impulse(&buffer) {
                debug!(effect = name, "Bound impulse response");
            }
        }
        drop(state);
        self.apply_effect_level();
    }

    /// Sets the effect return to the document's mix times the effect's wet mix.
    fn apply_effect_level(&self) {
        let state = self.state.read();
        let wet_mix = catalog::effect(&state.document.effect).map_or(0.0, |e| e.wet_mix);
        self.graph.set_effect_gain((state.document.effect_mix * wet_mix as f64) as f32);
    }
}

impl Sequence for Voices {
    fn now(&self) -> f64 {
        self.device.current_time()
    }

    fn pace(&self) -> (f64, f64) {
        let state = self.state.read();
        (
            state.document.seconds_per_beat(),
            state.document.swing_factor,
        )
    }

    fn trigger(&self, step: usize, when: f64) {
        for instrument in Instrument::TRIGGER_ORDER {
            self.play_cell(instrument, step, when);
        }
    }
}

struct Session {
    voices: Arc<Voices>,
    scheduler: Scheduler,
    kit_loader: AssetLoader,
    impulse_loader: AssetLoader,
    /// Playback restarts once the current kit finishes loading.
    resume: AtomicBool,
    destroyed: AtomicBool,
}

/// A drum machine session: one document, one kit, one effect, one transport.
///
/// Cloning is cheap and every clone drives the same session. Operations that
/// load assets are async and resolve when the loading is done; everything else
/// takes effect immediately.
#[derive(Clone)]
pub struct Sampler {
    session: Arc<Session>,
}

impl Sampler {
    /// Creates a session on a device. Kit samples come from `kit_source` and
    /// impulse responses from `impulse_source`. Must be called from within a
    /// tokio runtime.
    pub fn new(
        device: Arc<dyn Device>,
        kit_source: Arc<dyn AssetSource>,
        impulse_source: Arc<dyn AssetSource>,
        options: SamplerOptions,
    ) -> Result<Sampler, SamplerError> {
        let runtime = Handle::try_current().map_err(|_| {
            SamplerError::UnsupportedEnvironment("no tokio runtime available".to_string())
        })?;

        let graph = AudioGraph::new(device.supports_compressor());
        device.route(graph.clone());
        let sample_rate = device.sample_rate();
        info!(
            device = %device,
            sample_rate,
            compressor = graph.has_compressor(),
            "Created sampler"
        );

        Ok(Sampler {
            session: Arc::new(Session {
                voices: Arc::new(Voices {
                    device,
                    graph,
                    state: RwLock::new(State {
                        document: BeatDocument::empty(),
                        kit: None,
                        effects: Some(EffectBank::new()),
                    }),
                }),
                scheduler: Scheduler::new(runtime, options.granularity, options.on_step),
                kit_loader: AssetLoader::new(kit_source, sample_rate)
                    .with_timeout(options.load_timeout),
                impulse_loader: AssetLoader::new(impulse_source, sample_rate)
                    .with_timeout(options.load_timeout),
                resume: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    fn check_alive(&self) -> Result<(), SamplerError> {
        if self.session.destroyed.load(Ordering::Acquire) {
            return Err(SamplerError::Destroyed);
        }
        Ok(())
    }

    /// Resets the document, loads every impulse response and then the default kit.
    pub async fn initialize(&self) -> Result<(), SamplerError> {
        self.check_alive()?;
        let span = span!(Level::INFO, "initialize");

        async {
            self.stop();
            self.replace_document(BeatDocument::empty());
            self.set_effect(DEFAULT_EFFECT);

            let effects = self.session.voices.state.read().effects.clone();
            if let Some(effects) = effects {
                effects.init(&self.session.impulse_loader).await;
            }
            self.session.voices.apply_effect();

            self.set_kit(DEFAULT_KIT).await?;
            info!("Sampler initialized");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Stops playback and releases the banks. Transport calls afterwards do nothing.
    pub fn destroy(&self) {
        self.stop();
        if self.session.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.session.voices.state.write();
        state.kit = None;
        state.effects = None;
        state.document = BeatDocument::empty();
        info!("Sampler destroyed");
    }

    /// Stops playback and loads a document, then its effect and kit. Resolves once the kit is ready.
    pub async fn load(&self, document: BeatDocument) -> Result<(), SamplerError> {
        self.check_alive()?;
        document.validate()?;
        self.stop();

        let effect = if document.effect.is_empty() {
            DEFAULT_EFFECT.to_string()
        } else {
            document.effect.clone()
        };
        let kit = document
            .kit
            .clone()
            .unwrap_or_else(|| DEFAULT_KIT.to_string());
        info!(kit, effect, tempo = document.tempo, "Loading document");

        self.replace_document(document);
        self.set_effect(&effect);
        self.set_kit(&kit).await?;
        Ok(())
    }

    /// Parses a JSON document and loads it.
    pub async fn load_json(&self, json: &str) -> Result<(), SamplerError> {
        self.load(BeatDocument::from_json(json)?).await
    }

    /// Stops playback and starts over with the empty beat, default effect and default kit.
    pub async fn reset(&self) -> Result<(), SamplerError> {
        self.check_alive()?;
        self.stop();
        self.replace_document(BeatDocument::empty());
        self.set_effect(DEFAULT_EFFECT);
        self.set_kit(DEFAULT_KIT).await?;
        Ok(())
    }

    fn replace_document(&self, document: BeatDocument) {
        self.session.voices.state.write().document = document;
    }

    pub fn is_playing(&self) -> bool {
        self.session.scheduler.is_playing()
    }

    /// Starts playback. Returns false if already playing or destroyed.
    pub fn play(&self) -> bool {
        if self.check_alive().is_err() {
            warn!("Ignoring play on a destroyed sampler");
            return false;
        }
        if self.session.scheduler.is_playing() {
            return false;
        }
        self.session.scheduler.stop();
        self.session.voices.apply_effect();

        let sequence: Arc<dyn Sequence> = self.session.voices.clone();
        self.session.scheduler.play(sequence)
    }

    /// Stops playback and cancels any pending resume. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        self.session.resume.store(false, Ordering::Release);
        self.session.scheduler.stop()
    }

    /// Plays if stopped, stops if playing. Returns whether the sampler is now playing.
    pub fn toggle(&self) -> bool {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
        self.is_playing()
    }

    /// Writes one pattern cell. Returns false if the column doesn't exist.
    pub fn set_note(&self, instrument: Instrument, column: usize, hit: Hit) -> bool {
        self.session
            .voices
            .state
            .write()
            .document
            .set_note(instrument, column, hit)
    }

    /// Plays a single cell right away.
    pub fn audition(&self, instrument: Instrument, column: usize) {
        let voices = &self.session.voices;
        voices.play_cell(instrument, column, voices.device.current_time());
    }

    /// Switches the effect. Unknown names are ignored and return false.
    pub fn set_effect(&self, name: &str) -> bool {
        if catalog::effect(name).is_none() {
            debug!(effect = name, "Ignoring unknown effect");
            return false;
        }
        self.session.voices.state.write().document.effect = name.to_string();
        self.session.voices.apply_effect();
        true
    }

    /// Stores a new effect mix when given one and recomputes the effect return level.
    pub fn set_effect_level(&self, mix: Option<f64>) {
        if let Some(mix) = mix {
            self.session
                .voices
                .state
                .write()
                .document
                .set_effect_mix(mix);
        }
        self.session.voices.apply_effect_level();
    }

    /// Switches to a new kit and loads it. Unknown names are ignored and return
    /// false. If the sampler was playing, it resumes once the kit is ready,
    /// unless something else stopped or replaced the load in the meantime.
    pub async fn set_kit(&self, name: &str) -> Result<bool, SamplerError> {
        self.check_alive()?;
        let Some(kit) = catalog::kit(name) else {
            debug!(kit = name, "Ignoring unknown kit");
            return Ok(false);
        };

        if self.session.scheduler.stop() {
            self.session.resume.store(true, Ordering::Release);
        }

        let bank = KitBank::new(kit);
        {
            let mut state = self.session.voices.state.write();
            state.document.kit = Some(kit.name.to_string());
            state.kit = Some(bank.clone());
        }

        // Runs to completion, resume included, even if the caller is dropped.
        let sampler = self.clone();
        let load = tokio::spawn(
            async move {
                bank.preload(&sampler.session.kit_loader).await;
                sampler.finish_kit_load(&bank);
            }
            .instrument(span!(Level::DEBUG, "kit load", kit = kit.name)),
        );
        if let Err(e) = load.await {
            warn!(kit = kit.name, err = %e, "Kit load task failed");
        }
        Ok(true)
    }

    /// Resumes playback if a switch stopped it and `bank` is still the active kit.
    fn finish_kit_load(&self, bank: &Arc<KitBank>) {
        let current = self
            .session
            .voices
            .state
            .read()
            .kit
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, bank));
        if current && self.session.resume.swap(false, Ordering::AcqRel) {
            debug!(kit = bank.name(), "Resuming playback after kit load");
            self.play();
        }
    }

    /// The name of the active kit bank.
    pub fn kit(&self) -> Option<&'static str> {
        self.session.voices.state.read().kit.as_ref().map(|kit| kit.name())
    }

    /// Returns true once the active kit has finished loading.
    pub fn kit_ready(&self) -> bool {
        self.session
            .voices
            .state
            .read()
            .kit
            .as_ref()
            .is_some_and(|kit| kit.is_ready())
    }

    /// The current document as JSON.
    pub fn serialized_document(&self) -> Result<String, SamplerError> {
        Ok(self.session.voices.state.read().document.to_json()?)
    }

    /// A copy of the current document.
    pub fn document(&self) -> BeatDocument {
        self.session.voices.state.read().document.clone()
    }

    pub fn tempo_up(&self) -> u32 {
        let mut state = self.session.voices.state.write();
        state.document.tempo_up();
        state.document.tempo
    }

    pub fn tempo_down(&self) -> u32 {
        let mut state = self.session.voices.state.write();
        state.document.tempo_down();
        state.document.tempo
    }

    /// Sets the tempo, clamped. Returns the tempo in effect.
    pub fn set_tempo(&self, tempo: u32) -> u32 {
        let mut state = self.session.voices.state.write();
        state.document.set_tempo(tempo);
        state.document.tempo
    }

    pub fn set_swing(&self, swing: f64) {
        self.session.voices.state.write().document.set_swing(swing);
    }

    pub fn set_pitch(&self, instrument: Instrument, pitch: f64) {
        self.session
            .voices
            .state
            .write()
            .document
            .set_pitch(instrument, pitch);
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("device", &self.session.voices.device.to_string())
            .field("kit", &self.kit())
            .field("playing", &self.is_playing())
            .finish()
    }
}
