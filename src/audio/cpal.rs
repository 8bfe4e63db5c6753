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
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, warn};

use super::graph::{AudioGraph, NoteGraph};
use super::mixer::Mixer;
use super::thread_priority;
use crate::error::SamplerError;

/// How long to wait for the output stream to come up.
const STREAM_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages from the control side to the render callback.
enum Command {
    Route(Arc<AudioGraph>),
    Start(NoteGraph),
}

/// A small wrapper around a cpal::Device. The device clock is the number of
/// frames its stream has rendered.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The rate the stream runs at.
    sample_rate: u32,
    /// Frames rendered by the stream.
    clock: Arc<AtomicU64>,
    /// The running output stream. Listed devices don't have one.
    output: Option<OutputManager>,
}

/// Owns the thread that keeps the cpal stream alive.
struct OutputManager {
    /// Channel into the render callback.
    commands: crossbeam_channel::Sender<Command>,
    /// Dropping this tells the output thread to drop the stream.
    shutdown: Option<crossbeam_channel::Sender<()>>,
    /// Handle to the output thread.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Builds the render callback for a stream sample type. The callback owns the
/// mixer; everything else reaches it over the command channel.
fn render_callback<T>(
    mut mixer: Mixer,
    commands: crossbeam_channel::Receiver<Command>,
    channels: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = thread_priority::render_thread_priority();
    let rt_audio = thread_priority::rt_audio_enabled();
    let mut configured = false;
    let mut scratch: Vec<f32> = Vec::new();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        thread_priority::configure_render_thread(priority, rt_audio, &mut configured);

        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Route(graph) => mixer.route(graph),
                Command::Start(note) => mixer.start(note),
            }
        }

        scratch.resize(data.len(), 0.0);
        mixer.fill(&mut scratch, channels);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Mixer,
    commands: crossbeam_channel::Receiver<Command>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    device.build_output_stream(
        config,
        render_callback::<T>(mixer, commands, channels),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

impl OutputManager {
    /// Starts the output thread, which creates the stream and holds it until shutdown.
    fn start(
        device: cpal::Device,
        sample_rate: u32,
        clock: Arc<AtomicU64>,
    ) -> Result<OutputManager, SamplerError> {
        let supported = device
            .default_output_config()
            .map_err(|e| SamplerError::UnsupportedEnvironment(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let output_thread = thread::spawn(move || {
            let mixer = Mixer::new(sample_rate, clock);
            let stream = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &config, mixer, commands_rx)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &config, mixer, commands_rx)
                }
                cpal::SampleFormat::I32 => {
                    build_stream::<i32>(&device, &config, mixer, commands_rx)
                }
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {other:?}")));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create stream: {e}")));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start stream: {e}")));
                return;
            }
            info!(
                channels = config.channels,
                sample_rate,
                format = ?sample_format,
                "CPAL output stream started"
            );
            let _ = ready_tx.send(Ok(()));

            // Returns once the manager drops its sender.
            let _ = shutdown_rx.recv();
            debug!("CPAL output stream stopped");
            drop(stream);
        });

        match ready_rx.recv_timeout(STREAM_STARTUP_TIMEOUT) {
            Ok(Ok(())) => Ok(OutputManager {
                commands: commands_tx,
                shutdown: Some(shutdown_tx),
                output_thread: Some(output_thread),
            }),
            Ok(Err(reason)) => {
                let _ = output_thread.join();
                Err(SamplerError::UnsupportedEnvironment(reason))
            }
            Err(_) => Err(SamplerError::UnsupportedEnvironment(
                "timed out waiting for the output stream".to_string(),
            )),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Output stream is gone, dropping command");
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, SamplerError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, SamplerError> {
        let unsupported = |e: &dyn std::error::Error| SamplerError::UnsupportedEnvironment(e.to_string());

        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| unsupported(&e))?;
        let _shh_stderr = shh::stderr().map_err(|e| unsupported(&e))?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(|e| unsupported(&e))?;
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name().map_err(|e| unsupported(&e))?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate: 0,
                        clock: Arc::new(AtomicU64::new(0)),
                        output: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device and starts its output stream. "default" picks
    /// the default host's default output.
    pub fn get(name: &str, sample_rate: u32) -> Result<Device, SamplerError> {
        let mut device = if name == "default" {
            Device::default_output()?
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| {
                    SamplerError::UnsupportedEnvironment(format!("no device found with name {name}"))
                })?
        };

        device.sample_rate = sample_rate;
        device.output = Some(OutputManager::start(
            device.device.clone(),
            sample_rate,
            device.clock.clone(),
        )?);
        info!(device = %device, sample_rate, "Opened audio device");
        Ok(device)
    }

    fn default_output() -> Result<Device, SamplerError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            SamplerError::UnsupportedEnvironment("no default output device".to_string())
        })?;
        let max_channels = device
            .default_output_config()
            .map_err(|e| SamplerError::UnsupportedEnvironment(e.to_string()))?
            .channels();
        Ok(Device {
            name: device
                .name()
                .map_err(|e| SamplerError::UnsupportedEnvironment(e.to_string()))?,
            max_channels,
            host_id: host.id(),
            device,
            sample_rate: 0,
            clock: Arc::new(AtomicU64::new(0)),
            output: None,
        })
    }

    fn send(&self, command: Command) {
        match &self.output {
            Some(output) => output.send(command),
            None => warn!(device = self.name, "Device has no output stream"),
        }
    }
}

impl super::Device for Device {
    fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn supports_compressor(&self) -> bool {
        true
    }

    fn route(&self, graph: Arc<AudioGraph>) {
        self.send(Command::Route(graph));
    }

    fn schedule(&self, note: NoteGraph) {
        debug!(
            device = self.name,
            instrument = %note.instrument,
            step = note.step,
            start_time = note.source.start_time,
            "Scheduling note"
        );
        self.send(Command::Start(note));
    }
}
