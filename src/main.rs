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
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use drumsampler::catalog::{EFFECTS, KITS};
use drumsampler::scheduler::OnStep;
use drumsampler::{audio, config, BeatDocument};
use duration_string::DurationString;
use tracing::{debug, info};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sixteen-step drum sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available drum kits.
    Kits {},
    /// Lists the available effects.
    Effects {},
    /// Lists the available audio output devices.
    Devices {},
    /// Prints a beat document to stdout.
    Template {
        /// Print the demo beat instead of the empty one.
        #[arg(long)]
        demo: bool,
    },
    /// Verifies a beat document.
    Verify {
        /// The path to the beat document.
        path: PathBuf,
    },
    /// Plays a beat through the configured audio device.
    Play {
        /// The path to the sampler config.
        config_path: PathBuf,
        /// The beat document to play.
        #[arg(short, long, conflicts_with = "demo")]
        beat: Option<PathBuf>,
        /// Play the demo beat.
        #[arg(long)]
        demo: bool,
        /// Overrides the beat's kit.
        #[arg(short, long)]
        kit: Option<String>,
        /// Overrides the beat's effect.
        #[arg(short, long)]
        effect: Option<String>,
        /// How long to play for.
        #[arg(short, long, default_value = "30s")]
        duration: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kits {} => {
            println!("Kits (count: {}):", KITS.len());
            for kit in KITS.iter() {
                println!("- {} ({})", kit.name, kit.label);
            }
        }
        Commands::Effects {} => {
            println!("Effects (count: {}):", EFFECTS.len());
            for effect in EFFECTS.iter() {
                println!("- {} ({})", effect.name, effect.label);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Template { demo } => {
            let document = if demo {
                BeatDocument::demo()
            } else {
                BeatDocument::empty()
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Verify { path } => {
            let document = BeatDocument::from_json(&fs::read_to_string(&path)?)?;
            println!("{}", document.status_line());
        }
        Commands::Play {
            config_path,
            beat,
            demo,
            kit,
            effect,
            duration,
        } => {
            let duration: Duration = DurationString::from_string(duration)?.into();
            let on_step: OnStep = Arc::new(|event| match event {
                Some(event) => debug!(step = event.step, time = event.time, "Step"),
                None => info!("Stopped"),
            });

            let sampler = config::init_sampler(&config_path, on_step)?;
            sampler.initialize().await?;

            if let Some(beat) = beat {
                sampler.load_json(&fs::read_to_string(&beat)?).await?;
            } else if demo {
                sampler.load(BeatDocument::demo()).await?;
            }
            if let Some(kit) = kit {
                if !sampler.set_kit(&kit).await? {
                    return Err(format!("unknown kit {}", kit).into());
                }
            }
            if let Some(effect) = effect {
                if !sampler.set_effect(&effect) {
                    return Err(format!("unknown effect {}", effect).into());
                }
            }

            println!("{}", sampler.document().status_line());
            sampler.play();
            tokio::time::sleep(duration).await;
            sampler.destroy();
        }
    }

    Ok(())
}
