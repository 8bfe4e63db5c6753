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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the render callback when DRUMSAMPLER_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// Parses a priority in 0..100.
fn parse_priority(value: &str) -> Option<ThreadPriorityValue> {
    let n = value.trim().parse::<u8>().ok()?;
    if n >= 100 {
        return None;
    }
    ThreadPriorityValue::try_from(n).ok()
}

/// Reads DRUMSAMPLER_THREAD_PRIORITY (0-99) once, when the stream is built.
pub fn render_thread_priority() -> Option<ThreadPriorityValue> {
    std::env::var("DRUMSAMPLER_THREAD_PRIORITY")
        .ok()
        .and_then(|v| parse_priority(&v))
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_RENDER_THREAD_PRIORITY).ok())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether to try SCHED_FIFO for the render callback. Opt out with DRUMSAMPLER_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("DRUMSAMPLER_DISABLE_RT_AUDIO")
}

/// Raises the calling thread's priority the first time it's called from that thread.
pub fn configure_render_thread(
    priority: Option<ThreadPriorityValue>,
    rt_audio: bool,
    configured: &mut bool,
) {
    if *configured {
        return;
    }
    *configured = true;
    let Some(priority) = priority else {
        return;
    };

    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise render thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for render thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for render thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn priority_parsing() {
        assert!(parse_priority("42").is_some());
        assert!(parse_priority(" 99 ").is_some());
        assert!(parse_priority("100").is_none());
        assert!(parse_priority("loud").is_none());
    }
}
