mod platform;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use sysrec_core::storage::metadata;
use sysrec_core::{CaptureConfiguration, CaptureError, ContentProvider, CaptureSource, RecordingResult};
use sysrec_core::{CaptureController, StartOutcome};

/// Record system audio to a 32-bit float WAV file.
#[derive(Debug, Parser)]
#[command(name = "audio-cli", version)]
struct Args {
    /// Seconds to record; 0 or less records until Ctrl-C
    #[arg(short, long, default_value_t = 10, allow_negative_numbers = true)]
    duration: i64,

    /// Output WAV file, overwritten if it exists
    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,

    /// Log every received audio batch
    #[arg(short, long)]
    verbose: bool,

    /// Write a JSON metadata sidecar next to the recording
    #[arg(long)]
    metadata: bool,

    /// Keep this process's own playback in the recording
    #[arg(long)]
    include_own_audio: bool,
}

impl Args {
    fn configuration(&self) -> CaptureConfiguration {
        let mut config = CaptureConfiguration::new(&self.output);
        config.verbose = self.verbose;
        config.stream.excludes_current_process_audio = !self.include_own_audio;
        config
    }

    /// `None` means record until interrupted.
    fn time_limit(&self) -> Option<Duration> {
        u64::try_from(self.duration)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let controller = platform::controller();
    let stop = controller.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received interrupt signal. Stopping capture...");
        stop.request_stop();
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    match record(&controller, &args) {
        Ok(Some(result)) => {
            log::info!(
                "Audio capture stopped. File saved. {:.2}s, {} frames, sha256 {}",
                result.duration_secs,
                result.frames_written,
                result.checksum
            );
            ExitCode::SUCCESS
        }
        Ok(None) => {
            log::warn!("Audio capture stopped before any audio arrived");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn record<P, S>(controller: &CaptureController<P, S>, args: &Args) -> Result<Option<RecordingResult>, CaptureError>
where
    P: ContentProvider,
    S: CaptureSource<Target = P::Target>,
{
    if controller.start(&args.configuration())? == StartOutcome::AlreadyCapturing {
        return Ok(None);
    }

    match args.time_limit() {
        Some(limit) => {
            log::info!("Recording for {} seconds...", limit.as_secs());
            if controller.wait_until_stopped(Some(limit)) {
                log::warn!("Capture ended before the requested duration");
            }
        }
        None => {
            log::info!("Recording until interrupted (Ctrl-C)...");
            controller.wait_until_stopped(None);
        }
    }

    let result = controller.stop()?;
    if let (Some(result), true) = (&result, args.metadata) {
        let path = metadata::write_metadata(&result.metadata, &result.file_path)?;
        log::info!("Metadata saved to: {}", path.display());
    }
    Ok(result)
}
