use anyhow::{Context, Result};
use clap::Parser;
use hue_finder::capture::{
    BackendRegistry, CameraProvider, PassthroughProvider, ProviderConfig, ProviderFactory,
    WebcamProvider,
};
use hue_finder::control::ControlRequest;
use hue_finder::controller::{ControllerConfig, StaticPermissions};
use hue_finder::output::{Presenter, TickOutput, V4L2Output};
use hue_finder::profile::{ColorPreset, HighlightStyle};
use hue_finder::session::{Session, SessionConfig};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index (first device found if omitted)
    #[arg(short, long)]
    input_device: Option<u32>,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Seconds a camera provider gets to produce its first frame
    #[arg(long, default_value_t = 4.0)]
    probe_timeout_secs: f32,

    /// Score the mask at 1/N resolution
    #[arg(long, default_value_t = 2)]
    mask_downsample: u32,

    /// Initial target color (red, blue, yellow, green, black, white)
    #[arg(long, default_value = "red")]
    preset: ColorPreset,

    /// Initial highlight style (bw or glow)
    #[arg(long, default_value = "bw")]
    style: HighlightStyle,

    /// Simulate a denied camera permission
    #[arg(long)]
    deny_camera: bool,

    /// Do not fall back to the local webcam
    #[arg(long)]
    no_webcam_fallback: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Hue finder starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let mut output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let config = session_config(&args)?;
    let factory = provider_factory(!args.no_webcam_fallback);
    let permissions = Box::new(StaticPermissions::new(!args.deny_camera));
    let mut session = Session::new(
        config,
        factory,
        permissions,
        output.supports_mask_compositing(),
    );

    let requests = spawn_control_reader();
    run_loop(&mut session, &mut output, &requests, args.fps)?;

    session.shutdown();
    Ok(())
}

fn session_config(args: &Args) -> Result<SessionConfig> {
    let probe_timeout = Duration::try_from_secs_f32(args.probe_timeout_secs)
        .context("Invalid probe timeout")?;
    Ok(SessionConfig {
        controller: ControllerConfig {
            probe_timeout,
            provider: ProviderConfig {
                width: args.capture_width,
                height: args.capture_height,
                fps: args.fps,
                device_index: args.input_device,
            },
            ..ControllerConfig::default()
        },
        mask_downsample: args.mask_downsample,
        preset: args.preset,
        style: args.style,
    })
}

/// Candidates in probe order: headset passthrough first, then the webcam.
fn provider_factory(webcam_fallback: bool) -> ProviderFactory {
    // no passthrough backend on this platform; the provider reports that itself
    let registry = BackendRegistry::new();
    Box::new(move || {
        let mut candidates: Vec<Box<dyn CameraProvider>> =
            vec![Box::new(PassthroughProvider::new(&registry))];
        if webcam_fallback {
            candidates.push(Box::new(WebcamProvider::new()));
        }
        candidates
    })
}

/// Read control commands from stdin, one per line.
fn spawn_control_reader() -> Receiver<ControlRequest> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlRequest>() {
                Ok(request) => {
                    if tx.send(request).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    });
    rx
}

fn run_loop<P: Presenter>(
    session: &mut Session,
    presenter: &mut P,
    requests: &Receiver<ControlRequest>,
    target_fps: u32,
) -> Result<()> {
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut total_tick_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut input_open = true;

    session.start(Instant::now());
    tracing::info!("Commands: preset <name>, next, style bw|glow, toggle-style, tol <h> <s> <v>, calibrate, panel on|off, basic, advanced");
    tracing::info!("Press Ctrl+C to stop");

    loop {
        let loop_start = Instant::now();

        while input_open {
            match requests.try_recv() {
                Ok(request) => session.handle(request, loop_start),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Control input closed");
                    input_open = false;
                }
            }
        }

        let tick_start = Instant::now();
        let output = session.tick(loop_start);
        let coverage = match &output {
            TickOutput::Advanced(composite) => Some(composite.mask.coverage()),
            _ => None,
        };
        total_tick_time += tick_start.elapsed();

        let output_start = Instant::now();
        presenter
            .present(&output)
            .context("Failed to present frame")?;
        total_output_time += output_start.elapsed();

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg_tick_ms = total_tick_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / frame_count as f64;
            match coverage {
                Some(coverage) => tracing::info!(
                    "Frame {}: mode={}, tick={:.1}ms, output={:.1}ms, coverage={:.1}%",
                    frame_count,
                    session.mode(),
                    avg_tick_ms,
                    avg_output_ms,
                    coverage * 100.0
                ),
                None => tracing::info!(
                    "Frame {}: mode={}, tick={:.1}ms, output={:.1}ms ({})",
                    frame_count,
                    session.mode(),
                    avg_tick_ms,
                    avg_output_ms,
                    session.status()
                ),
            }
        }

        // Maintain target frame rate
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}
