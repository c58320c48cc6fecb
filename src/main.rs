//! Obscura: live webcam effect renderer CLI.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use obscura::capture::{
    AsyncCapture, CaptureConfig, FrameFeed, FrameSource, NokhwaCapture, StillSource,
};
use obscura::config::{Config, ConfigWatcher, EffectKind};
use obscura::effect::{EffectRenderer, GpuContext};
use obscura::frame::VideoFrame;
use obscura::output::{FrameWriter, OutputBackend, WindowSurface};
use obscura::render_loop::{CancelToken, FramePacer, FpsCounter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Output mode for rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Display in a window (default)
    Window,
    /// Write numbered PNG frames to a directory, without a window
    Frames,
}

/// Effect selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EffectArg {
    /// Invert the camera image's color channels
    Invert,
    /// Blend a constant color over the camera image
    Overlay,
    /// Spinning lit cube scene
    Cube,
    /// User-supplied GLSL fragment shader (see --shader)
    Fragment,
}

impl From<EffectArg> for EffectKind {
    fn from(arg: EffectArg) -> Self {
        match arg {
            EffectArg::Invert => EffectKind::Invert,
            EffectArg::Overlay => EffectKind::Overlay,
            EffectArg::Cube => EffectKind::Cube,
            EffectArg::Fragment => EffectKind::Fragment,
        }
    }
}

/// Live webcam effect renderer.
#[derive(Parser, Debug)]
#[command(name = "obscura")]
#[command(about = "Render GPU effects over webcam video in real-time")]
struct Args {
    /// Camera device index
    #[arg(short, long, default_value = "0")]
    input: u32,

    /// Effect to run
    #[arg(short, long, value_enum, default_value = "invert")]
    effect: EffectArg,

    /// Overlay blend color as r,g,b,a in 0..=1 (for --effect overlay)
    #[arg(long, value_delimiter = ',', num_args = 4, default_value = "0,0,0,0")]
    overlay: Vec<f32>,

    /// Path to a GLSL fragment shader file (for --effect fragment)
    #[arg(short, long)]
    shader: Option<PathBuf>,

    /// Apply the effect to a still image instead of the live camera
    #[arg(long)]
    image: Option<PathBuf>,

    /// Render width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Render height
    #[arg(long, default_value = "720")]
    height: u32,

    /// Target frames per second
    #[arg(long, default_value = "30")]
    fps: u32,

    /// YAML effect config, watched for changes while running
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List available cameras and exit
    #[arg(long)]
    list_devices: bool,

    /// Output mode: window or frames-on-disk
    #[arg(long, value_enum, default_value = "window")]
    output: OutputMode,

    /// Number of frames to write in frames mode (default: until interrupted)
    #[arg(long)]
    frames: Option<u32>,

    /// Directory for captured photos and frames-mode output
    #[arg(long, default_value = "captures")]
    out_dir: PathBuf,
}

impl Args {
    /// Effect settings from the CLI, used when no config file is given.
    fn effect_config(&self) -> Config {
        let mut overlay = [0.0f32; 4];
        for (slot, value) in overlay.iter_mut().zip(&self.overlay) {
            *slot = value.clamp(0.0, 1.0);
        }
        Config {
            effect: self.effect.into(),
            overlay,
            shader: self.shader.clone(),
        }
    }
}

/// Opens the frame feed: a still image if requested, the camera otherwise,
/// and a static fallback pattern when the camera cannot be opened.
fn open_feed(args: &Args, device_index: u32) -> Result<FrameFeed> {
    if let Some(path) = &args.image {
        info!("Using still image {:?}", path);
        return Ok(FrameFeed::Still(StillSource::from_file(path)?));
    }

    let config = CaptureConfig {
        device_index,
        width: args.width,
        height: args.height,
        fps: args.fps,
    };
    info!("Opening camera device {}...", device_index);
    match AsyncCapture::new(config) {
        Ok(capture) => {
            let (w, h) = capture.frame_size();
            info!("Camera opened successfully at {}x{} (async capture)", w, h);
            Ok(FrameFeed::Live(capture))
        }
        Err(e) => {
            warn!("Camera unavailable ({}), showing static fallback", e);
            Ok(FrameFeed::Still(StillSource::fallback_pattern(
                args.width,
                args.height,
            )))
        }
    }
}

/// Application state for the window event loop.
struct ObscuraApp {
    args: Args,
    effect_config: Config,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    surface: Option<WindowSurface>,
    renderer: Option<EffectRenderer>,
    feed: Option<FrameFeed>,
    snapshots: Option<FrameWriter>,
    config_watcher: Option<ConfigWatcher>,
    cancel: CancelToken,
    pacer: FramePacer,
    fps: FpsCounter,
    last_frame: Option<VideoFrame>,
    device_index: u32,
}

impl ObscuraApp {
    fn new(args: Args, effect_config: Config, config_watcher: Option<ConfigWatcher>) -> Self {
        let pacer = FramePacer::new(args.fps);
        let device_index = args.input;
        Self {
            args,
            effect_config,
            window: None,
            gpu: None,
            surface: None,
            renderer: None,
            feed: None,
            snapshots: None,
            config_watcher,
            cancel: CancelToken::new(),
            pacer,
            fps: FpsCounter::new(),
            last_frame: None,
            device_index,
        }
    }

    fn initialize(&mut self, gpu: &GpuContext) -> Result<()> {
        self.feed = Some(open_feed(&self.args, self.device_index)?);

        let descriptor = self.effect_config.descriptor()?;
        let renderer = EffectRenderer::new(gpu, &descriptor, self.args.width, self.args.height)?;
        info!("Effect renderer initialized: {:?}", self.effect_config.effect);
        self.renderer = Some(renderer);

        Ok(())
    }

    /// One iteration of the render loop, driven by the redraw callback.
    fn process_frame(&mut self) {
        self.apply_config_changes();

        if !self.pacer.tick() {
            return;
        }

        let Some(gpu) = &self.gpu else { return };
        let Some(renderer) = &mut self.renderer else {
            return;
        };
        let Some(surface) = &mut self.surface else {
            return;
        };

        // A tick without a fresh frame renders from the previous texture.
        if let Some(feed) = &mut self.feed {
            if let Some(frame) = feed.poll_frame() {
                renderer.upload_frame(gpu, &frame);
                self.last_frame = Some(frame);
            }
        }

        renderer.advance();
        if let Err(e) = surface.render(gpu, renderer) {
            error!("Render error: {}", e);
        }

        if let Some(fps) = self.fps.update() {
            debug!(
                "[Perf] Rendering at {:.2} FPS (Target: {}x{})",
                fps, self.args.width, self.args.height
            );
        }
    }

    fn apply_config_changes(&mut self) {
        let Some(watcher) = &mut self.config_watcher else {
            return;
        };
        let Some((_, new_config)) = watcher.check_for_changes() else {
            return;
        };
        if new_config == self.effect_config {
            return;
        }

        let same_pipeline = new_config.effect == self.effect_config.effect
            && new_config.shader == self.effect_config.shader;

        if same_pipeline {
            // Overlay color changes apply in place without touching the
            // pipeline.
            if let Some(renderer) = &mut self.renderer {
                renderer.set_overlay(new_config.overlay);
            }
            info!("Overlay color updated to {:?}", new_config.overlay);
            self.effect_config = new_config;
            return;
        }

        let descriptor = match new_config.descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!("Ignoring config change: {}", e);
                return;
            }
        };

        let Some(gpu) = &self.gpu else { return };
        match EffectRenderer::new(gpu, &descriptor, self.args.width, self.args.height) {
            Ok(mut renderer) => {
                // Prime the new effect with the frame already on screen.
                if let Some(frame) = &self.last_frame {
                    renderer.upload_frame(gpu, frame);
                }
                self.renderer = Some(renderer);
                self.effect_config = new_config;
                info!("Effect switched to {:?}", self.effect_config.effect);
            }
            Err(e) => {
                error!("Keeping previous effect, rebuild failed: {}", e);
            }
        }
    }

    /// Renders the current frame offscreen and writes it as a PNG.
    fn capture_photo(&mut self) {
        let Some(gpu) = &self.gpu else { return };
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        if self.snapshots.is_none() {
            match FrameWriter::new(self.args.out_dir.clone(), "photo") {
                Ok(writer) => self.snapshots = Some(writer),
                Err(e) => {
                    error!("Cannot create capture directory: {}", e);
                    return;
                }
            }
        }
        let writer = self.snapshots.as_mut().unwrap();

        let path = writer.next_path();
        match renderer.render_offscreen(gpu) {
            Ok(frame) => match writer.write_frame(&frame) {
                Ok(()) => info!("Captured photo {:?}", path),
                Err(e) => error!("Failed to write photo: {}", e),
            },
            Err(e) => error!("Photo render failed: {}", e),
        }
    }

    /// Switches to the next camera device, wrapping at the end of the list.
    fn flip_camera(&mut self) {
        if self.args.image.is_some() {
            return;
        }
        let devices = match NokhwaCapture::list_devices() {
            Ok(devices) if !devices.is_empty() => devices,
            Ok(_) => {
                warn!("No cameras to flip to");
                return;
            }
            Err(e) => {
                warn!("Device query failed: {}", e);
                return;
            }
        };

        let current = devices
            .iter()
            .position(|d| d.index == self.device_index)
            .unwrap_or(0);
        let next = devices[(current + 1) % devices.len()].index;
        if next == self.device_index {
            return;
        }

        info!("Flipping camera {} -> {}", self.device_index, next);
        // Release the current device before opening the next one; drivers
        // commonly refuse to open a busy sibling.
        self.feed = None;
        self.device_index = next;
        match open_feed(&self.args, next) {
            Ok(feed) => self.feed = Some(feed),
            Err(e) => error!("Camera flip failed: {}", e),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::Escape => {
                self.cancel.cancel();
                event_loop.exit();
            }
            KeyCode::Space => self.capture_photo(),
            KeyCode::KeyF => self.flip_camera(),
            _ => {}
        }
    }
}

impl ApplicationHandler for ObscuraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title("Obscura")
            .with_inner_size(PhysicalSize::new(self.args.width, self.args.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let gpu = match GpuContext::new(Some(&window)) {
            Ok(gpu) => gpu,
            Err(e) => {
                error!("Failed to initialize GPU: {}", e);
                event_loop.exit();
                return;
            }
        };

        match WindowSurface::new(&gpu, window) {
            Ok(surface) => {
                self.surface = Some(surface);
                info!("Window created successfully");

                if let Err(e) = self.initialize(&gpu) {
                    error!("Initialization error: {}", e);
                    event_loop.exit();
                    return;
                }
                self.gpu = Some(gpu);
            }
            Err(e) => {
                error!("Failed to create surface: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window closed");
                self.cancel.cancel();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let (Some(gpu), Some(surface)) = (&self.gpu, &mut self.surface) {
                    surface.resize(gpu, size);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::RedrawRequested => {
                // The loop ends here once the token is cancelled: no draw,
                // no reschedule.
                if self.cancel.is_cancelled() {
                    return;
                }
                self.process_frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.list_devices {
        println!("Available cameras:");
        match NokhwaCapture::list_devices() {
            Ok(devices) => {
                for device in devices {
                    println!("  [{}] {}", device.index, device.name);
                }
            }
            Err(e) => {
                eprintln!("Failed to list devices: {}", e);
            }
        }
        return Ok(());
    }

    info!("Starting Obscura...");

    // A config file overrides the CLI effect settings and stays watched for
    // live changes.
    let config_watcher = ConfigWatcher::new(args.config.clone());
    let effect_config = config_watcher
        .as_ref()
        .and_then(|w| w.current().cloned())
        .unwrap_or_else(|| args.effect_config());

    match args.output {
        OutputMode::Window => run_window_mode(args, effect_config, config_watcher)?,
        OutputMode::Frames => run_frames_mode(args, effect_config, config_watcher)?,
    }

    Ok(())
}

/// Run in window output mode (default).
fn run_window_mode(
    args: Args,
    effect_config: Config,
    config_watcher: Option<ConfigWatcher>,
) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ObscuraApp::new(args, effect_config, config_watcher);
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Run headless, writing rendered frames to disk.
fn run_frames_mode(
    args: Args,
    mut effect_config: Config,
    mut config_watcher: Option<ConfigWatcher>,
) -> Result<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        handler_token.cancel();
    })?;

    let gpu = GpuContext::new(None)?;
    let mut feed = open_feed(&args, args.input)?;
    let descriptor = effect_config.descriptor()?;
    let mut renderer = EffectRenderer::new(&gpu, &descriptor, args.width, args.height)?;
    info!("Effect renderer initialized: {:?}", effect_config.effect);

    let mut writer = FrameWriter::new(args.out_dir.clone(), "frame")?;
    let frame_duration = Duration::from_secs_f64(1.0 / args.fps as f64);
    let mut fps_counter = FpsCounter::new();
    let mut written = 0u32;

    info!("Writing frames to {:?} at {} fps", args.out_dir, args.fps);

    while !cancel.is_cancelled() {
        if let Some(limit) = args.frames {
            if written >= limit {
                break;
            }
        }
        let frame_start = Instant::now();

        if let Some(watcher) = &mut config_watcher {
            if let Some((_, new_config)) = watcher.check_for_changes() {
                if new_config != effect_config {
                    renderer.set_overlay(new_config.overlay);
                    effect_config.overlay = new_config.overlay;
                    if new_config != effect_config {
                        warn!("Effect changes require a restart in frames mode");
                    }
                }
            }
        }

        if let Some(frame) = feed.poll_frame() {
            renderer.upload_frame(&gpu, &frame);
        }
        renderer.advance();

        match renderer.render_offscreen(&gpu) {
            Ok(frame) => {
                if let Err(e) = writer.write_frame(&frame) {
                    error!("Output error: {}", e);
                } else {
                    written += 1;
                }
            }
            Err(e) => error!("Render error: {}", e),
        }

        if let Some(fps) = fps_counter.update() {
            info!("Frames mode: {:.2} FPS, {} written", fps, written);
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    info!("Frame output stopped after {} frames", written);
    Ok(())
}
