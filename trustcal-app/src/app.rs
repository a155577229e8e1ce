use crate::args::TrustcalArgs;
use crate::export::StimulusExporter;
use ab_glyph::FontVec;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use trustcal_core::{Control, SessionPhase, TrialType};
use trustcal_experiment::{
    SaveOutcome, ScanDevice, SerialScanner, SerialSettings, Session, SessionConfig, SessionEvent,
    SessionId, SimulatedScanner,
};
use trustcal_render::{Hit, SkiaRenderer, ViewState};
use trustcal_timing::{HighPrecisionTimer, Timer};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

type AppSession = Session<HighPrecisionTimer, StdRng, Box<dyn ScanDevice>>;

/// Animation frame interval while the scanning indicator is on screen.
const SCAN_FRAME: Duration = Duration::from_millis(33);
const PULSE_PERIOD_MS: u64 = 1500;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,
    session: AppSession,
    view: ViewState,
    fullscreen: bool,
    exporter: Option<StimulusExporter>,
    last_exported: Option<(TrialType, usize)>,
    cursor: PhysicalPosition<f64>,
    should_exit: bool,
}

impl App {
    pub fn new(args: TrustcalArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(dir) = &args.output_dir {
            config.output.directory = dir.clone();
        }
        fs::create_dir_all(&config.output.directory).with_context(|| {
            format!(
                "failed to create output directory {}",
                config.output.directory.display()
            )
        })?;

        let prompt = fs::read_to_string(&args.prompt)
            .with_context(|| format!("failed to read prompt file {}", args.prompt.display()))?;
        let font_bytes = fs::read(&args.font)
            .with_context(|| format!("failed to read font {}", args.font.display()))?;
        let font = FontVec::try_from_vec(font_bytes)
            .with_context(|| format!("invalid font {}", args.font.display()))?;

        let seed = args.seed.unwrap_or_else(|| rand::rng().random());
        let timer = HighPrecisionTimer::new();
        let device: Box<dyn ScanDevice> = match &args.port {
            Some(port) => {
                info!("Using scan device on {} at {} baud", port.display(), args.baud);
                Box::new(SerialScanner::spawn(SerialSettings::new(port, args.baud))?)
            }
            None => {
                info!("No port given, scans are simulated");
                Box::new(SimulatedScanner::new(
                    timer.clone(),
                    Duration::from_millis(config.scan_delay_ms),
                ))
            }
        };

        let session = Session::new(
            config,
            prompt,
            SessionId::generate(),
            timer,
            StdRng::seed_from_u64(seed),
            device,
        )?;
        info!("Session {} (seed {seed})", session.session_id());
        if let Err(e) = session.write_manifest(Some(seed)) {
            warn!("Could not write session manifest: {e}");
        }

        let exporter = args
            .export_stimuli
            .as_ref()
            .map(StimulusExporter::new)
            .transpose()?;
        if let Some(exporter) = &exporter {
            info!("Exporting stimuli to {}", exporter.directory().display());
        }

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            font: Some(font),
            session,
            view: ViewState::default(),
            fullscreen: args.fullscreen,
            exporter,
            last_exported: None,
            cursor: PhysicalPosition::new(0.0, 0.0),
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
        info!("Press SPACE to start or ESC to exit.");

        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut window_attributes = Window::default_attributes()
            .with_title("Robot Controller")
            .with_inner_size(LogicalSize::new(800.0, 900.0));

        if self.fullscreen {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        }

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        info!(
            "Window {}x{} at scale factor {:.2}",
            size.width,
            size.height,
            window.scale_factor()
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);
        self.renderer = Some(SkiaRenderer::new(size.width, size.height, self.font.take())?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        if self.session.is_scanning() {
            let ms = self.session.timer.now() / 1_000_000;
            self.view.pulse = (ms % PULSE_PERIOD_MS) as f32 / PULSE_PERIOD_MS as f32;
        }

        let screen = self.session.screen();
        let controls = self.session.controls();
        renderer.render(&screen, &controls, &self.view);
        renderer.present(pixels.frame_mut())?;
        pixels.render()?;
        Ok(())
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Applies an event and follows up on whatever it changed.
    fn dispatch(&mut self, event: SessionEvent, event_loop: &ActiveEventLoop) {
        let phase = self.session.phase;
        let responding = matches!(event, SessionEvent::Respond(_));
        if !self.session.handle_event(event) {
            return;
        }
        if responding && self.session.recorder().last_outcome() == SaveOutcome::Failed {
            error!("Responses could not be written to disk; they are kept in memory");
        }
        if self.session.phase != phase {
            self.view = ViewState::default();
        }
        self.export_presented();
        if self.session.phase == SessionPhase::End && phase == SessionPhase::End {
            // Close acknowledged on the end screen.
            self.cleanup_and_exit(event_loop);
        }
        self.request_redraw();
    }

    /// Fires a control only if the current screen has it enabled.
    fn fire(&mut self, control: Control, event_loop: &ActiveEventLoop) {
        let enabled = self
            .session
            .controls()
            .iter()
            .any(|c| c.control == control && c.enabled);
        if enabled {
            debug!("Control {:?}", control);
            self.dispatch(control.into(), event_loop);
        }
    }

    fn export_presented(&mut self) {
        let Some(exporter) = &self.exporter else {
            return;
        };
        let Some(trial) = self.session.current_trial() else {
            return;
        };
        let Some(images) = &trial.images else {
            return;
        };
        let key = (trial.trial_type, trial.number);
        if self.last_exported == Some(key) {
            return;
        }
        if let Err(e) = exporter.export(
            self.session.session_id().as_str(),
            trial.trial_type,
            trial.number,
            trial.trial.percentage,
            images,
        ) {
            warn!("Stimulus export failed: {e:#}");
        }
        self.last_exported = Some(key);
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        if let Key::Named(NamedKey::Escape) = event.logical_key {
            self.cleanup_and_exit(event_loop);
            return;
        }

        match self.session.phase {
            SessionPhase::Welcome => {
                if is_confirm(&event.logical_key) {
                    self.fire(Control::Start, event_loop);
                }
            }
            SessionPhase::Transition => {
                if is_confirm(&event.logical_key) {
                    self.fire(Control::BeginMain, event_loop);
                }
            }
            SessionPhase::End => {
                if is_confirm(&event.logical_key) {
                    self.fire(Control::Close, event_loop);
                }
            }
            SessionPhase::Practice | SessionPhase::Main => {
                let control = match event.logical_key.as_ref() {
                    Key::Character("z") | Key::Character("Z") => Control::ShowZoom,
                    Key::Character("f") | Key::Character("F") => Control::ShowFull,
                    Key::Character("k") | Key::Character("K") => Control::Keep,
                    Key::Character("d") | Key::Character("D") => Control::Discard,
                    _ => return,
                };
                self.fire(control, event_loop);
            }
            SessionPhase::PreTask | SessionPhase::PostTask => {
                self.handle_questionnaire_key(event, event_loop);
            }
        }
    }

    fn handle_questionnaire_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        let Some(questionnaire) = self.session.current_questionnaire() else {
            return;
        };
        let count = questionnaire.items.len();
        let Some(item) = questionnaire.items.get(self.view.focus) else {
            return;
        };
        let current = self.session.form().answer(&item.key);

        let value = match &event.logical_key {
            Key::Named(NamedKey::Enter) => {
                self.fire(Control::Submit, event_loop);
                return;
            }
            Key::Named(NamedKey::ArrowDown) | Key::Named(NamedKey::Tab) => {
                self.view.focus = (self.view.focus + 1) % count.max(1);
                self.request_redraw();
                return;
            }
            Key::Named(NamedKey::ArrowUp) => {
                self.view.focus = (self.view.focus + count.max(1) - 1) % count.max(1);
                self.request_redraw();
                return;
            }
            Key::Named(NamedKey::ArrowLeft) => item.kind.step(current, -1),
            Key::Named(NamedKey::ArrowRight) => item.kind.step(current, 1),
            Key::Named(NamedKey::Backspace) => current.map(|c| {
                let mut c = c.to_string();
                c.pop();
                c
            }),
            _ => event
                .text
                .as_ref()
                .filter(|t| !t.chars().any(char::is_control))
                .map(|t| format!("{}{}", current.unwrap_or_default(), t)),
        };

        if let Some(value) = value {
            let key = item.key.clone();
            self.dispatch(SessionEvent::Answer { key, value }, event_loop);
        }
    }

    fn handle_click(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(pixels), Some(renderer)) = (&self.pixels, &self.renderer) else {
            return;
        };
        let position = (self.cursor.x as f32, self.cursor.y as f32);
        let (x, y) = pixels
            .window_pos_to_pixel(position)
            .unwrap_or_else(|(x, y)| (x.max(0) as usize, y.max(0) as usize));

        match renderer.hit_test(x as f32, y as f32) {
            Some(Hit::Control(control)) => self.fire(control, event_loop),
            Some(Hit::Answer { item, key, value }) => {
                self.view.focus = item;
                self.dispatch(SessionEvent::Answer { key, value }, event_loop);
                self.request_redraw();
            }
            Some(Hit::Field(item)) => {
                self.view.focus = item;
                self.request_redraw();
            }
            None => {}
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("Failed to resize renderer: {e}");
            }
        }
        debug!("Display resized to {}x{}", new_size.width, new_size.height);
        self.request_redraw();
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.session.finish();
        info!(
            "Session {} closed, {} responses and {} questionnaire answers in {}",
            self.session.session_id(),
            self.session.records().len(),
            self.session.recorder().questionnaire_answers().len(),
            self.session.recorder().results_path().display()
        );
        self.should_exit = true;
        event_loop.exit();
    }

    fn schedule_wakeup(&self, event_loop: &ActiveEventLoop) {
        if !self.session.is_scanning() {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        let mut wake = Instant::now() + SCAN_FRAME;
        if let Some(deadline) = self.session.next_deadline() {
            wake = wake.min(self.session.timer.instant_at(deadline));
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}

fn is_confirm(key: &Key) -> bool {
    matches!(key, Key::Named(NamedKey::Space) | Key::Named(NamedKey::Enter))
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to create window and surface: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!("Render failed: {e:#}");
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(event_loop),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        for event in self.session.update() {
            self.dispatch(event, event_loop);
        }
        if self.session.is_scanning() {
            self.request_redraw();
        }
        self.schedule_wakeup(event_loop);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.session.finish();
        debug!("Application resources cleaned up");
    }
}
