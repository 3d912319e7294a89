// main.rs — 命令行解析、无界面基准测试，以及带菜单和状态栏的交互窗口

mod renderer;

use equirect_viewer::config::{self, Command, ViewerConfig};
use equirect_viewer::error::{Result, ViewerError};
use equirect_viewer::i18n::{self, tr, tr_with};
use equirect_viewer::loader::{spawn_load, LoadOutcome};
use equirect_viewer::timing::{self, TimingKind, TimingStats};
use equirect_viewer::{benchmark, Algorithm, InputEvent, ViewKey, ViewportController};
use renderer::Renderer;

use winit::{
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());
    let cfg = match config::parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(cfg)) => cfg,
        Ok(Command::Help) => {
            println!("{}", config::usage(&program));
            return;
        }
        Err(e) => {
            eprintln!("{e}\n\n{}", config::usage(&program));
            std::process::exit(2);
        }
    };

    i18n::init(i18n::resolve_lang(cfg.lang.as_deref()));

    let result = if cfg.is_headless() {
        benchmark::run_headless(&cfg).map(|_| ())
    } else {
        run_window(cfg)
    };
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

/// Everything the window loop mutates besides the GPU side.
struct App {
    cfg: ViewerConfig,
    controller: Option<ViewportController>,
    algorithm: Algorithm,
    cursor: PhysicalPosition<f64>,
    modifiers: ModifiersState,
    frame_dirty: bool,

    // UI 状态
    is_loading: bool,
    status_error: Option<String>,
    show_fps: bool,
    is_fullscreen: bool,
    current_lang: String,
    quit_requested: bool,

    // FPS 统计
    stats: TimingStats,
    fps: f64,
    last_frame: Instant,
    lap_start: Instant,

    tx: Sender<LoadOutcome>,
}

impl App {
    fn new(cfg: ViewerConfig, tx: Sender<LoadOutcome>) -> Self {
        let now = Instant::now();
        Self {
            algorithm: cfg.algorithm.primary(),
            cfg,
            controller: None,
            cursor: PhysicalPosition::new(0.0, 0.0),
            modifiers: ModifiersState::empty(),
            frame_dirty: false,
            is_loading: false,
            status_error: None,
            show_fps: false,
            is_fullscreen: false,
            current_lang: i18n::current_lang(),
            quit_requested: false,
            stats: TimingStats::new(),
            fps: 0.0,
            last_frame: now,
            lap_start: now,
            tx,
        }
    }

    fn start_load(&mut self, path: PathBuf) {
        self.is_loading = true;
        self.status_error = None;
        spawn_load(path, self.tx.clone());
    }

    fn on_loaded(&mut self, outcome: LoadOutcome, size: PhysicalSize<u32>) {
        self.is_loading = false;
        let source = match outcome.result {
            Ok(image) => Arc::new(image),
            Err(e) => {
                self.status_error = Some(tr_with("status.load_failed", &[("err", e.to_string())]));
                return;
            }
        };

        match self.controller.as_mut() {
            Some(c) => c.set_source(source),
            None => {
                match ViewportController::new(
                    source,
                    self.cfg.view,
                    size.width.max(1),
                    size.height.max(1),
                    self.algorithm,
                ) {
                    Ok(c) => self.controller = Some(c),
                    Err(e) => {
                        self.status_error = Some(e.to_string());
                        return;
                    }
                }
            }
        }
        log::info!("showing {}", outcome.path.display());
        self.frame_dirty = true;
    }

    fn dispatch(&mut self, event: InputEvent) {
        let Some(c) = self.controller.as_mut() else {
            return;
        };
        match c.handle(event) {
            Ok(response) => self.frame_dirty |= response.redrawn,
            Err(e) => log::warn!("{e}"),
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return; // minimised
        }
        if let Some(c) = self.controller.as_mut() {
            match c.resize(size.width, size.height) {
                Ok(()) => self.frame_dirty = true,
                Err(e) => log::warn!("{e}"),
            }
        }
    }

    fn toggle_fullscreen(&mut self, window: &Window) {
        self.is_fullscreen = !self.is_fullscreen;
        if self.is_fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        } else {
            window.set_fullscreen(None);
        }
    }

    fn log_stats(&self) {
        self.stats.log_report(false);
        if let Some(c) = self.controller.as_ref() {
            c.render_stats().log_report(false);
        }
    }

    fn tick_frame(&mut self) {
        let now = Instant::now();
        self.stats.add(TimingKind::Frame, now - self.last_frame);
        self.last_frame = now;
        if now - self.lap_start >= Duration::from_secs(1) {
            if let Some(avg) = self.stats.lap_average(TimingKind::Frame) {
                self.fps = timing::fps(avg);
            }
            self.stats.reset_lap();
            self.lap_start = now;
        }
    }
}

fn run_window(cfg: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .map_err(|e| ViewerError::Gpu(e.to_string()))?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()))?;

    // 异步加载通道
    let (tx, rx): (Sender<LoadOutcome>, Receiver<LoadOutcome>) = channel();
    let mut app = App::new(cfg, tx);
    if let Some(path) = app.cfg.image.clone() {
        app.start_load(path);
    }

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Ok(outcome) = rx.try_recv() {
            app.on_loaded(outcome, renderer.size);
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);

                // a drag may end over the menu or status bar, which egui claims
                if ends_drag(&event) {
                    app.dispatch(InputEvent::PointerUp);
                }
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        app.quit_requested = true;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        app.resize(new_size);
                    }

                    WindowEvent::ModifiersChanged(state) => app.modifiers = state,

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::Escape | VirtualKeyCode::Q) => {
                                    app.quit_requested = true;
                                }
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_image() {
                                        app.start_load(path);
                                    }
                                }
                                Some(VirtualKeyCode::F11) => app.toggle_fullscreen(&window),
                                Some(code) => {
                                    let key = view_key(code, app.modifiers.shift());
                                    app.dispatch(InputEvent::KeyDown(key));
                                }
                                None => {}
                            }
                        }
                    }

                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => app.dispatch(InputEvent::PointerDown {
                        x: app.cursor.x,
                        y: app.cursor.y,
                    }),

                    WindowEvent::CursorMoved { position, .. } => {
                        app.cursor = position;
                        app.dispatch(InputEvent::PointerMove {
                            x: position.x,
                            y: position.y,
                        });
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let delta = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y as f64,
                            MouseScrollDelta::PixelDelta(pos) => pos.y,
                        };
                        app.dispatch(InputEvent::Wheel { delta });
                    }

                    WindowEvent::DroppedFile(path) => app.start_load(path),

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                app.tick_frame();

                if app.frame_dirty {
                    if let Some(c) = app.controller.as_ref() {
                        renderer.upload_frame(c.output());
                    }
                    app.frame_dirty = false;
                }

                let mut next_image = None;
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    draw_ui(ctx, &mut app, &mut next_image, &window);
                });

                if let Some(path) = next_image {
                    app.start_load(path);
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => app.quit_requested = true,
                    Err(e) => log::warn!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                // 自动旋转
                if !app.cfg.delta.is_zero() {
                    if let Some(c) = app.controller.as_mut() {
                        match c.advance(app.cfg.delta) {
                            Ok(()) => app.frame_dirty = true,
                            Err(e) => log::warn!("{e}"),
                        }
                    }
                }
                window.request_redraw();
            }

            _ => {}
        }

        if app.quit_requested {
            app.log_stats();
            *control_flow = ControlFlow::Exit;
        }
    })
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(tr("file.filter.images"), &IMAGE_EXTENSIONS)
        .pick_file()
}

fn ends_drag(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::MouseInput {
            state: ElementState::Released,
            button: MouseButton::Left,
            ..
        }
    )
}

fn view_key(code: VirtualKeyCode, shift: bool) -> ViewKey {
    use VirtualKeyCode as K;
    let digit = match code {
        K::Key0 | K::Numpad0 => Some(0),
        K::Key1 | K::Numpad1 => Some(1),
        K::Key2 | K::Numpad2 => Some(2),
        K::Key3 | K::Numpad3 => Some(3),
        K::Key4 | K::Numpad4 => Some(4),
        K::Key5 | K::Numpad5 => Some(5),
        K::Key6 | K::Numpad6 => Some(6),
        K::Key7 | K::Numpad7 => Some(7),
        K::Key8 | K::Numpad8 => Some(8),
        K::Key9 | K::Numpad9 => Some(9),
        _ => None,
    };
    match digit {
        // shift+8 is `*` on most layouts
        Some(_) if code == K::Key8 && shift => {}
        Some(d) => return ViewKey::Digit(d),
        None => {}
    }

    match code {
        VirtualKeyCode::PageUp => ViewKey::PageUp,
        VirtualKeyCode::PageDown => ViewKey::PageDown,
        VirtualKeyCode::End => ViewKey::End,
        VirtualKeyCode::Home => ViewKey::Home,
        VirtualKeyCode::Left => ViewKey::ArrowLeft,
        VirtualKeyCode::Right => ViewKey::ArrowRight,
        VirtualKeyCode::Up => ViewKey::ArrowUp,
        VirtualKeyCode::Down => ViewKey::ArrowDown,
        VirtualKeyCode::NumpadMultiply | VirtualKeyCode::Asterisk | VirtualKeyCode::Key8 => {
            ViewKey::Multiply
        }
        VirtualKeyCode::NumpadDivide | VirtualKeyCode::Slash => ViewKey::Divide,
        _ => ViewKey::Other,
    }
}

fn draw_ui(ctx: &egui::Context, app: &mut App, next_image: &mut Option<PathBuf>, window: &Window) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // File
            ui.menu_button(tr("menu.file"), |ui| {
                if ui.button(tr("menu.open_image")).clicked() {
                    ui.close_menu();
                    *next_image = pick_image();
                }
                if ui.button(tr("menu.exit")).clicked() {
                    app.quit_requested = true;
                }
            });

            // View
            ui.menu_button(tr("menu.view"), |ui| {
                if ui.button(tr("view.reset")).clicked() {
                    if let Some(c) = app.controller.as_mut() {
                        c.reset_view();
                        app.frame_dirty = true;
                    }
                    ui.close_menu();
                }

                let fullscreen_label = if app.is_fullscreen {
                    tr("view.fullscreen.exit")
                } else {
                    tr("view.fullscreen.enter")
                };
                if ui.button(fullscreen_label).clicked() {
                    app.toggle_fullscreen(window);
                    ui.close_menu();
                }

                ui.separator();
                ui.menu_button(tr("view.algorithm"), |ui| {
                    let mut selected = app.algorithm;
                    for (algorithm, key) in [
                        (Algorithm::Serial, "algorithm.serial"),
                        (Algorithm::Parallel, "algorithm.parallel"),
                    ] {
                        if ui.radio_value(&mut selected, algorithm, tr(key)).clicked() {
                            ui.close_menu();
                        }
                    }
                    if selected != app.algorithm {
                        app.algorithm = selected;
                        if let Some(c) = app.controller.as_mut() {
                            c.set_algorithm(selected);
                            app.frame_dirty = true;
                        }
                    }
                });

                ui.separator();
                if ui.checkbox(&mut app.show_fps, tr("view.show_fps")).clicked() {
                    ui.close_menu();
                }
            });

            // Language
            ui.menu_button(tr("menu.language"), |ui| {
                for (code, name) in i18n::LANGUAGES {
                    if ui
                        .radio_value(&mut app.current_lang, code.to_owned(), name)
                        .clicked()
                    {
                        i18n::init(app.current_lang.clone());
                        window.set_title(&tr("app.title"));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if app.is_loading {
                ui.label(egui::RichText::new(tr("status.loading_image")).color(egui::Color32::YELLOW));
                ui.label("|");
            }
            if let Some(err) = &app.status_error {
                ui.label(egui::RichText::new(err).color(egui::Color32::LIGHT_RED));
                ui.label("|");
            }

            match app.controller.as_ref() {
                Some(c) => {
                    let p = c.params();
                    for (key, value) in [
                        ("status.yaw", p.yaw),
                        ("status.pitch", p.pitch),
                        ("status.roll", p.roll),
                        ("status.fov", p.fov),
                        ("status.step", c.step()),
                    ] {
                        ui.label(format!("{}: {value:.1}°", tr(key)));
                        ui.label("|");
                    }
                    let ms = c.last_render_time().as_secs_f64() * 1e3;
                    ui.label(tr_with("status.render_time", &[("ms", format!("{ms:.2}"))]));
                }
                None if !app.is_loading => {
                    ui.label(tr("status.no_image"));
                }
                None => {}
            }

            if app.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", app.fps)).color(egui::Color32::GREEN),
                );
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(deprecated)]
    fn left_button(state: ElementState) -> WindowEvent<'static> {
        WindowEvent::MouseInput {
            // SAFETY: only compared, never handed back to winit
            device_id: unsafe { DeviceId::dummy() },
            state,
            button: MouseButton::Left,
            modifiers: ModifiersState::empty(),
        }
    }

    #[test]
    fn left_release_always_ends_the_drag() {
        assert!(ends_drag(&left_button(ElementState::Released)));
        assert!(!ends_drag(&left_button(ElementState::Pressed)));
        assert!(!ends_drag(&WindowEvent::Focused(false)));
    }

    #[test]
    fn digits_become_step_entry() {
        assert_eq!(view_key(VirtualKeyCode::Key3, false), ViewKey::Digit(3));
        assert_eq!(view_key(VirtualKeyCode::Numpad0, false), ViewKey::Digit(0));
        assert_eq!(view_key(VirtualKeyCode::Key8, false), ViewKey::Digit(8));
        assert_eq!(view_key(VirtualKeyCode::Numpad8, true), ViewKey::Digit(8));
    }

    #[test]
    fn star_and_slash_zoom() {
        assert_eq!(view_key(VirtualKeyCode::Key8, true), ViewKey::Multiply);
        assert_eq!(view_key(VirtualKeyCode::NumpadMultiply, false), ViewKey::Multiply);
        assert_eq!(view_key(VirtualKeyCode::Slash, false), ViewKey::Divide);
        assert_eq!(view_key(VirtualKeyCode::A, false), ViewKey::Other);
    }
}
