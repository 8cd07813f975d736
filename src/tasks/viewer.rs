use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{Key, NamedKey},
    window::{CursorIcon, Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::{
    carousel::{
        Carousel,
        interaction::PointerSource,
        motion::PointerPosition,
        resize::{ResizeDebouncer, StartupCheck, StartupWait},
    },
    config::Configuration,
    events::{CarouselCommand, LoadImage, LoadKey, LoaderEvent, PreparedImageCpu},
    renderer::{CarouselRenderer, FrameStatus},
};

#[derive(Debug)]
pub enum ViewerEvent {
    Loader(LoaderEvent),
    Command(CarouselCommand),
    Cancelled,
}

type LoadSender = mpsc::UnboundedSender<LoadImage>;
type LoaderReceiver = mpsc::Receiver<LoaderEvent>;
type CommandReceiver = mpsc::Receiver<CarouselCommand>;

/// Completion tracking for the image requests of one layout generation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadProgress {
    generation: u64,
    expected: usize,
    loaded: usize,
    failed: usize,
    done: bool,
}

impl LoadProgress {
    fn new(generation: u64, expected: usize) -> Self {
        Self {
            generation,
            expected,
            loaded: 0,
            failed: 0,
            done: expected == 0,
        }
    }

    fn settled(&self) -> usize {
        self.loaded + self.failed
    }

    /// Count one finished request. Returns true only for the request that
    /// completes the generation.
    fn record(&mut self, success: bool) -> bool {
        if self.done {
            return false;
        }
        if success {
            self.loaded += 1;
        } else {
            self.failed += 1;
        }
        if self.settled() >= self.expected {
            self.done = true;
            return true;
        }
        false
    }
}

/// Decode result for one image, kept across layout generations so a rebuild
/// re-uploads pixels instead of decoding the file again.
#[derive(Debug, Clone)]
enum CachedImage {
    Ready(PreparedImageCpu),
    Failed,
}

#[derive(Debug, Default)]
struct ImageCache {
    slots: Vec<Option<CachedImage>>,
}

impl ImageCache {
    fn new(image_count: usize) -> Self {
        Self {
            slots: vec![None; image_count],
        }
    }

    fn get(&self, image_index: usize) -> Option<&CachedImage> {
        self.slots.get(image_index)?.as_ref()
    }

    fn store(&mut self, image_index: usize, entry: CachedImage) {
        if let Some(slot) = self.slots.get_mut(image_index) {
            *slot = Some(entry);
        }
    }
}

/// Title for the window: the loading suffix shows only until the first
/// generation has settled and never comes back after that.
fn window_title(base: &str, progress: &LoadProgress, indicator_cleared: bool) -> String {
    if indicator_cleared || progress.done {
        base.to_string()
    } else {
        format!("{base} (loading {}/{})", progress.settled(), progress.expected)
    }
}

struct ViewerApp {
    cfg: Configuration,
    images: Vec<PathBuf>,
    cancel: CancellationToken,
    load_tx: LoadSender,
    carousel: Carousel,
    window: Option<Arc<Window>>,
    renderer: Option<CarouselRenderer>,
    gpu_failed: bool,
    initialized: bool,
    startup: StartupWait,
    startup_abandoned: bool,
    resize: ResizeDebouncer,
    generation: u64,
    generation_cancel: Option<CancellationToken>,
    progress: Option<LoadProgress>,
    indicator_cleared: bool,
    cache: ImageCache,
    cursor: Option<PointerPosition>,
    torn_down: bool,
}

impl ViewerApp {
    fn new(cfg: Configuration, cancel: CancellationToken, load_tx: LoadSender) -> Self {
        let carousel = Carousel::new(&cfg);
        let cache = ImageCache::new(cfg.images.len());
        Self {
            images: cfg.images.clone(),
            resize: ResizeDebouncer::new(cfg.resize_debounce),
            cfg,
            cancel,
            load_tx,
            carousel,
            window: None,
            renderer: None,
            gpu_failed: false,
            initialized: false,
            startup: StartupWait::default(),
            startup_abandoned: false,
            generation: 0,
            generation_cancel: None,
            progress: None,
            indicator_cleared: false,
            cache,
            cursor: None,
            torn_down: false,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default()
            .with_title(format!("{} (loading)", self.cfg.window.title))
            .with_inner_size(LogicalSize::new(
                self.cfg.window.width,
                self.cfg.window.height,
            ));
        if self.cfg.window.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create carousel window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) {
        match CarouselRenderer::new(
            window.clone(),
            self.cfg.background_color,
            self.cfg.curve,
            self.cfg.border_radius,
        ) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(err) => {
                error!(error = ?err, "failed to initialize GPU state");
                self.gpu_failed = true;
                window.set_title("Failed to initialize GPU");
            }
        }
    }

    /// Build the first layout once the window reports a usable height.
    fn try_initialize(&mut self) {
        if self.initialized || self.renderer.is_none() {
            return;
        }
        let Some(size) = self.window.as_ref().map(|w| w.inner_size()) else {
            return;
        };
        match self.startup.check(size.height) {
            StartupCheck::Ready => {
                self.initialized = true;
                info!(
                    width = size.width,
                    height = size.height,
                    images = self.images.len(),
                    "carousel initialized"
                );
                self.rebuild_layout(size);
            }
            StartupCheck::Retry => {
                debug!(attempt = self.startup.attempts(), "window has no height yet");
                self.request_redraw();
            }
            StartupCheck::GaveUp => {
                if !self.startup_abandoned {
                    self.startup_abandoned = true;
                    warn!(
                        attempts = self.startup.attempts(),
                        "window never reported a height; carousel not initialized"
                    );
                }
            }
        }
    }

    fn cancel_generation(&mut self) {
        if let Some(token) = self.generation_cancel.take() {
            token.cancel();
        }
    }

    fn rebuild_layout(&mut self, size: PhysicalSize<u32>) {
        if self.renderer.is_none() {
            return;
        }

        self.cancel_generation();
        self.generation += 1;
        let generation = self.generation;
        let token = self.cancel.child_token();
        self.generation_cancel = Some(token.clone());

        self.carousel.relayout(size.width, size.height);
        let frame = self.carousel.frame_geometry();
        let view_proj = self.carousel.view_projection();
        let (Some(renderer), Some(layout)) = (self.renderer.as_mut(), self.carousel.layout()) else {
            return;
        };
        renderer.rebuild(layout, self.images.len(), frame.visible_width, view_proj);

        let max_dimension = self
            .cfg
            .max_texture_dimension
            .min(renderer.max_texture_dimension());
        let mut progress = LoadProgress::new(generation, self.images.len());
        let mut requested = 0;
        let mut loader_gone = false;
        for (image_index, path) in self.images.iter().enumerate() {
            match self.cache.get(image_index) {
                Some(CachedImage::Ready(image)) => {
                    renderer.attach_image(image_index, image);
                    progress.record(true);
                }
                Some(CachedImage::Failed) => {
                    progress.record(false);
                }
                None if loader_gone => {}
                None => {
                    let request = LoadImage {
                        key: LoadKey {
                            generation,
                            image_index,
                        },
                        path: path.clone(),
                        max_dimension,
                        cancel: token.clone(),
                    };
                    if self.load_tx.send(request).is_err() {
                        warn!("loader channel closed; images will not load");
                        loader_gone = true;
                    } else {
                        requested += 1;
                    }
                }
            }
        }
        debug!(
            generation,
            requested,
            reused = progress.settled(),
            "image loads scheduled"
        );
        if progress.done {
            self.indicator_cleared = true;
        }
        self.progress = Some(progress);
        self.update_title();
    }

    fn handle_loader_event(&mut self, event: LoaderEvent) {
        let key = event.key();
        if key.generation != self.generation || self.torn_down {
            debug!(?key, current = self.generation, "ignoring stale image load");
            return;
        }

        let success = match event {
            LoaderEvent::Ready { key, image } => {
                let tiles = self
                    .renderer
                    .as_mut()
                    .map_or(0, |r| r.attach_image(key.image_index, &image));
                debug!(
                    path = %image.path.display(),
                    width = image.width,
                    height = image.height,
                    tiles,
                    "image attached"
                );
                self.cache.store(key.image_index, CachedImage::Ready(image));
                true
            }
            LoaderEvent::Failed { key, path } => {
                warn!(path = %path.display(), "image unavailable; its tiles stay hidden");
                self.cache.store(key.image_index, CachedImage::Failed);
                false
            }
        };

        let finished = self
            .progress
            .as_mut()
            .filter(|p| p.generation == key.generation)
            .is_some_and(|p| p.record(success));
        if finished {
            self.indicator_cleared = true;
            if let Some(progress) = self.progress.as_ref() {
                info!(
                    generation = progress.generation,
                    loaded = progress.loaded,
                    failed = progress.failed,
                    textured = self.renderer.as_ref().map_or(0, |r| r.textured_images()),
                    "all images settled"
                );
            }
        }
        self.update_title();
    }

    fn update_title(&self) {
        let (Some(window), Some(progress)) = (self.window.as_ref(), self.progress.as_ref()) else {
            return;
        };
        window.set_title(&window_title(
            &self.cfg.window.title,
            progress,
            self.indicator_cleared,
        ));
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize_surface(new_size);
        }
        if self.initialized {
            self.resize.note(new_size, Instant::now());
        }
        self.request_redraw();
    }

    fn apply_settled_resize(&mut self) {
        let Some(size) = self.resize.due(Instant::now()) else {
            return;
        };
        if size.height == 0 || size.width == 0 {
            debug!(width = size.width, height = size.height, "skipping rebuild for empty viewport");
            return;
        }
        self.rebuild_layout(size);
    }

    fn pointer_position(&self, position: PhysicalPosition<f64>) -> PointerPosition {
        let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
        let logical = position.to_logical::<f64>(scale);
        PointerPosition::new(logical.x, logical.y)
    }

    fn container_height(&self) -> f64 {
        self.window.as_ref().map_or(0.0, |w| {
            w.inner_size().to_logical::<f64>(w.scale_factor()).height
        })
    }

    fn set_cursor(&self, icon: CursorIcon) {
        if let Some(window) = self.window.as_ref() {
            window.set_cursor(icon);
        }
    }

    fn press(&mut self, source: PointerSource, at: PointerPosition) {
        if !self.initialized {
            return;
        }
        let height = self.container_height();
        if self
            .carousel
            .pointer_pressed(source, at, height, Instant::now())
        {
            self.set_cursor(CursorIcon::Grabbing);
        }
    }

    fn release(&mut self, source: PointerSource) {
        if self.carousel.pointer_released(source).is_some() {
            self.set_cursor(CursorIcon::Default);
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        let source = PointerSource::Touch(touch.id);
        let at = self.pointer_position(touch.location);
        match touch.phase {
            TouchPhase::Started => self.press(source, at),
            TouchPhase::Moved => {
                self.carousel.pointer_moved(source, at, Instant::now());
            }
            TouchPhase::Ended | TouchPhase::Cancelled => self.release(source),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Space) => self.apply_command(event_loop, CarouselCommand::TogglePause),
            Key::Named(NamedKey::Escape) => self.apply_command(event_loop, CarouselCommand::Teardown),
            Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                self.apply_command(event_loop, CarouselCommand::Reverse)
            }
            _ => {}
        }
    }

    fn apply_command(&mut self, event_loop: &ActiveEventLoop, command: CarouselCommand) {
        match command {
            CarouselCommand::Pause => {
                self.carousel.pause();
                info!("carousel paused");
            }
            CarouselCommand::Resume => {
                self.carousel.resume();
                info!("carousel resumed");
            }
            CarouselCommand::TogglePause => {
                let paused = self.carousel.toggle_pause();
                info!(paused, "carousel pause toggled");
            }
            CarouselCommand::Reverse => {
                let reversed = self.carousel.reverse();
                info!(reversed, "carousel direction toggled");
            }
            CarouselCommand::Teardown => {
                self.teardown();
                event_loop.exit();
            }
        }
    }

    /// Release every GPU tile resource and cancel pending loads. Safe to call
    /// more than once.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel_generation();
        self.carousel.cancel_drag();
        self.carousel.clear_layout();
        self.progress = None;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release_tiles();
        }
        info!(generation = self.generation, "carousel torn down");
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        if self.torn_down {
            return;
        }
        if !self.initialized {
            self.try_initialize();
            if !self.initialized {
                return;
            }
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        self.carousel.advance();
        match renderer.render(self.carousel.scene_offset()) {
            FrameStatus::Presented | FrameStatus::Reconfigured | FrameStatus::Skipped => {}
            FrameStatus::Fatal => {
                error!("carousel surface unusable; exiting event loop");
                self.teardown();
                event_loop.exit();
                return;
            }
        }
        self.request_redraw();
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.renderer.is_none() && !self.gpu_failed && !self.torn_down {
            self.init_gpu(window);
        }

        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("carousel window close requested");
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::Focused(false) => {
                if self.carousel.cancel_drag().is_some() {
                    debug!("focus lost; drag released");
                    self.set_cursor(CursorIcon::Default);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let at = self.pointer_position(position);
                self.cursor = Some(at);
                self.carousel
                    .pointer_moved(PointerSource::Mouse, at, Instant::now());
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if let Some(at) = self.cursor {
                        self.press(PointerSource::Mouse, at);
                    }
                }
                ElementState::Released => self.release(PointerSource::Mouse),
            },
            WindowEvent::Touch(touch) => self.handle_touch(touch),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.apply_settled_resize();
        match self.resize.deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Loader(event) => self.handle_loader_event(event),
            ViewerEvent::Command(command) => self.apply_command(event_loop, command),
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                self.teardown();
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

/// Forward everything from `rx` into the event loop until either side closes.
fn forward_to_event_loop<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    proxy: EventLoopProxy<ViewerEvent>,
    wrap: fn(T) -> ViewerEvent,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = rx.recv() => {
                    let Some(item) = item else { break };
                    if proxy.send_event(wrap(item)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Run the carousel window on the current thread until it closes or `cancel`
/// fires. `cfg.images` must already be resolved to files.
pub fn run_windowed(
    cfg: Configuration,
    load_tx: LoadSender,
    from_loader: LoaderReceiver,
    control: CommandReceiver,
    cancel: CancellationToken,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let bridges = [
        forward_to_event_loop(from_loader, proxy.clone(), ViewerEvent::Loader, cancel.clone()),
        forward_to_event_loop(control, proxy.clone(), ViewerEvent::Command, cancel.clone()),
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                let _ = proxy.send_event(ViewerEvent::Cancelled);
            })
        },
    ];

    let mut app = ViewerApp::new(cfg, cancel, load_tx);
    let run_result = event_loop.run_app(&mut app);
    for bridge in bridges {
        bridge.abort();
    }

    run_result.context("viewer event loop failed")
}
