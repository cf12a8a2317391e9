//! Frame composition for the head display.
//!
//! Windows are painted eldest ancestor first; only the leaf shows live
//! selection. Camera previews are layered onto the cached last frame and
//! published on their own, outside the redraw throttle.

mod assets;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::menu::{Button, MenuGraph, Window};

pub use assets::{AssetStore, ButtonVisual};

pub const FRAME_WIDTH: u32 = 1024;
pub const FRAME_HEIGHT: u32 = 600;

pub type Frame = RgbaImage;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER: Rgba<u8> = Rgba([90, 90, 90, 255]);
const INNER_INSET: u32 = 2;

/// Screen-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Consumer of finished frames (display publisher)
pub trait FrameSink: Send + Sync {
    fn publish(&self, frame: &Frame) -> anyhow::Result<()>;
}

/// Single-slot hand-off of the last rendered frame
#[derive(Clone)]
pub struct SharedFrame(Arc<RwLock<Arc<Frame>>>);

impl SharedFrame {
    pub fn new(frame: Frame) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(frame))))
    }

    pub fn store(&self, frame: Arc<Frame>) {
        *self.0.write() = frame;
    }

    pub fn load(&self) -> Arc<Frame> {
        self.0.read().clone()
    }
}

/// Minimum spacing between full redraws
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_publish: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_publish: None,
        }
    }

    /// How long a redraw requested at `now` must wait
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_publish {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_publish = Some(now);
    }
}

/// Composite `live` (scaled to `rect`) over a copy of `base`
pub fn overlay(base: &Frame, live: &Frame, rect: Rect) -> Frame {
    let mut out = base.clone();
    if live.dimensions() == (rect.width, rect.height) {
        imageops::replace(&mut out, live, rect.x as i64, rect.y as i64);
    } else {
        let scaled = imageops::resize(live, rect.width, rect.height, FilterType::Triangle);
        imageops::replace(&mut out, &scaled, rect.x as i64, rect.y as i64);
    }
    out
}

/// Camera preview path; runs on the feed's thread
#[derive(Clone)]
pub struct LiveOverlay {
    last_frame: SharedFrame,
    sink: Arc<dyn FrameSink>,
    rect: Rect,
}

impl LiveOverlay {
    pub fn present(&self, live: Frame) {
        let base = self.last_frame.load();
        let frame = overlay(&base, &live, self.rect);
        if let Err(e) = self.sink.publish(&frame) {
            error!("Failed to publish camera frame: {}", e);
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
}

/// Renders window chains and publishes them, rate limited
pub struct Compositor {
    assets: AssetStore,
    throttle: Throttle,
    last_frame: SharedFrame,
    sink: Arc<dyn FrameSink>,
    published: u64,
}

impl Compositor {
    pub fn new(assets: AssetStore, sink: Arc<dyn FrameSink>, min_interval: Duration) -> Self {
        Self {
            assets,
            throttle: Throttle::new(min_interval),
            last_frame: SharedFrame::new(blank_frame()),
            sink,
            published: 0,
        }
    }

    /// Paint `chain` (root first). `cursor` is the leaf's selected index.
    pub fn render(&mut self, graph: &MenuGraph, chain: &[&Window], cursor: usize) -> Frame {
        let mut frame = blank_frame();
        let leaf = chain.len().saturating_sub(1);

        for (depth, window) in chain.iter().enumerate() {
            for (index, name) in window.buttons.iter().enumerate() {
                let Some(button) = graph.button(name) else {
                    continue;
                };
                let visual = if depth < leaf {
                    ButtonVisual::Inactive
                } else if index == cursor {
                    ButtonVisual::Selected
                } else {
                    ButtonVisual::Normal
                };
                self.draw_button(&mut frame, button, visual);
            }
        }

        frame
    }

    fn draw_button(&mut self, frame: &mut Frame, button: &Button, visual: ButtonVisual) {
        let (x, y) = button.offset;
        let (width, height) = button.size;

        if let Some(art) = self.assets.get(&button.image_prefix, visual) {
            imageops::overlay(frame, art, x as i64, y as i64);
            return;
        }

        if button.inner {
            fill_rect(frame, Rect::new(x, y, width, height), BORDER);
            let inset = Rect::new(
                x + INNER_INSET as i32,
                y + INNER_INSET as i32,
                width.saturating_sub(INNER_INSET * 2),
                height.saturating_sub(INNER_INSET * 2),
            );
            fill_rect(frame, inset, visual.fill());
        } else {
            fill_rect(frame, Rect::new(x, y, width, height), visual.fill());
        }
    }

    /// Render, cache and publish, waiting out the throttle first
    pub fn redraw(&mut self, graph: &MenuGraph, chain: &[&Window], cursor: usize) {
        let wait = self.throttle.remaining(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        let frame = Arc::new(self.render(graph, chain, cursor));
        self.last_frame.store(frame.clone());
        if let Err(e) = self.sink.publish(&frame) {
            error!("Failed to publish frame: {}", e);
        }
        self.throttle.mark(Instant::now());
        self.published += 1;

        if let Some(leaf) = chain.last() {
            debug!("Drew window {}", leaf.name);
        }
    }

    pub fn live_overlay(&self, rect: Rect) -> LiveOverlay {
        LiveOverlay {
            last_frame: self.last_frame.clone(),
            sink: self.sink.clone(),
            rect,
        }
    }

    pub fn last_frame(&self) -> Arc<Frame> {
        self.last_frame.load()
    }

    /// Full redraws published so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

fn blank_frame() -> Frame {
    ImageBuffer::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, BACKGROUND)
}

fn fill_rect(frame: &mut Frame, rect: Rect, color: Rgba<u8>) {
    let (frame_w, frame_h) = frame.dimensions();
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    let x1 = (rect.x as i64 + rect.width as i64).clamp(0, frame_w as i64) as u32;
    let y1 = (rect.y as i64 + rect.height as i64).clamp(0, frame_h as i64) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MenuConfig;
    use crate::testing::RecordingSink;

    const MENU: &str = r#"{
        "Windows": [
            {"name": "root"},
            {"name": "child", "parent": "root"}
        ],
        "Buttons": [
            {"name": "a", "size": [10, 10], "offset": [0, 0], "index": 0,
             "window": "root", "nextWindow": "child", "selectable": true},
            {"name": "b", "size": [10, 10], "offset": [20, 0], "index": 0,
             "window": "child", "nextWindow": "child", "selectable": true},
            {"name": "c", "size": [10, 10], "offset": [40, 0], "index": 1, "inner": true,
             "window": "child", "nextWindow": "child", "selectable": true}
        ]
    }"#;

    fn setup() -> (MenuGraph, Compositor, Arc<RecordingSink>) {
        let graph = MenuGraph::build(&MenuConfig::from_json(MENU).unwrap()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let compositor = Compositor::new(AssetStore::new(None), sink.clone(), Duration::ZERO);
        (graph, compositor, sink)
    }

    #[test]
    fn test_ancestors_drawn_inactive_leaf_live() {
        let (graph, mut compositor, _sink) = setup();
        let chain = [graph.window("root").unwrap(), graph.window("child").unwrap()];
        let frame = compositor.render(&graph, &chain, 1);

        assert_eq!(frame.dimensions(), (FRAME_WIDTH, FRAME_HEIGHT));
        assert_eq!(*frame.get_pixel(5, 5), ButtonVisual::Inactive.fill());
        assert_eq!(*frame.get_pixel(25, 5), ButtonVisual::Normal.fill());
        assert_eq!(*frame.get_pixel(45, 5), ButtonVisual::Selected.fill());
        assert_eq!(*frame.get_pixel(40, 0), BORDER);
        assert_eq!(*frame.get_pixel(500, 500), BACKGROUND);
    }

    #[test]
    fn test_redraw_publishes_and_caches() {
        let (graph, mut compositor, sink) = setup();
        let chain = [graph.window("root").unwrap()];
        compositor.redraw(&graph, &chain, 0);

        assert_eq!(compositor.published(), 1);
        assert_eq!(sink.count(), 1);
        assert_eq!(*compositor.last_frame().get_pixel(5, 5), ButtonVisual::Selected.fill());
    }

    #[test]
    fn test_overlay_layers_onto_last_frame() {
        let (graph, mut compositor, sink) = setup();
        let chain = [graph.window("root").unwrap()];
        compositor.redraw(&graph, &chain, 0);

        let rect = Rect::new(100, 100, 8, 8);
        let live = ImageBuffer::from_pixel(8, 8, Rgba([0, 0, 255, 255]));
        compositor.live_overlay(rect).present(live);

        assert_eq!(sink.count(), 2);
        let shown = sink.last().unwrap();
        assert_eq!(*shown.get_pixel(104, 104), Rgba([0, 0, 255, 255]));
        assert_eq!(*shown.get_pixel(5, 5), ButtonVisual::Selected.fill());
        // The cached menu frame is untouched and no redraw was counted
        assert_eq!(*compositor.last_frame().get_pixel(104, 104), BACKGROUND);
        assert_eq!(compositor.published(), 1);
    }

    #[test]
    fn test_back_to_back_redraw_waits_but_overlay_does_not() {
        let graph = MenuGraph::build(&MenuConfig::from_json(MENU).unwrap()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let interval = Duration::from_millis(200);
        let mut compositor = Compositor::new(AssetStore::new(None), sink.clone(), interval);
        let chain = [graph.window("root").unwrap()];

        compositor.redraw(&graph, &chain, 0);
        let started = Instant::now();
        compositor.redraw(&graph, &chain, 0);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(compositor.published(), 2);

        // Straight after a redraw, where another redraw would have to wait
        let started = Instant::now();
        let live = ImageBuffer::from_pixel(8, 8, Rgba([0, 0, 255, 255]));
        compositor.live_overlay(Rect::new(0, 0, 8, 8)).present(live);
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(sink.count(), 3);
        assert_eq!(compositor.published(), 2);
    }

    #[test]
    fn test_throttle_remaining() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(throttle.remaining(start), Duration::ZERO);

        throttle.mark(start);
        assert_eq!(
            throttle.remaining(start + Duration::from_millis(40)),
            Duration::from_millis(60)
        );
        assert_eq!(throttle.remaining(start + Duration::from_millis(150)), Duration::ZERO);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut frame = blank_frame();
        fill_rect(&mut frame, Rect::new(-5, FRAME_HEIGHT as i32 - 2, 10, 10), BORDER);
        assert_eq!(*frame.get_pixel(0, FRAME_HEIGHT - 1), BORDER);
        assert_eq!(*frame.get_pixel(5, FRAME_HEIGHT - 1), BACKGROUND);
    }
}
