//! GPU side of the carousel: surface management, the tile pipeline and the
//! per-layout tile resources.

pub mod tiles;

use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Mat4;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::carousel::layout::TileLayout;
use crate::events::PreparedImageCpu;

use tiles::{GlobalsUniform, TilePipeline, TileSet};

/// Result of one attempt to draw a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    Reconfigured,
    Skipped,
    Fatal,
}

pub struct GpuContext {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    window: Arc<Window>,
}

impl GpuContext {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("carousel-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "carousel surface configured",
        );

        Ok(Self {
            surface,
            config,
            device,
            queue,
            window,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        debug!(
            width = self.config.width,
            height = self.config.height,
            "carousel surface resized",
        );
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

/// Draws the current tile set with the shared pipeline.
pub struct CarouselRenderer {
    gpu: GpuContext,
    pipeline: TilePipeline,
    tiles: Option<TileSet>,
    view_proj: Mat4,
    clear: wgpu::Color,
    curve: f32,
    border_radius: f32,
}

impl CarouselRenderer {
    pub fn new(
        window: Arc<Window>,
        background: [u8; 3],
        curve: f32,
        border_radius: f32,
    ) -> Result<Self> {
        let gpu = GpuContext::new(window)?;
        let pipeline = TilePipeline::new(gpu.device(), gpu.format());
        Ok(Self {
            gpu,
            pipeline,
            tiles: None,
            view_proj: Mat4::IDENTITY,
            clear: clear_color(background),
            curve,
            border_radius,
        })
    }

    pub fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    /// Largest texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.gpu.device().limits().max_texture_dimension_2d
    }

    /// Replace the tile set with fresh, untextured tiles for `layout`.
    pub fn rebuild(
        &mut self,
        layout: &TileLayout,
        image_count: usize,
        visible_width: f64,
        view_proj: Mat4,
    ) {
        self.release_tiles();
        self.view_proj = view_proj;
        let tiles = TileSet::new(
            self.gpu.device(),
            &self.pipeline,
            layout,
            image_count,
            self.curve,
            self.border_radius,
            visible_width as f32,
        );
        debug!(tiles = tiles.tile_count(), image_count, "tile set rebuilt");
        self.tiles = Some(tiles);
    }

    /// Returns how many tiles picked up the image.
    pub fn attach_image(&mut self, image_index: usize, image: &PreparedImageCpu) -> usize {
        let Some(tiles) = self.tiles.as_mut() else {
            return 0;
        };
        tiles.attach_image(
            self.gpu.device(),
            self.gpu.queue(),
            &self.pipeline,
            image_index,
            image,
        )
    }

    pub fn textured_images(&self) -> usize {
        self.tiles.as_ref().map_or(0, TileSet::textured_images)
    }

    pub fn release_tiles(&mut self) {
        if let Some(tiles) = self.tiles.take() {
            tiles.release();
        }
    }

    pub fn render(&mut self, scene_offset: f64) -> FrameStatus {
        let frame = match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("carousel surface lost; reconfiguring");
                let size = self.gpu.window.inner_size();
                self.gpu.resize(size);
                return FrameStatus::Reconfigured;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("carousel surface out of memory");
                return FrameStatus::Fatal;
            }
            Err(SurfaceError::Timeout) => {
                warn!("carousel surface acquisition timed out");
                return FrameStatus::Skipped;
            }
            Err(SurfaceError::Other) => {
                warn!("carousel surface reported an unknown error; retrying");
                let size = self.gpu.window.inner_size();
                self.gpu.resize(size);
                return FrameStatus::Reconfigured;
            }
        };

        let offset = scene_offset as f32;
        self.pipeline
            .write_globals(self.gpu.queue(), &GlobalsUniform::new(self.view_proj, offset));

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("carousel-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("carousel-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(tiles) = self.tiles.as_ref() {
                tiles.draw(&mut pass, &self.pipeline, offset);
            }
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        frame.present();
        FrameStatus::Presented
    }
}

impl Drop for CarouselRenderer {
    fn drop(&mut self) {
        self.release_tiles();
    }
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Clear colour for an sRGB surface, given an 8-bit sRGB background.
pub fn clear_color(rgb: [u8; 3]) -> wgpu::Color {
    wgpu::Color {
        r: srgb_to_linear(rgb[0]),
        g: srgb_to_linear(rgb[1]),
        b: srgb_to_linear(rgb[2]),
        a: 1.0,
    }
}
