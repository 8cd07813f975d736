use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::carousel::geometry::{PLANE_ASPECT, PLANE_HEIGHT, PLANE_WIDTH};
use crate::carousel::layout::TileLayout;
use crate::events::PreparedImageCpu;

/// Grid resolution of the tile plane; the curve warp needs interior vertices.
pub const PLANE_SEGMENTS: u16 = 20;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TileVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl TileVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub scene: [f32; 4],
}

impl GlobalsUniform {
    pub fn new(view_proj: Mat4, scene_offset: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            scene: [scene_offset, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TileUniform {
    /// x position, curve, border radius, unused
    pub placement: [f32; 4],
    /// image aspect, plane aspect, unused, unused
    pub aspect: [f32; 4],
}

impl TileUniform {
    pub fn new(x: f32, curve: f32, border_radius: f32) -> Self {
        Self {
            placement: [x, curve, border_radius, 0.0],
            aspect: [PLANE_ASPECT, PLANE_ASPECT, 0.0, 0.0],
        }
    }

    pub fn with_image_aspect(mut self, image_aspect: f32) -> Self {
        self.aspect[0] = image_aspect;
        self
    }
}

/// Subdivided plane centred on the origin, UV `(0, 0)` at the top-left corner.
#[derive(Debug, Clone)]
pub struct PlaneMesh {
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u16>,
}

impl PlaneMesh {
    pub fn new(width: f32, height: f32, segments: u16) -> Self {
        let segments = segments.max(1);
        let row = segments + 1;
        let step = f32::from(segments);

        let mut vertices = Vec::with_capacity(usize::from(row) * usize::from(row));
        for iy in 0..row {
            for ix in 0..row {
                let u = f32::from(ix) / step;
                let v = f32::from(iy) / step;
                vertices.push(TileVertex {
                    position: [(u - 0.5) * width, (0.5 - v) * height],
                    uv: [u, v],
                });
            }
        }

        let mut indices = Vec::with_capacity(usize::from(segments) * usize::from(segments) * 6);
        for iy in 0..segments {
            for ix in 0..segments {
                let a = iy * row + ix;
                let b = a + 1;
                let c = a + row;
                let d = c + 1;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        Self { vertices, indices }
    }
}

/// Shader, layouts and the buffers shared by every tile.
pub struct TilePipeline {
    pipeline: wgpu::RenderPipeline,
    tile_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl TilePipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("carousel-tile-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tile.wgsl").into()),
        });

        let uniform_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("carousel-globals-bgl"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX)],
        });
        let tile_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("carousel-tile-bgl"),
            entries: &[uniform_entry(
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("carousel-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("carousel-tile-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &tile_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("carousel-tile-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[TileVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("carousel-tile-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("carousel-globals"),
            contents: bytemuck::bytes_of(&GlobalsUniform::new(Mat4::IDENTITY, 0.0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("carousel-globals-bind-group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let mesh = PlaneMesh::new(PLANE_WIDTH, PLANE_HEIGHT, PLANE_SEGMENTS);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("carousel-plane-vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("carousel-plane-indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            pipeline,
            tile_layout,
            texture_layout,
            sampler,
            globals_buffer,
            globals_bind_group,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    pub fn write_globals(&self, queue: &wgpu::Queue, globals: &GlobalsUniform) {
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(globals));
    }
}

struct GpuTile {
    image_index: usize,
    x: f32,
    uniform: TileUniform,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ImageTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// GPU resources for one layout generation.
pub struct TileSet {
    tiles: Vec<GpuTile>,
    textures: Vec<Option<ImageTexture>>,
    cull_half_width: f32,
}

impl TileSet {
    pub fn new(
        device: &wgpu::Device,
        pipeline: &TilePipeline,
        layout: &TileLayout,
        image_count: usize,
        curve: f32,
        border_radius: f32,
        visible_width: f32,
    ) -> Self {
        let tiles = layout
            .tiles
            .iter()
            .map(|slot| {
                let x = slot.x as f32;
                let uniform = TileUniform::new(x, curve, border_radius);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("carousel-tile-uniform"),
                    contents: bytemuck::bytes_of(&uniform),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("carousel-tile-bind-group"),
                    layout: &pipeline.tile_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                GpuTile {
                    image_index: slot.image_index,
                    x,
                    uniform,
                    buffer,
                    bind_group,
                }
            })
            .collect();

        Self {
            tiles,
            textures: (0..image_count).map(|_| None).collect(),
            cull_half_width: visible_width * 0.5 + PLANE_WIDTH,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn textured_images(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    /// Upload `image` and hand it to every tile that shows `image_index`.
    /// Returns how many tiles now display it.
    pub fn attach_image(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &TilePipeline,
        image_index: usize,
        image: &PreparedImageCpu,
    ) -> usize {
        let Some(slot) = self.textures.get_mut(image_index) else {
            return 0;
        };

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("carousel-image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            texture.as_image_copy(),
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("carousel-image-bind-group"),
            layout: &pipeline.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
                },
            ],
        });
        if let Some(previous) = slot.replace(ImageTexture {
            texture,
            bind_group,
        }) {
            previous.texture.destroy();
        }

        let image_aspect = image.width as f32 / image.height.max(1) as f32;
        let mut updated = 0;
        for tile in self.tiles.iter_mut().filter(|t| t.image_index == image_index) {
            tile.uniform = tile.uniform.with_image_aspect(image_aspect);
            queue.write_buffer(&tile.buffer, 0, bytemuck::bytes_of(&tile.uniform));
            updated += 1;
        }
        updated
    }

    /// Draw every textured tile that can reach the viewport at `scene_offset`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, pipeline: &TilePipeline, scene_offset: f32) {
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &pipeline.globals_bind_group, &[]);
        pass.set_vertex_buffer(0, pipeline.vertex_buffer.slice(..));
        pass.set_index_buffer(pipeline.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        for tile in &self.tiles {
            if (tile.x + scene_offset).abs() > self.cull_half_width {
                continue;
            }
            let Some(Some(texture)) = self.textures.get(tile.image_index) else {
                continue;
            };
            pass.set_bind_group(1, &tile.bind_group, &[]);
            pass.set_bind_group(2, &texture.bind_group, &[]);
            pass.draw_indexed(0..pipeline.index_count, 0, 0..1);
        }
    }

    /// Destroy every buffer and texture owned by this generation.
    pub fn release(self) {
        let tiles = self.tiles.len();
        for tile in self.tiles {
            tile.buffer.destroy();
        }
        for texture in self.textures.into_iter().flatten() {
            texture.texture.destroy();
        }
        debug!(tiles, "released tile resources");
    }
}
