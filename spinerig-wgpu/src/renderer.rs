use spinerig::{BlendMode, MeshBatcher, TextureId, Vertex};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const INITIAL_VERTEX_CAPACITY: usize = 1024;
const INITIAL_INDEX_CAPACITY: usize = 2048;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    pub dark_color: [f32; 4],
}

impl From<&Vertex> for GpuVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: [v.position[0], v.position[1], v.z],
            uv: v.uv,
            color: v.color,
            dark_color: v.dark_color,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    clip_from_world: [[f32; 4]; 4],
}

/// One indexed draw over the shared buffers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub texture: TextureId,
    pub blend: BlendMode,
    pub first_index: u32,
    pub index_count: u32,
}

/// Batches flattened into a single vertex/index stream.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub vertices: Vec<GpuVertex>,
    pub indices: Vec<u32>,
    pub draws: Vec<DrawCall>,
}

impl DrawList {
    pub fn from_batches(batches: &[MeshBatcher]) -> Self {
        let mut list = Self::default();
        list.extend(batches);
        list
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.draws.clear();
    }

    /// Appends every material group of `batches`.
    ///
    /// Indices are rebased onto the shared vertex stream. Groups whose material slot is
    /// unbound are dropped.
    pub fn extend(&mut self, batches: &[MeshBatcher]) {
        for batch in batches {
            let base_vertex = self.vertices.len() as u32;
            let base_index = self.indices.len();
            self.vertices.extend(batch.vertices().iter().map(GpuVertex::from));
            self.indices
                .extend(batch.indices().iter().map(|&i| base_vertex + i));

            for group in batch.groups() {
                let Some(material) = batch.material(group.material) else {
                    log::warn!("material group references unbound slot {}", group.material);
                    continue;
                };
                self.draws.push(DrawCall {
                    texture: material.texture,
                    blend: material.blend,
                    first_index: (base_index + group.start) as u32,
                    index_count: group.count as u32,
                });
            }
        }
    }
}

pub struct BatchRenderer {
    pipelines: Pipelines,
    premultiplied_alpha: bool,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    draw_list: DrawList,
}

struct Pipelines {
    normal: wgpu::RenderPipeline,
    additive: wgpu::RenderPipeline,
    multiply: wgpu::RenderPipeline,
    screen: wgpu::RenderPipeline,
}

impl Pipelines {
    fn by_blend(&self, blend: BlendMode) -> &wgpu::RenderPipeline {
        match blend {
            BlendMode::Normal => &self.normal,
            BlendMode::Additive => &self.additive,
            BlendMode::Multiply => &self.multiply,
            BlendMode::Screen => &self.screen,
        }
    }
}

impl BatchRenderer {
    /// `premultiplied_alpha` must match the `RendererConfig` the batches were built with.
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        premultiplied_alpha: bool,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spinerig-wgpu shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let globals_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spinerig globals layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spinerig texture layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
            label: Some("spinerig pipeline layout"),
            bind_group_layouts: &[&globals_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = Pipelines {
            normal: create_pipeline(
                device,
                &pipeline_layout,
                &shader,
                color_format,
                blend_state(BlendMode::Normal, premultiplied_alpha),
            ),
            additive: create_pipeline(
                device,
                &pipeline_layout,
                &shader,
                color_format,
                blend_state(BlendMode::Additive, premultiplied_alpha),
            ),
            multiply: create_pipeline(
                device,
                &pipeline_layout,
                &shader,
                color_format,
                blend_state(BlendMode::Multiply, premultiplied_alpha),
            ),
            screen: create_pipeline(
                device,
                &pipeline_layout,
                &shader,
                color_format,
                blend_state(BlendMode::Screen, premultiplied_alpha),
            ),
        };

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spinerig globals"),
            contents: bytemuck::bytes_of(&Globals {
                clip_from_world: IDENTITY,
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spinerig globals bind group"),
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipelines,
            premultiplied_alpha,
            globals_buffer,
            globals_bind_group,
            texture_bind_group_layout,
            vertex_buffer: create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY),
            index_buffer: create_index_buffer(device, INITIAL_INDEX_CAPACITY),
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            index_capacity: INITIAL_INDEX_CAPACITY,
            draw_list: DrawList::default(),
        }
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn texture_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_bind_group_layout
    }

    /// The draws recorded by the last [`Self::upload`].
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Maps world coordinates as centered pixels: x in [-w/2, w/2], y in [-h/2, h/2].
    pub fn update_globals_ortho_centered(&self, queue: &wgpu::Queue, width: f32, height: f32) {
        self.update_globals_matrix(queue, ortho_centered(width, height));
    }

    pub fn update_globals_matrix(&self, queue: &wgpu::Queue, clip_from_world: [[f32; 4]; 4]) {
        let globals = Globals { clip_from_world };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, batches: &[MeshBatcher]) {
        self.draw_list.clear();
        self.draw_list.extend(batches);

        let (vertices, indices) = (self.draw_list.vertices.len(), self.draw_list.indices.len());
        self.ensure_buffers(device, vertices, indices);
        if vertices == 0 || indices == 0 {
            return;
        }
        queue.write_buffer(
            &self.vertex_buffer,
            0,
            bytemuck::cast_slice(&self.draw_list.vertices),
        );
        queue.write_buffer(
            &self.index_buffer,
            0,
            bytemuck::cast_slice(&self.draw_list.indices),
        );
    }

    /// Issues one indexed draw per uploaded material group.
    ///
    /// Draws whose texture the provider does not know are skipped.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, textures: &'a dyn TextureProvider) {
        if self.draw_list.indices.is_empty() || self.draw_list.vertices.is_empty() {
            return;
        }

        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        for draw in &self.draw_list.draws {
            let Some(bind_group) = textures.bind_group_for(draw.texture) else {
                log::warn!("no bind group for texture {:?}", draw.texture);
                continue;
            };
            pass.set_pipeline(self.pipelines.by_blend(draw.blend));
            pass.set_bind_group(1, bind_group, &[]);
            let start = draw.first_index;
            pass.draw_indexed(start..start + draw.index_count, 0, 0..1);
        }
    }

    fn ensure_buffers(&mut self, device: &wgpu::Device, vertices: usize, indices: usize) {
        if vertices > self.vertex_capacity {
            self.vertex_capacity = grown_capacity(self.vertex_capacity, vertices);
            self.vertex_buffer = create_vertex_buffer(device, self.vertex_capacity);
            log::debug!("vertex buffer grown to {}", self.vertex_capacity);
        }
        if indices > self.index_capacity {
            self.index_capacity = grown_capacity(self.index_capacity, indices);
            self.index_buffer = create_index_buffer(device, self.index_capacity);
            log::debug!("index buffer grown to {}", self.index_capacity);
        }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Centered pixel projection. Slot depth is flattened to `z = 0` so any `z_offset`
/// stays inside the clip volume; hosts that depth-test pass their own matrix.
pub fn ortho_centered(width: f32, height: f32) -> [[f32; 4]; 4] {
    let mut m = IDENTITY;
    m[0][0] = 2.0 / width.max(1.0);
    m[1][1] = 2.0 / height.max(1.0);
    m[2][2] = 0.0;
    m
}

/// Doubles `capacity` until it holds `required`.
pub(crate) fn grown_capacity(capacity: usize, required: usize) -> usize {
    let mut capacity = capacity.max(1);
    while capacity < required {
        capacity *= 2;
    }
    capacity
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spinerig vertices"),
        size: (capacity * std::mem::size_of::<GpuVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spinerig indices"),
        size: (capacity * std::mem::size_of::<u32>()) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("spinerig pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<GpuVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x2,
                    2 => Float32x4,
                    3 => Float32x4
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Blend factors for `blend`. Alpha always uses `One` as source factor and shares the
/// destination factor with color.
pub fn blend_state(blend: BlendMode, premultiplied_alpha: bool) -> wgpu::BlendState {
    use wgpu::{BlendComponent, BlendFactor, BlendOperation};

    let straight_or_pma = if premultiplied_alpha {
        BlendFactor::One
    } else {
        BlendFactor::SrcAlpha
    };
    let (src_color, dst) = match blend {
        BlendMode::Normal => (straight_or_pma, BlendFactor::OneMinusSrcAlpha),
        BlendMode::Additive => (straight_or_pma, BlendFactor::One),
        BlendMode::Multiply => (BlendFactor::Dst, BlendFactor::OneMinusSrcAlpha),
        BlendMode::Screen => (BlendFactor::One, BlendFactor::OneMinusSrc),
    };

    wgpu::BlendState {
        color: BlendComponent {
            src_factor: src_color,
            dst_factor: dst,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: dst,
            operation: BlendOperation::Add,
        },
    }
}

pub trait TextureProvider {
    fn bind_group_for(&self, texture: TextureId) -> Option<&wgpu::BindGroup>;
}

#[derive(Default)]
pub struct HashMapTextureProvider {
    pub bind_groups: HashMap<TextureId, wgpu::BindGroup>,
}

impl TextureProvider for HashMapTextureProvider {
    fn bind_group_for(&self, texture: TextureId) -> Option<&wgpu::BindGroup> {
        self.bind_groups.get(&texture)
    }
}

pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("spinerig texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// A clamped sampler with the same filter for magnification, minification and mips.
pub fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("spinerig sampler"),
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        ..Default::default()
    })
}

const SHADER: &str = r#"
struct Globals {
  clip_from_world: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

struct VsIn {
  @location(0) position: vec3<f32>,
  @location(1) uv: vec2<f32>,
  @location(2) light_color: vec4<f32>,
  @location(3) dark_color: vec4<f32>,
};

struct VsOut {
  @builtin(position) position: vec4<f32>,
  @location(0) uv: vec2<f32>,
  @location(1) light_color: vec4<f32>,
  @location(2) dark_color: vec4<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
  var out: VsOut;
  out.position = globals.clip_from_world * vec4<f32>(in.position, 1.0);
  out.uv = in.uv;
  out.light_color = in.light_color;
  out.dark_color = in.dark_color;
  return out;
}

@group(1) @binding(0)
var tex: texture_2d<f32>;

@group(1) @binding(1)
var samp: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
  let tex_color = textureSample(tex, samp, in.uv);
  let alpha = tex_color.a * in.light_color.a;
  let rgb = ((tex_color.a - 1.0) * in.dark_color.a + 1.0 - tex_color.rgb) * in.dark_color.rgb
    + tex_color.rgb * in.light_color.rgb;
  return vec4<f32>(rgb, alpha);
}
"#;
