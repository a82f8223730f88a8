use crate::renderer::scene::QuadVertex;

/// Tiles drawn per frame; one per stream kind is enough.
pub const MAX_TILES: usize = 8;
const VERTS_PER_TILE: usize = 4;

/// Textured quads for the auxiliary stream tiles.
pub struct QuadPipeline {
    pipeline: wgpu::RenderPipeline,
    vb: wgpu::Buffer,
}

impl QuadPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        texture_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let vb = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tile Quad VB"),
            size: (MAX_TILES * VERTS_PER_TILE * std::mem::size_of::<QuadVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tiles WGSL"),
            source: wgpu::ShaderSource::Wgsl(TILES_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tile PipelineLayout"),
            bind_group_layouts: &[texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tile Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            shader_location: 0,
                            offset: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            shader_location: 1,
                            offset: 8,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline, vb }
    }

    /// Writes the corners of up to `MAX_TILES` quads; returns how many fit.
    pub fn write_quads(&self, queue: &wgpu::Queue, quads: &[[QuadVertex; 4]]) -> usize {
        let n = quads.len().min(MAX_TILES);
        if quads.len() > MAX_TILES {
            log::warn!("Only {} of {} stream tiles are drawn", MAX_TILES, quads.len());
        }
        if n > 0 {
            queue.write_buffer(&self.vb, 0, bytemuck::cast_slice(&quads[..n]));
        }
        n
    }

    /// Draws quad `index` written by `write_quads`.
    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, index: usize, texture: &'a wgpu::BindGroup) {
        let first = (index * VERTS_PER_TILE) as u32;
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, texture, &[]);
        rpass.set_vertex_buffer(0, self.vb.slice(..));
        rpass.draw(first..first + VERTS_PER_TILE as u32, 0..1);
    }
}

pub const TILES_WGSL: &str = r#"
@group(0) @binding(0) var tSrc: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;

struct VSOut {
    @builtin(position) clip: vec4<f32>,
    @location(0)         uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VSOut {
    var out: VSOut;
    out.clip = vec4<f32>(pos, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    return textureSample(tSrc, samp, in.uv);
}
"#;
