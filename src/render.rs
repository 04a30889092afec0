//! GPU side of the viewer.
//!
//! - [`GpuModel`] holds the vertex, index and instance buffers of one scene graph
//! - [`MeshRenderer`] owns the pipeline plus camera and light uniforms and draws a [`GpuModel`]
//! - [`DepthTexture`] is the depth attachment the pipeline expects
//!
//! Nothing here touches the loading pipeline; a host uploads whatever model the
//! viewer currently shows and re-uploads when [`StepViewer::model_version`]
//! changes.
//!
//! [`StepViewer::model_version`]: crate::viewer::StepViewer::model_version

use anyhow::Context;
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraUniform},
    data_structures::{instance::Instance, model::Mesh, scene_graph::SceneNode},
    pipelines::{
        basic::mk_mesh_pipeline,
        light::{LightResources, LightUniform},
    },
};

pub struct DepthTexture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[Self::FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct GpuMesh {
    pub name: String,
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    instance_buffer: wgpu::Buffer,
    num_elements: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, mesh: &Mesh, world: &Instance) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = (!mesh.indices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[world.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_elements: if mesh.indices.is_empty() {
                mesh.vertex_count() as u32
            } else {
                mesh.num_elements()
            },
        }
    }
}

/// A scene graph uploaded to the GPU, one [`GpuMesh`] per mesh node.
pub struct GpuModel {
    pub meshes: Vec<GpuMesh>,
}

impl GpuModel {
    pub fn upload(device: &wgpu::Device, model: &dyn SceneNode) -> Self {
        let mut meshes = Vec::with_capacity(model.mesh_count());
        collect(device, model, &Instance::new(), &mut meshes);
        log::debug!("Uploaded {} meshes", meshes.len());
        Self { meshes }
    }

    pub fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>) {
        for mesh in &self.meshes {
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
            match &mesh.index_buffer {
                Some(index) => {
                    render_pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.num_elements, 0, 0..1);
                }
                None => render_pass.draw(0..mesh.num_elements, 0..1),
            }
        }
    }
}

fn collect(device: &wgpu::Device, node: &dyn SceneNode, parent: &Instance, out: &mut Vec<GpuMesh>) {
    let world = parent * node.get_local_transform();
    if let Some(mesh) = node.get_mesh() {
        out.push(GpuMesh::new(device, mesh, &world));
    }
    for child in node.get_children() {
        collect(device, child.as_ref(), &world, out);
    }
}

pub struct MeshRenderer {
    pipeline: wgpu::RenderPipeline,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light: LightResources,
}

impl MeshRenderer {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let light = LightResources::new(device, LightUniform::default());
        let pipeline = mk_mesh_pipeline(
            device,
            color_format,
            &camera_bind_group_layout,
            &light.bind_group_layout,
        );

        Self {
            pipeline,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            light,
        }
    }

    pub fn update_camera(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        self.camera_uniform.update_view_proj(camera);
        queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );
    }

    pub fn set_lights(&mut self, queue: &wgpu::Queue, lights: LightUniform) {
        self.light.uniform = lights;
        queue.write_buffer(&self.light.buffer, 0, bytemuck::cast_slice(&[lights]));
    }

    pub fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, model: &'a GpuModel) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.light.bind_group, &[]);
        model.draw(render_pass);
    }
}

/// A device without a surface, for off-screen rendering.
pub async fn headless_device() -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable GPU adapter")?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("step-ngin headless device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}
