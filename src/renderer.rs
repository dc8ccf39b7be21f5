use crate::camera::{OrbitCamera, Projection, ViewPreset};
use crate::game::GameState;
use crate::heightmap;
use crate::mesh::{self, MeshData, Vertex};
use crate::terrain::Terrain;
use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};
use winit::window::Window;

const HEIGHT_AMPLITUDE: f32 = 20.0;
const AIM_LINE_LENGTH: f32 = 6.0;
const TERRAIN_COLOR: [f32; 3] = [0.69, 0.3, 0.2];
const TOP_SCALE: f32 = 5.0;
const TARGET_SCALE: f32 = 2.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        self.view_proj =
            (projection.build_projection_matrix() * camera.build_view_matrix()).to_cols_array_2d();
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
}

/// An uploaded mesh plus its per-object model-matrix uniform.
struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
}

impl Mesh {
    fn upload(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        data: &MeshData,
        label: &str,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Model Buffer")),
            contents: bytemuck::cast_slice(&[ModelUniform {
                model: Mat4::IDENTITY.to_cols_array_2d(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
            label: Some(&format!("{label} Model Bind Group")),
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
            model_buffer,
            model_bind_group,
        }
    }

    fn set_model(&self, queue: &wgpu::Queue, model: Mat4) {
        let uniform = ModelUniform {
            model: model.to_cols_array_2d(),
        };
        queue.write_buffer(&self.model_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>) {
        render_pass.set_bind_group(1, &self.model_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }
}

pub struct State {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    camera: OrbitCamera,
    projection: Projection,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    terrain_mesh: Mesh,
    top_mesh: Mesh,
    target_mesh: Mesh,
    aim_mesh: Mesh,
    // The world transform scales the grid into a ~5 unit square centered at
    // the origin, matching the terrain's on-screen footprint.
    world: Mat4,
    terrain: Terrain,
    game: GameState,
}

impl State {
    pub async fn new(window: Arc<Window>, heightmap_path: &str) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .context("no suitable gpu adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut terrain = heightmap::load_terrain(heightmap_path, HEIGHT_AMPLITUDE)?;
        let extent = terrain.width().max(terrain.length()) as f32 - 1.0;
        let world = Mat4::from_scale(Vec3::splat(5.0 / extent))
            * Mat4::from_translation(Vec3::new(
                -((terrain.width() - 1) as f32) / 2.0,
                0.0,
                -((terrain.length() - 1) as f32) / 2.0,
            ));

        let camera = OrbitCamera::new();
        let projection = Projection::new(config.width, config.height, 45.0, 0.1, 200.0);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_layout_entry],
                label: Some("camera_bind_group_layout"),
            });
        let model_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_layout_entry],
                label: Some("model_bind_group_layout"),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let (depth_texture, depth_view) = create_depth_texture(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let terrain_mesh = Mesh::upload(
            &device,
            &model_bind_group_layout,
            &mesh::terrain_mesh(&mut terrain, TERRAIN_COLOR),
            "Terrain",
        );
        let top_mesh = Mesh::upload(
            &device,
            &model_bind_group_layout,
            &mesh::spinning_top(),
            "Top",
        );
        let target_mesh = Mesh::upload(
            &device,
            &model_bind_group_layout,
            &mesh::target_rings(),
            "Target",
        );
        let aim_mesh = Mesh::upload(
            &device,
            &model_bind_group_layout,
            &mesh::aim_line(AIM_LINE_LENGTH, [0.0, 0.7, 1.0]),
            "Aim",
        );

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout, &model_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                // Tori and the open cone are visible from both sides.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let game = GameState::new();
        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            camera,
            projection,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            depth_texture,
            depth_view,
            terrain_mesh,
            top_mesh,
            target_mesh,
            aim_mesh,
            world,
            terrain,
            game,
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn score(&self) -> u32 {
        self.game.score
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.projection.resize(new_size.width, new_size.height);
            let (texture, view) = create_depth_texture(&self.device, &self.config);
            self.depth_texture = texture;
            self.depth_view = view;
        }
    }

    /// Keyboard handling: arrows wind up the launch, `L` fires it, digits
    /// pick a camera preset, and the remaining keys nudge the camera.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput {
            event: key_event, ..
        } = event
        else {
            return false;
        };
        if key_event.state != ElementState::Pressed {
            return false;
        }
        match &key_event.logical_key {
            Key::Named(NamedKey::ArrowUp) => self.game.adjust_thrust(1.0),
            Key::Named(NamedKey::ArrowDown) => self.game.adjust_thrust(-1.0),
            Key::Named(NamedKey::ArrowLeft) => self.game.steer(-1.0),
            Key::Named(NamedKey::ArrowRight) => self.game.steer(1.0),
            Key::Named(NamedKey::Space) => self.camera.pitch += 10.0,
            Key::Character(c) => match c.as_str() {
                "l" => self.game.launch(),
                "1" => self.apply_preset(ViewPreset::Overview),
                "2" => self.apply_preset(ViewPreset::Chase),
                "3" => self.apply_preset(ViewPreset::Side),
                "5" => self.apply_preset(ViewPreset::HighTrail),
                "c" => self.camera.yaw += 10.0,
                "v" => self.camera.yaw -= 10.0,
                "z" => self.camera.pitch += 5.0,
                "x" => self.camera.pitch -= 5.0,
                "w" => self.camera.focus.z -= 0.5,
                "s" => self.camera.focus.z += 0.5,
                "a" => self.camera.focus.x -= 0.5,
                "d" => self.camera.focus.x += 0.5,
                _ => return false,
            },
            _ => return false,
        }
        true
    }

    fn apply_preset(&mut self, preset: ViewPreset) {
        let avatar = self.avatar_world_position();
        self.camera.apply_preset(preset, avatar);
    }

    fn avatar_world_position(&self) -> Vec3 {
        let (gx, gz) = self.game.grid_position(&self.terrain);
        let height = self.terrain.get_height(gx, gz);
        self.world.transform_point3(Vec3::new(
            self.game.position.x,
            height,
            self.game.position.y,
        ))
    }

    /// One frame: advance the game, settle the camera, and refresh uniforms.
    pub fn update(&mut self) {
        self.game.tick();
        if self.game.detect_target() {
            // Scoring sends the avatar home; snap the camera back too.
            self.apply_preset(ViewPreset::Overview);
        }

        let (gx, gz) = self.game.grid_position(&self.terrain);
        let height = self.terrain.get_height(gx, gz);
        let normal = self.terrain.get_normal(gx, gz);
        let avatar_grid = Vec3::new(self.game.position.x, height, self.game.position.y);

        let avatar_world = self.world.transform_point3(avatar_grid);
        self.camera.follow(avatar_world);
        self.camera_uniform
            .update_view_proj(&self.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );

        self.terrain_mesh.set_model(&self.queue, self.world);

        let tilt = tilt_to_normal(normal);
        let spin = Quat::from_rotation_y(self.game.spin_degrees.to_radians());
        let top_model = self.world
            * Mat4::from_translation(avatar_grid)
            * Mat4::from_quat(tilt * spin)
            * Mat4::from_scale(Vec3::splat(TOP_SCALE));
        self.top_mesh.set_model(&self.queue, top_model);

        let aim_model = self.world
            * Mat4::from_translation(avatar_grid)
            * Mat4::from_rotation_y(-self.game.heading);
        self.aim_mesh.set_model(&self.queue, aim_model);

        let target_model = self.world
            * Mat4::from_translation(Vec3::new(self.game.target.x, 0.0, self.game.target.y))
            * Mat4::from_scale(Vec3::splat(TARGET_SCALE));
        self.target_mesh.set_model(&self.queue, target_model);
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.2,
                            b: 0.3,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            self.terrain_mesh.draw(&mut render_pass);
            self.top_mesh.draw(&mut render_pass);
            self.target_mesh.draw(&mut render_pass);
            self.aim_mesh.draw(&mut render_pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Rotation aligning the top's spin axis (+Y) with the terrain normal under
/// it.
fn tilt_to_normal(normal: Vec3) -> Quat {
    let n = normal.normalize();
    let axis = Vec3::Y.cross(n);
    if axis.length_squared() < 1e-12 {
        return Quat::IDENTITY;
    }
    let angle = Vec3::Y.dot(n).clamp(-1.0, 1.0).acos();
    Quat::from_axis_angle(axis.normalize(), angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_ground_needs_no_tilt() {
        assert_eq!(tilt_to_normal(Vec3::new(0.0, 3.0, 0.0)), Quat::IDENTITY);
    }

    #[test]
    fn tilt_carries_up_onto_the_normal() {
        let n = Vec3::new(1.0, 1.0, 0.0);
        let rotated = tilt_to_normal(n) * Vec3::Y;
        assert!(rotated.abs_diff_eq(n.normalize(), 1e-5));
    }
}
