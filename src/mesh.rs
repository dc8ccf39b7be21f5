use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::terrain::Terrain;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// CPU-side mesh, ready to upload as vertex/index buffers.
#[derive(Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn transform(&mut self, m: Mat4) -> &mut Self {
        let normal_m = Mat3::from_mat4(m);
        for v in &mut self.vertices {
            v.position = m.transform_point3(Vec3::from(v.position)).to_array();
            v.normal = (normal_m * Vec3::from(v.normal)).to_array();
        }
        self
    }

    pub fn append(&mut self, other: MeshData) -> &mut Self {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        self
    }
}

/// Builds the terrain surface as one vertex per grid cell, two triangles per
/// quad, wound counter-clockwise seen from above. Normals come straight from
/// the terrain's normal field (non-unit; the shader normalizes).
pub fn terrain_mesh(terrain: &mut Terrain, color: [f32; 3]) -> MeshData {
    let (w, l) = (terrain.width(), terrain.length());
    let mut mesh = MeshData::default();
    for z in 0..l {
        for x in 0..w {
            mesh.vertices.push(Vertex {
                position: [x as f32, terrain.get_height(x, z), z as f32],
                normal: terrain.get_normal(x, z).to_array(),
                color,
            });
        }
    }
    let at = |x: usize, z: usize| (z * w + x) as u32;
    for z in 0..l.saturating_sub(1) {
        for x in 0..w.saturating_sub(1) {
            mesh.indices.extend([at(x, z), at(x, z + 1), at(x + 1, z)]);
            mesh.indices
                .extend([at(x + 1, z), at(x, z + 1), at(x + 1, z + 1)]);
        }
    }
    mesh
}

/// Torus around the Y axis, centered at the origin.
pub fn torus(major: f32, minor: f32, segments: u32, rings: u32, color: [f32; 3]) -> MeshData {
    let mut mesh = MeshData::default();
    for i in 0..=segments {
        let u = TAU * i as f32 / segments as f32;
        for j in 0..=rings {
            let v = TAU * j as f32 / rings as f32;
            let radial = major + minor * v.cos();
            mesh.vertices.push(Vertex {
                position: [radial * u.cos(), minor * v.sin(), radial * u.sin()],
                normal: [v.cos() * u.cos(), v.sin(), v.cos() * u.sin()],
                color,
            });
        }
    }
    for i in 0..segments {
        for j in 0..rings {
            let a = i * (rings + 1) + j;
            let b = a + rings + 1;
            mesh.indices.extend([a, b, a + 1]);
            mesh.indices.extend([a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Cone with its tip at the origin, opening upward to a base circle at
/// `y = height`.
pub fn cone(radius: f32, height: f32, segments: u32, color: [f32; 3]) -> MeshData {
    let mut mesh = MeshData::default();
    for i in 0..=segments {
        let u = TAU * i as f32 / segments as f32;
        let normal = [height * u.cos(), radius, height * u.sin()];
        mesh.vertices.push(Vertex {
            position: [0.0, 0.0, 0.0],
            normal,
            color,
        });
        mesh.vertices.push(Vertex {
            position: [radius * u.cos(), height, radius * u.sin()],
            normal,
            color,
        });
    }
    for i in 0..segments {
        let a = 2 * i;
        mesh.indices.extend([a, a + 1, a + 3]);
    }
    mesh
}

/// Open tube from `y = 0` up to `y = height`.
pub fn cylinder(radius: f32, height: f32, segments: u32, color: [f32; 3]) -> MeshData {
    let mut mesh = MeshData::default();
    for i in 0..=segments {
        let u = TAU * i as f32 / segments as f32;
        let normal = [u.cos(), 0.0, u.sin()];
        mesh.vertices.push(Vertex {
            position: [radius * u.cos(), 0.0, radius * u.sin()],
            normal,
            color,
        });
        mesh.vertices.push(Vertex {
            position: [radius * u.cos(), height, radius * u.sin()],
            normal,
            color,
        });
    }
    for i in 0..segments {
        let a = 2 * i;
        mesh.indices.extend([a, a + 1, a + 2]);
        mesh.indices.extend([a + 2, a + 1, a + 3]);
    }
    mesh
}

const RED: [f32; 3] = [1.0, 0.0, 0.0];
const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// The avatar: a cone balanced on its tip, three stacked rings, and a stem.
pub fn spinning_top() -> MeshData {
    let mut top = MeshData::default();
    top.append(cone(0.5, 0.5, 32, [0.0, 0.0, 1.0]));
    let mut ring = torus(0.5, 0.08, 50, 16, [0.0, 1.0, 0.0]);
    ring.transform(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)));
    top.append(ring);
    let mut ring = torus(0.55, 0.08, 50, 16, [1.0, 1.0, 0.0]);
    ring.transform(Mat4::from_translation(Vec3::new(0.0, 0.62, 0.0)));
    top.append(ring);
    let mut ring = torus(0.6, 0.08, 50, 16, RED);
    ring.transform(Mat4::from_translation(Vec3::new(0.0, 0.74, 0.0)));
    top.append(ring);
    let mut stem = cylinder(0.1, 1.0, 32, [0.65, 0.23, 0.23]);
    stem.transform(Mat4::from_translation(Vec3::new(0.0, 0.62, 0.0)));
    top.append(stem);
    top
}

/// The target: concentric red/white tori stood upright, facing along X.
pub fn target_rings() -> MeshData {
    let mut target = MeshData::default();
    for (major, color) in [
        (4.5, RED),
        (4.0, WHITE),
        (3.0, RED),
        (2.0, WHITE),
        (0.8, RED),
    ] {
        target.append(torus(major, 0.8, 30, 16, color));
    }
    target.transform(Mat4::from_quat(Quat::from_rotation_z(FRAC_PI_2)));
    target
}

/// Thin quad on the ground from the origin along +X, used to show the
/// current launch heading.
pub fn aim_line(length: f32, color: [f32; 3]) -> MeshData {
    let half_width = 0.06;
    let normal = [0.0, 1.0, 0.0];
    MeshData {
        vertices: vec![
            Vertex {
                position: [0.0, 0.0, -half_width],
                normal,
                color,
            },
            Vertex {
                position: [0.0, 0.0, half_width],
                normal,
                color,
            },
            Vertex {
                position: [length, 0.0, -half_width],
                normal,
                color,
            },
            Vertex {
                position: [length, 0.0, half_width],
                normal,
                color,
            },
        ],
        indices: vec![0, 1, 2, 2, 1, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_in_range(mesh: &MeshData) -> bool {
        let n = mesh.vertices.len() as u32;
        mesh.indices.iter().all(|&i| i < n)
    }

    #[test]
    fn terrain_mesh_has_one_vertex_per_cell() {
        let mut t = Terrain::new(4, 3).unwrap();
        t.set_height(1, 1, 2.0);
        let mesh = terrain_mesh(&mut t, [0.5, 0.5, 0.5]);
        assert_eq!(mesh.vertices.len(), 12);
        // 3x2 quads, two triangles each.
        assert_eq!(mesh.indices.len(), 6 * 6);
        assert!(indices_in_range(&mesh));
        // The raised cell's vertex carries its height.
        assert_eq!(mesh.vertices[1 * 4 + 1].position, [1.0, 2.0, 1.0]);
    }

    #[test]
    fn terrain_mesh_handles_single_row() {
        let mut t = Terrain::new(5, 1).unwrap();
        let mesh = terrain_mesh(&mut t, WHITE);
        assert_eq!(mesh.vertices.len(), 5);
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn torus_vertices_lie_on_the_tube() {
        let mesh = torus(2.0, 0.5, 12, 8, RED);
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            let ring_center = Vec3::new(p.x, 0.0, p.z).normalize() * 2.0;
            assert!((p.distance(ring_center) - 0.5).abs() < 1e-4);
        }
        assert!(indices_in_range(&mesh));
    }

    #[test]
    fn append_offsets_indices() {
        let mut mesh = aim_line(1.0, WHITE);
        mesh.append(aim_line(2.0, RED));
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices[6..], [4, 5, 6, 6, 5, 7]);
    }

    #[test]
    fn composite_meshes_are_well_formed() {
        for mesh in [spinning_top(), target_rings()] {
            assert!(!mesh.vertices.is_empty());
            assert!(indices_in_range(&mesh));
        }
    }

    #[test]
    fn transform_moves_positions_but_only_rotates_normals() {
        let mut mesh = aim_line(1.0, WHITE);
        mesh.transform(Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)));
        assert_eq!(mesh.vertices[0].position[1], 3.0);
        assert_eq!(mesh.vertices[0].normal, [0.0, 1.0, 0.0]);
    }
}
