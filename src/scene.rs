//! The scene: meshes, where to draw them, and the program they are drawn with.

use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};

use crate::abs::{Gpu, ImageLoader, Mesh, ShaderProgram, TextureKind, TextureSet, Vertex};
use crate::config::SceneConfig;
use crate::error::{Result, TextureError};

/// Where the reference scene places its cubes.
pub const CUBE_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(1.5, 0.2, -1.5),
    Vec3::new(-1.3, 1.0, -1.5),
];

/// Axis every instance spins around.
const SPIN_AXIS: Vec3 = Vec3::new(1.0, 0.3, 0.5);

/// Refers to a mesh added to a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshId(usize);

/// One placement of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshInstance {
    pub mesh: MeshId,
    pub position: Vec3,
}

pub struct Scene {
    shader: ShaderProgram,
    meshes: Vec<Mesh>,
    instances: Vec<MeshInstance>,
}

impl Scene {
    pub fn new(shader: ShaderProgram) -> Self {
        Self {
            shader,
            meshes: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_instance(&mut self, mesh: MeshId, position: Vec3) {
        self.instances.push(MeshInstance { mesh, position });
    }

    /// Model transform of the `index`th instance at `time` seconds: translate to `position`,
    /// then spin by `20 * index` degrees plus one radian per second.
    pub fn model_matrix(index: usize, position: Vec3, time: f32) -> Mat4 {
        let angle = (20.0 * index as f32).to_radians() + time;
        Mat4::from_translation(position) * Mat4::from_axis_angle(SPIN_AXIS.normalize(), angle)
    }

    /// Draws every instance with `modelview = view * model` and `perspective = projection`.
    pub fn draw_all(&self, view: Mat4, projection: Mat4, time: f32) -> Result<(), TextureError> {
        self.shader.use_program();
        self.shader.set_uniform("perspective", projection);

        for (index, instance) in self.instances.iter().enumerate() {
            let Some(mesh) = self.meshes.get(instance.mesh.0) else {
                continue;
            };
            let model = Self::model_matrix(index, instance.position, time);
            self.shader.set_uniform("modelview", view * model);
            mesh.draw(&self.shader)?;
        }
        Ok(())
    }

    pub fn shader(&self) -> &ShaderProgram {
        &self.shader
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn instances(&self) -> &[MeshInstance] {
        &self.instances
    }
}

/// A unit cube centred on the origin, four vertices per face so each face gets its own normal
/// and texture coordinates.
pub fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, u axis, v axis) per face.
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];
    let corners: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(faces.len() * corners.len());
    let mut indices = Vec::with_capacity(faces.len() * 6);
    for (face, (normal, u, v)) in faces.into_iter().enumerate() {
        for (s, t) in corners {
            vertices.push(Vertex::new(
                (normal + u * s + v * t) * 0.5,
                normal,
                Vec2::new((s + 1.0) / 2.0, (t + 1.0) / 2.0),
            ));
        }
        let base = 4 * face as u32;
        indices.extend([2, 3, 0, 2, 1, 0].map(|i| base + i));
    }
    (vertices, indices)
}

/// Builds the textured spinning cubes the binary shows.
///
/// Uses the configured shader files if both are given, else the embedded `scene` program.
pub fn reference_scene(
    gl: &Rc<dyn Gpu>,
    config: &SceneConfig,
    images: &dyn ImageLoader,
) -> Result<Scene> {
    let shader = match (&config.vertex_shader, &config.fragment_shader) {
        (Some(vertex), Some(fragment)) => {
            ShaderProgram::from_files(gl, vertex, fragment, config.geometry_shader.as_deref())?
        }
        _ => ShaderProgram::embedded(gl, "scene")?,
    };

    let mut textures = TextureSet::new(gl);
    for material in &config.materials {
        let kind: TextureKind = material.kind.parse()?;
        textures.load_2d(images, &material.path, kind)?;
    }
    if let Some(faces) = &config.skybox {
        textures.load_cubemap(images, faces)?;
    }

    let (vertices, indices) = cube_geometry();
    let mut scene = Scene::new(shader);
    let cube = Mesh::new(gl, vertices, indices, textures)?;
    log::debug!(
        "cube mesh: {} vertices, {} indices, {} textures",
        cube.vertices().len(),
        cube.indices().len(),
        cube.textures().len()
    );
    let cube = scene.add_mesh(cube);

    let positions = config.positions.as_deref().unwrap_or(&CUBE_POSITIONS[..]);
    for &position in positions {
        scene.add_instance(cube, position);
    }

    log::info!(
        "built scene: {} meshes, {} instances",
        scene.meshes.len(),
        scene.instances.len()
    );
    Ok(scene)
}
