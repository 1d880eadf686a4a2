// Model loading
//
// Wavefront OBJ files are loaded with tobj, flattened into a single indexed
// mesh and deduplicated so shared corners are stored once.

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::path::Path;
use crate::vertex::Vertex;

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Load every model in an OBJ file into one mesh
    pub fn load_obj(path: &Path) -> Result<Self> {
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("Failed to load model {:?}", path))?;

        let mut mesh = Mesh::default();
        let mut unique_vertices: HashMap<Vertex, u32> = HashMap::new();

        for model in &models {
            let positions = &model.mesh.positions;
            let texcoords = &model.mesh.texcoords;

            for &index in &model.mesh.indices {
                let i = index as usize;
                let pos = positions
                    .get(3 * i..3 * i + 3)
                    .with_context(|| format!("Model {:?} has index {} out of range", path, index))?;

                // OBJ puts v = 0 at the bottom of the image, Vulkan at the top
                let tex_coord = match texcoords.get(2 * i..2 * i + 2) {
                    Some(uv) => Vec2::new(uv[0], 1.0 - uv[1]),
                    None => Vec2::ZERO,
                };

                let vertex = Vertex::new(Vec3::from_slice(pos), Vec3::ONE, tex_coord);
                mesh.push(vertex, &mut unique_vertices);
            }
        }

        if mesh.indices.is_empty() {
            anyhow::bail!("Model {:?} contains no triangles", path);
        }

        log::info!(
            "Loaded model {:?}: {} unique vertices, {} indices",
            path,
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(mesh)
    }

    fn push(&mut self, vertex: Vertex, unique_vertices: &mut HashMap<Vertex, u32>) {
        let index = *unique_vertices.entry(vertex).or_insert_with(|| {
            self.vertices.push(vertex);
            (self.vertices.len() - 1) as u32
        });
        self.indices.push(index);
    }

    /// Two stacked textured quads, used when no model file is available
    pub fn quads() -> Self {
        let corners = [
            (Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0), Vec2::new(1.0, 0.0)),
            (Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0), Vec2::new(0.0, 0.0)),
            (Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.0, 1.0)),
            (Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), Vec2::new(1.0, 1.0)),
        ];

        let mut vertices = Vec::with_capacity(8);
        for z in [0.0, -0.5] {
            for (xy, color, uv) in corners {
                vertices.push(Vertex::new(xy.extend(z), color, uv));
            }
        }

        let indices = vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4];

        Self { vertices, indices }
    }

    /// Model at `path`, or the built-in quads if the file doesn't exist
    pub fn load_or_fallback(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_obj(path)
        } else {
            log::warn!("Model {:?} not found, drawing built-in quads", path);
            Ok(Self::quads())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_quad_shares_corners() {
        let path = write_obj(
            "model-viewer-quad.obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3\nf 3/3 4/4 1/1\n",
        );

        let mesh = Mesh::load_obj(&path).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_v_coordinate_is_flipped() {
        let path = write_obj(
            "model-viewer-flip.obj",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25 0.0\nvt 1 0.75\nvt 0 1\nf 1/1 2/2 3/3\n",
        );

        let mesh = Mesh::load_obj(&path).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, Vec2::new(0.25, 1.0));
        assert_eq!(mesh.vertices[1].tex_coord, Vec2::new(1.0, 0.25));
        assert_eq!(mesh.vertices[2].tex_coord, Vec2::new(0.0, 0.0));
        assert!(mesh.vertices.iter().all(|v| v.color == Vec3::ONE));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_quad_face_is_triangulated_without_texcoords() {
        let path = write_obj(
            "model-viewer-notex.obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );

        let mesh = Mesh::load_obj(&path).unwrap();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 4);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let path = write_obj("model-viewer-empty.obj", "# nothing here\nv 0 0 0\n");
        assert!(Mesh::load_obj(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_model_falls_back_to_quads() {
        let mesh = Mesh::load_or_fallback(Path::new("no/such/model.obj")).unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 12);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        // Second quad sits behind the first
        assert!(mesh.vertices[4..].iter().all(|v| v.pos.z == -0.5));
    }
}
