use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::Mat4;
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation, Property};
use gltf::buffer::Data;
use gltf::image::Source;

use crate::importer::scene::{
    ImportedAnimation, ImportedMesh, ImportedScene, ImportedSkin, NodeTrack, ParseError,
    SceneNode, SceneParser, SkinJoint, TextureSource,
};

/// glTF 2.0 (`.gltf` with external or data-URI buffers, and `.glb`).
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfSceneParser;

impl SceneParser for GltfSceneParser {
    fn handles(&self, ext: &str) -> bool {
        matches!(ext, "gltf" | "glb")
    }

    fn parse(&self, source: &Path, bytes: &[u8]) -> Result<ImportedScene, ParseError> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        let buffers = gltf::import_buffers(&document, source.parent(), blob)?;

        let mut scene = ImportedScene {
            textures: document.textures().map(texture_source).collect(),
            ..Default::default()
        };

        let root_nodes: Vec<gltf::Node<'_>> = match document
            .default_scene()
            .or_else(|| document.scenes().next())
        {
            Some(s) => s.nodes().collect(),
            None => return Err("glTF file contains no scene".into()),
        };

        let parents = node_parents(&document)?;

        for node in root_nodes {
            let root = read_node(&node, &buffers, &mut scene.meshes)?;
            scene.roots.push(root);
        }

        for skin in document.skins() {
            scene.skins.push(read_skin(&skin, &parents, &buffers));
        }

        for (index, animation) in document.animations().enumerate() {
            scene
                .animations
                .push(read_animation(index, &animation, &buffers)?);
        }

        Ok(scene)
    }
}

/// Parent of every child node. Fails unless the nodes form a forest: no node
/// with two parents and no node that is its own ancestor.
fn node_parents(document: &gltf::Document) -> Result<HashMap<usize, usize>, ParseError> {
    let mut parents: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            if let Some(other) = parents.insert(child.index(), node.index()) {
                return Err(format!(
                    "node {} has two parents ({other} and {})",
                    child.index(),
                    node.index()
                )
                .into());
            }
        }
    }

    // With single parents, a chain longer than the edge count is a cycle.
    for &start in parents.keys() {
        let mut current = start;
        let mut steps = 0;
        while let Some(&up) = parents.get(&current) {
            steps += 1;
            if steps > parents.len() {
                return Err(format!("node {start} is its own ancestor").into());
            }
            current = up;
        }
    }
    Ok(parents)
}

fn buffer_data<'s>(buffers: &'s [Data], buffer: &gltf::Buffer<'_>) -> Option<&'s [u8]> {
    buffers.get(buffer.index()).map(|data| data.0.as_slice())
}

fn texture_source(texture: gltf::Texture<'_>) -> TextureSource {
    let image = texture.source();
    let fallback_name = || {
        image
            .name()
            .map_or_else(|| format!("image{}", image.index()), str::to_string)
    };
    match image.source() {
        Source::Uri { uri, .. } if !uri.starts_with("data:") => {
            TextureSource::File(uri_path(uri))
        }
        _ => TextureSource::Embedded {
            name: fallback_name(),
        },
    }
}

/// Relative file path of an image URI, with percent escapes decoded. URIs
/// that do not decode to UTF-8 are used as written.
fn uri_path(uri: &str) -> PathBuf {
    match urlencoding::decode(uri) {
        Ok(decoded) => PathBuf::from(decoded.as_ref()),
        Err(_) => PathBuf::from(uri),
    }
}

fn read_node(
    node: &gltf::Node<'_>,
    buffers: &[Data],
    meshes: &mut Vec<ImportedMesh>,
) -> Result<SceneNode, ParseError> {
    let mut out = SceneNode {
        name: node.name().map(str::to_string),
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        meshes: Vec::new(),
        children: Vec::new(),
    };

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive {} of mesh {:?}.",
                    primitive.index(),
                    mesh.name()
                );
                continue;
            }
            out.meshes.push(meshes.len());
            meshes.push(read_primitive(&primitive, buffers)?);
        }
    }

    for child in node.children() {
        out.children.push(read_node(&child, buffers, meshes)?);
    }
    Ok(out)
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[Data],
) -> Result<ImportedMesh, ParseError> {
    let reader = primitive.reader(|buffer| buffer_data(buffers, &buffer));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or("primitive has no POSITION attribute")?
        .collect();

    let material = primitive.material();
    let textures = [
        material
            .pbr_metallic_roughness()
            .base_color_texture()
            .map(|info| info.texture().index()),
        material.normal_texture().map(|t| t.texture().index()),
        material.occlusion_texture().map(|t| t.texture().index()),
        material.emissive_texture().map(|info| info.texture().index()),
    ]
    .into_iter()
    .flatten()
    .collect();

    Ok(ImportedMesh {
        normals: reader.read_normals().map(Iterator::collect).unwrap_or_default(),
        tex_coords: reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().collect())
            .unwrap_or_default(),
        indices: reader.read_indices().map(|i| i.into_u32().collect()),
        positions,
        textures,
    })
}

fn read_skin(
    skin: &gltf::Skin<'_>,
    parents: &HashMap<usize, usize>,
    buffers: &[Data],
) -> ImportedSkin {
    let joints: Vec<gltf::Node<'_>> = skin.joints().collect();
    let slot_of: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(slot, node)| (node.index(), slot))
        .collect();

    let inverse_binds: Vec<Mat4> = skin
        .reader(|buffer| buffer_data(buffers, &buffer))
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    let joints = joints
        .iter()
        .enumerate()
        .map(|(slot, node)| {
            // Nearest ancestor that is itself a joint of this skin.
            let mut parent = None;
            let mut current = node.index();
            while let Some(&up) = parents.get(&current) {
                if let Some(&p) = slot_of.get(&up) {
                    parent = Some(p);
                    break;
                }
                current = up;
            }
            SkinJoint {
                name: node
                    .name()
                    .map_or_else(|| format!("joint{}", node.index()), str::to_string),
                parent,
                inverse_bind: inverse_binds.get(slot).copied().unwrap_or(Mat4::IDENTITY),
            }
        })
        .collect();

    ImportedSkin {
        name: skin
            .name()
            .map_or_else(|| format!("skin{}", skin.index()), str::to_string),
        joints,
    }
}

fn read_animation(
    index: usize,
    animation: &gltf::Animation<'_>,
    buffers: &[Data],
) -> Result<ImportedAnimation, ParseError> {
    let mut tracks: Vec<NodeTrack> = Vec::new();
    let mut track_of: HashMap<usize, usize> = HashMap::new();

    for channel in animation.channels() {
        let node = channel.target().node();
        let slot = *track_of.entry(node.index()).or_insert_with(|| {
            let (translation, rotation, _) = node.transform().decomposed();
            tracks.push(NodeTrack {
                node: node
                    .name()
                    .map_or_else(|| format!("node{}", node.index()), str::to_string),
                rest_translation: translation,
                rest_rotation: rotation,
                translations: Vec::new(),
                rotations: Vec::new(),
            });
            tracks.len() - 1
        });

        let reader = channel.reader(|buffer| buffer_data(buffers, &buffer));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        // Cubic-spline outputs are (in-tangent, value, out-tangent) triples.
        let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;
        let pick = |i: usize| if cubic { i * 3 + 1 } else { i };

        match (channel.target().property(), reader.read_outputs()) {
            (Property::Translation, Some(ReadOutputs::Translations(values))) => {
                let values: Vec<[f32; 3]> = values.collect();
                tracks[slot].translations = times
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &t)| values.get(pick(i)).map(|v| (t, *v)))
                    .collect();
            }
            (Property::Rotation, Some(ReadOutputs::Rotations(values))) => {
                let values: Vec<[f32; 4]> = values.into_f32().collect();
                tracks[slot].rotations = times
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &t)| values.get(pick(i)).map(|v| (t, *v)))
                    .collect();
            }
            _ => {}
        }
    }

    Ok(ImportedAnimation {
        name: animation
            .name()
            .map_or_else(|| format!("animation{index}"), str::to_string),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_uris_are_percent_decoded() {
        assert_eq!(uri_path("wood%20grain.png"), PathBuf::from("wood grain.png"));
        assert_eq!(uri_path("tex/%231%25.png"), PathBuf::from("tex/#1%.png"));
        assert_eq!(uri_path("plain.png"), PathBuf::from("plain.png"));
        assert_eq!(uri_path("bad%FF.png"), PathBuf::from("bad%FF.png"));
    }
}
