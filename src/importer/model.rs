//! Model import: bakes a parsed scene into mesh, skeleton and animation
//! library files.

use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec3};
use rustc_hash::FxHashSet;

use crate::codec::{BinaryCodec, MAX_SECTION_LEN};
use crate::errors::{ImportError, Result};
use crate::fingerprint::Fingerprint;
use crate::importer::scene::{
    ImportedAnimation, ImportedMesh, ImportedScene, ImportedSkin, SceneNode, TextureSource,
};
use crate::importer::{Importer, Staged, sanitize};
use crate::meta::{ExportedResource, ImportKind, ImportOptions, META_VERSION};
use crate::resources::{
    Animation, Channel, Joint, KeyFrame, Mesh, ResourceId, ResourceType, Skeleton, Vertex,
};

/// Sampling rate of imported animation clips.
pub(crate) const ANIMATION_FPS: f32 = 24.0;

/// Applies the unit-scale correction to a world transform: scale and
/// translation are multiplied by `factor`, rotation is kept.
pub(crate) fn scale_corrected(world: Mat4, factor: f32) -> Mat4 {
    let (scale, rotation, translation) = world.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(scale * factor, rotation, translation * factor)
}

/// Library files collected while walking a scene.
struct ModelBuild<'a> {
    staged: &'a Staged<'a>,
    previous: Option<&'a ImportOptions>,
    /// Exported texture path per scene texture; `None` for skipped textures.
    texture_paths: Vec<Option<String>>,
    children: Vec<ExportedResource>,
    taken_ids: FxHashSet<ResourceId>,
    taken_names: FxHashSet<(ResourceType, String)>,
    unnamed_nodes: usize,
}

impl ModelBuild<'_> {
    /// Reserves a unique file stem for `kind`.
    fn unique_name(&mut self, kind: ResourceType, stem: String) -> String {
        let mut name = stem.clone();
        let mut n = 1;
        while !self.taken_names.insert((kind, name.clone())) {
            name = format!("{stem}_{n}");
            n += 1;
        }
        name
    }

    /// Final and staging paths for a child file below `dir`.
    fn paths(&self, dir: &str, name: &str, kind: ResourceType) -> (PathBuf, PathBuf) {
        let file = format!("{name}.{}", kind.library_extension());
        (
            self.staged.target().join(dir).join(&file),
            self.staged.path().join(dir).join(&file),
        )
    }
}

impl Importer {
    pub(super) fn import_model(
        &self,
        source: &Path,
        bytes: &[u8],
        fingerprint: Fingerprint,
        previous: Option<&ImportOptions>,
    ) -> Result<ImportOptions> {
        let scene = self
            .parser
            .parse(source, bytes)
            .map_err(|e| ImportError::decompose(source, e))?;
        let previous = previous.filter(|p| p.importer == ImportKind::Model);

        // Textures first, so every mesh references files that already exist.
        let texture_paths = self.import_scene_textures(source, &scene)?;

        let mut taken_ids = FxHashSet::default();
        let uuid = match previous {
            Some(p) => {
                taken_ids.insert(p.uuid);
                p.uuid
            }
            None => self.fresh_id(&mut taken_ids),
        };
        let stem = source
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| sanitize(&s.to_string_lossy()));
        let target = self.config.meshes_dir().join(format!("{stem}_{uuid}"));

        let staged = Staged::new(&*self.fs, target);
        self.fs
            .make_directory(staged.path())
            .map_err(|e| ImportError::write(staged.path(), e))?;

        let mut build = ModelBuild {
            staged: &staged,
            previous,
            texture_paths,
            children: Vec::new(),
            taken_ids,
            taken_names: FxHashSet::default(),
            unnamed_nodes: 0,
        };

        for root in &scene.roots {
            self.bake_node(source, &scene, root, Mat4::IDENTITY, &mut build)?;
        }
        for skin in &scene.skins {
            self.write_skeleton(skin, &mut build)?;
        }
        for clip in &scene.animations {
            self.write_animation(clip, &mut build)?;
        }

        let record = ImportOptions {
            version: META_VERSION,
            uuid,
            importer: ImportKind::Model,
            source_path: source.to_path_buf(),
            exported_path: staged.target().to_path_buf(),
            fingerprint,
            children: build.children,
        };
        self.commit(staged, record.clone(), previous)?;
        Ok(record)
    }

    fn import_scene_textures(
        &self,
        source: &Path,
        scene: &ImportedScene,
    ) -> Result<Vec<Option<String>>> {
        let base = source.parent().unwrap_or_else(|| Path::new(""));
        let mut paths = Vec::with_capacity(scene.textures.len());
        for texture in &scene.textures {
            match texture {
                TextureSource::File(file) => {
                    let path = if file.is_absolute() {
                        file.clone()
                    } else {
                        base.join(file)
                    };
                    let outcome = self.import_unlocked(&path).map_err(|e| ImportError::Nested {
                        path: path.clone(),
                        source: Box::new(e),
                    })?;
                    paths.push(Some(outcome.exported_path.to_string_lossy().into_owned()));
                }
                TextureSource::Embedded { name } => {
                    log::warn!(
                        "Skipping embedded texture {name:?} in {}.",
                        source.display()
                    );
                    paths.push(None);
                }
            }
        }
        Ok(paths)
    }

    /// Writes one mesh file per mesh of `node`, then recurses into its
    /// children with the accumulated transform.
    fn bake_node(
        &self,
        source: &Path,
        scene: &ImportedScene,
        node: &SceneNode,
        parent: Mat4,
        build: &mut ModelBuild<'_>,
    ) -> Result<()> {
        let world = parent * node.transform;

        if !node.meshes.is_empty() {
            let node_name = match &node.name {
                Some(name) => sanitize(name),
                None => {
                    let name = format!("node{}", build.unnamed_nodes);
                    build.unnamed_nodes += 1;
                    name
                }
            };
            let baked = scale_corrected(world, self.config.scale_factor);

            for (i, &mesh_index) in node.meshes.iter().enumerate() {
                let imported = scene.meshes.get(mesh_index).ok_or_else(|| {
                    ImportError::decompose(source, format!("missing mesh {mesh_index}"))
                })?;
                let material_paths = imported
                    .textures
                    .iter()
                    .filter_map(|&t| build.texture_paths.get(t).cloned().flatten())
                    .collect();
                let mesh = bake_mesh(imported, baked, material_paths)
                    .map_err(|reason| ImportError::decompose(source, reason))?;

                let name = build.unique_name(ResourceType::Mesh, format!("{node_name}{i}"));
                self.write_child(build, "", name, ResourceType::Mesh, &mesh.serialize())?;
            }
        }

        for child in &node.children {
            self.bake_node(source, scene, child, world, build)?;
        }
        Ok(())
    }

    fn write_skeleton(&self, skin: &ImportedSkin, build: &mut ModelBuild<'_>) -> Result<()> {
        let skeleton = build_skeleton(skin, self.config.scale_factor);
        let name = build.unique_name(ResourceType::Skeleton, sanitize(&skin.name));
        self.write_child(
            build,
            "Skeletons",
            name,
            ResourceType::Skeleton,
            &skeleton.serialize(),
        )
    }

    fn write_animation(&self, clip: &ImportedAnimation, build: &mut ModelBuild<'_>) -> Result<()> {
        let animation = resample(clip, self.config.scale_factor);
        let name = build.unique_name(ResourceType::Animation, sanitize(&clip.name));
        self.write_child(
            build,
            "Animations",
            name,
            ResourceType::Animation,
            &animation.serialize(),
        )
    }

    /// Stages one child file and records it, reusing the id the same child
    /// had in the previous import.
    fn write_child(
        &self,
        build: &mut ModelBuild<'_>,
        dir: &str,
        name: String,
        kind: ResourceType,
        bytes: &[u8],
    ) -> Result<()> {
        let (exported_path, staging_path) = build.paths(dir, &name, kind);
        build.staged.write(&staging_path, bytes)?;

        let reused = build
            .previous
            .and_then(|p| p.child(&name, kind))
            .map(|c| c.uuid)
            .filter(|id| build.taken_ids.insert(*id));
        let uuid = match reused {
            Some(id) => id,
            None => self.fresh_id(&mut build.taken_ids),
        };

        build.children.push(ExportedResource {
            uuid,
            kind,
            name,
            exported_path,
        });
        Ok(())
    }
}

/// Bakes `transform` into the vertices of `imported`.
fn bake_mesh(
    imported: &ImportedMesh,
    transform: Mat4,
    material_paths: Vec<String>,
) -> std::result::Result<Mesh, String> {
    let count = imported.positions.len();
    if count > MAX_SECTION_LEN {
        return Err(format!("{count} vertices exceed the library format"));
    }
    if !imported.normals.is_empty() && imported.normals.len() != count {
        return Err(format!(
            "{} normals for {count} positions",
            imported.normals.len()
        ));
    }
    if !imported.tex_coords.is_empty() && imported.tex_coords.len() != count {
        return Err(format!(
            "{} texture coordinates for {count} positions",
            imported.tex_coords.len()
        ));
    }

    let indices = match &imported.indices {
        Some(indices) => indices.clone(),
        None => (0..count as u32).collect(),
    };
    if indices.len() > MAX_SECTION_LEN {
        return Err(format!("{} indices exceed the library format", indices.len()));
    }
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
        return Err(format!("index {bad} out of range for {count} vertices"));
    }

    let positions: Vec<Vec3> = imported
        .positions
        .iter()
        .map(|&p| transform.transform_point3(Vec3::from(p)))
        .collect();

    let normals: Vec<Vec3> = if imported.normals.is_empty() {
        smooth_normals(&positions, &indices)
    } else {
        let linear = Mat3::from_mat4(transform);
        let normal_matrix = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            Mat3::IDENTITY
        };
        imported
            .normals
            .iter()
            .map(|&n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
            .collect()
    };

    let vertices = (0..count)
        .map(|i| Vertex {
            position: positions[i].to_array(),
            normal: normals[i].to_array(),
            tex_coords: imported.tex_coords.get(i).copied().unwrap_or_default(),
        })
        .collect();

    Ok(Mesh::new(vertices, indices, material_paths))
}

/// Area-weighted vertex normals from triangle faces.
fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

/// Converts a skin into a skeleton whose joints are ordered parents first.
fn build_skeleton(skin: &ImportedSkin, scale_factor: f32) -> Skeleton {
    let depth = |mut joint: usize| {
        let mut depth = 0usize;
        while let Some(parent) = skin.joints.get(joint).and_then(|j| j.parent) {
            depth += 1;
            joint = parent;
            if depth > skin.joints.len() {
                break;
            }
        }
        depth
    };

    let mut order: Vec<usize> = (0..skin.joints.len()).collect();
    order.sort_by_key(|&j| depth(j));
    let mut new_index = vec![0u32; skin.joints.len()];
    for (new, &old) in order.iter().enumerate() {
        new_index[old] = new as u32;
    }

    let joints = order
        .iter()
        .map(|&old| {
            let joint = &skin.joints[old];
            let bind = scale_corrected(joint.inverse_bind.inverse(), scale_factor);
            Joint {
                name: joint.name.clone(),
                parent: joint.parent.map(|p| new_index[p]),
                transform: bind.to_cols_array(),
            }
        })
        .collect();
    Skeleton { joints }
}

/// Value of the last key at or before `time`, or the first key before the
/// track starts.
fn step_sample<V: Copy>(keys: &[(f32, V)], time: f32) -> Option<V> {
    let after = keys.partition_point(|(t, _)| *t <= time);
    keys.get(after.saturating_sub(1)).map(|(_, v)| *v)
}

/// Resamples every track of a clip on the union of its key times.
fn resample(clip: &ImportedAnimation, scale_factor: f32) -> Animation {
    let mut times: Vec<f32> = clip
        .tracks
        .iter()
        .flat_map(|t| {
            t.translations
                .iter()
                .map(|(time, _)| *time)
                .chain(t.rotations.iter().map(|(time, _)| *time))
        })
        .collect();
    times.sort_by(f32::total_cmp);
    times.dedup_by(|a, b| (*a - *b).abs() <= f32::EPSILON);

    let keyframes = times
        .iter()
        .map(|&time| KeyFrame {
            frame: time * ANIMATION_FPS,
            channels: clip
                .tracks
                .iter()
                .map(|track| {
                    let translation =
                        step_sample(&track.translations, time).unwrap_or(track.rest_translation);
                    Channel {
                        name: track.node.clone(),
                        translation: (Vec3::from(translation) * scale_factor).to_array(),
                        rotation: step_sample(&track.rotations, time)
                            .unwrap_or(track.rest_rotation),
                    }
                })
                .collect(),
        })
        .collect();

    Animation {
        name: clip.name.clone(),
        keyframes,
        frames: times.last().copied().unwrap_or(0.0) * ANIMATION_FPS,
        frames_per_second: ANIMATION_FPS,
    }
}
