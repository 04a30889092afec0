use crate::{
    data_structures::{
        model::{Material, Mesh},
        scene_graph::{ContainerNode, MeshNode, SceneNode},
    },
    engine::{ConversionResult, MeshRecord},
    error::{LoadError, LoadResult},
};

/**
 * Builds one model root with a mesh child per record, in engine order.
 *
 * A record that cannot be turned into geometry invalidates the whole result:
 * it means the engine output is corrupt, so no partial scene is produced.
 */
pub fn build_scene(result: &ConversionResult, name: &str) -> LoadResult<Box<dyn SceneNode>> {
    let mut root = ContainerNode::new(name);
    for (idx, record) in result.meshes.iter().enumerate() {
        let mesh = build_mesh(idx, record)?;
        root.add_child(Box::new(MeshNode::new(mesh)));
    }
    log::debug!("Built {} with {} meshes", name, root.children.len());
    Ok(Box::new(root))
}

fn corrupt(mesh: usize, reason: impl Into<String>) -> LoadError {
    LoadError::CorruptMesh {
        mesh,
        reason: reason.into(),
    }
}

fn to_vec3s(idx: usize, what: &str, flat: &[f32]) -> LoadResult<Vec<[f32; 3]>> {
    if flat.len() % 3 != 0 {
        return Err(corrupt(
            idx,
            format!("{} array length {} is not a multiple of 3", what, flat.len()),
        ));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn build_mesh(idx: usize, record: &MeshRecord) -> LoadResult<Mesh> {
    let positions = record
        .positions
        .as_deref()
        .ok_or_else(|| corrupt(idx, "no position data"))?;
    let positions = to_vec3s(idx, "position", positions)?;

    let normals = match record.normals.as_deref() {
        Some(normals) => {
            let normals = to_vec3s(idx, "normal", normals)?;
            if normals.len() != positions.len() {
                return Err(corrupt(
                    idx,
                    format!("{} normals for {} positions", normals.len(), positions.len()),
                ));
            }
            Some(normals)
        }
        None => None,
    };

    let indices = record.indices.to_u32();
    if let Some(&out_of_range) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(corrupt(
            idx,
            format!("index {} out of range for {} vertices", out_of_range, positions.len()),
        ));
    }

    let material = record
        .color
        .map(|color| Material { color })
        .unwrap_or_default();

    Ok(Mesh {
        name: record
            .name
            .clone()
            .unwrap_or_else(|| format!("mesh_{}", idx)),
        positions,
        normals,
        indices,
        material,
    })
}
