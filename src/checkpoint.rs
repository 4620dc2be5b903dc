use std::{collections::HashMap, fs, path::Path};

use log::info;
use machine_learning::arch::Model;
use safetensors::{
    SafeTensors,
    tensor::{Dtype, TensorView},
};

use crate::{
    configs::Goal,
    error::{IoContext, Result, TrainerErr},
};

/// What a checkpoint records next to the parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub val_loss: f32,
    pub goal: Goal,
}

fn checkpoint_err(path: &Path, msg: impl ToString) -> TrainerErr {
    TrainerErr::Checkpoint {
        path: path.to_path_buf(),
        msg: msg.to_string(),
    }
}

/// Writes every parameter block of `model` to `path` as a safetensors file.
///
/// The file is written next to `path` first and then renamed over it, so a reader never sees a
/// partially written checkpoint.
pub fn save<M: Model + ?Sized>(model: &M, path: &Path, meta: CheckpointMeta) -> Result<()> {
    let params = model.params();
    let shapes = model.param_shapes();

    let mut blocks = Vec::with_capacity(shapes.len());
    let mut offset = 0;
    for shape in &shapes {
        let end = offset + shape.len();
        let block = params.get(offset..end).ok_or_else(|| {
            checkpoint_err(path, format!("{} overruns the parameters", shape.name))
        })?;

        blocks.push(bytemuck::cast_slice::<f32, u8>(block));
        offset = end;
    }

    let views = shapes
        .iter()
        .zip(&blocks)
        .map(|(shape, bytes)| {
            TensorView::new(Dtype::F32, shape.shape.clone(), bytes)
                .map(|view| (shape.name.as_str(), view))
                .map_err(|e| checkpoint_err(path, e))
        })
        .collect::<Result<Vec<_>>>()?;

    let metadata = HashMap::from([
        ("epoch".to_string(), meta.epoch.to_string()),
        ("val_loss".to_string(), meta.val_loss.to_string()),
        ("goal".to_string(), meta.goal.to_string()),
    ]);
    let bytes =
        safetensors::serialize(views, &Some(metadata)).map_err(|e| checkpoint_err(path, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| checkpoint_err(path, "the checkpoint path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, bytes).at(&tmp)?;
    fs::rename(&tmp, path).at(path)?;

    info!(
        "saved checkpoint of epoch {} (val loss {:.4}) to {}",
        meta.epoch,
        meta.val_loss,
        path.display()
    );
    Ok(())
}

/// Replaces the parameters of `model` with those stored at `path`.
///
/// # Returns
/// The metadata the checkpoint was saved with, or an error if any parameter block is missing
/// or shaped differently.
pub fn load<M: Model + ?Sized>(model: &mut M, path: &Path) -> Result<CheckpointMeta> {
    let bytes = fs::read(path).at(path)?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|e| checkpoint_err(path, e))?;

    let mut params = Vec::with_capacity(model.size());
    for shape in model.param_shapes() {
        let view = tensors
            .tensor(&shape.name)
            .map_err(|e| checkpoint_err(path, format!("{}: {e}", shape.name)))?;

        if view.dtype() != Dtype::F32 || view.shape() != shape.shape.as_slice() {
            return Err(checkpoint_err(
                path,
                format!(
                    "{} is {:?} {:?}, expected F32 {:?}",
                    shape.name,
                    view.dtype(),
                    view.shape(),
                    shape.shape
                ),
            ));
        }

        params.extend(
            view.data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
    }

    model.load_params(&params)?;

    let (_, header) = SafeTensors::read_metadata(&bytes).map_err(|e| checkpoint_err(path, e))?;
    let metadata = header.metadata().clone().unwrap_or_default();
    let field = |key: &str| {
        metadata
            .get(key)
            .ok_or_else(|| checkpoint_err(path, format!("missing {key} metadata")))
    };

    let meta = CheckpointMeta {
        epoch: field("epoch")?
            .parse()
            .map_err(|e| checkpoint_err(path, format!("epoch: {e}")))?,
        val_loss: field("val_loss")?
            .parse()
            .map_err(|e| checkpoint_err(path, format!("val_loss: {e}")))?,
        goal: field("goal")?.parse()?,
    };

    info!(
        "loaded checkpoint of epoch {} from {}",
        meta.epoch,
        path.display()
    );
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::GraphNet;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn net(seed: u64) -> GraphNet {
        GraphNet::node_classifier(3, 4, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn meta() -> CheckpointMeta {
        CheckpointMeta {
            epoch: 7,
            val_loss: 0.4375,
            goal: Goal::PickingSuccess,
        }
    }

    #[test]
    fn reload_restores_every_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_models/model_x");
        let saved = net(1);

        save(&saved, &path, meta()).unwrap();
        let mut loaded = net(2);
        assert_ne!(loaded.params(), saved.params());

        let read = load(&mut loaded, &path).unwrap();
        assert_eq!(loaded.params(), saved.params());
        assert_eq!(read, meta());
    }

    #[test]
    fn file_holds_named_tensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        save(&net(1), &path, meta()).unwrap();

        let bytes = fs::read(&path).unwrap();
        let tensors = SafeTensors::deserialize(&bytes).unwrap();
        assert_eq!(tensors.tensor("layers.0.weight").unwrap().shape(), &[3, 4]);
        assert_eq!(tensors.tensor("layers.2.bias").unwrap().shape(), &[1]);
        assert!(!dir.path().join("model.tmp").exists());
    }

    #[test]
    fn overwriting_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        save(&net(1), &path, meta()).unwrap();
        save(&net(3), &path, CheckpointMeta { epoch: 9, ..meta() }).unwrap();

        let mut loaded = net(2);
        let read = load(&mut loaded, &path).unwrap();
        assert_eq!(loaded.params(), net(3).params());
        assert_eq!(read.epoch, 9);
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        save(&net(1), &path, meta()).unwrap();

        let mut wider = GraphNet::node_classifier(3, 5, &mut StdRng::seed_from_u64(0)).unwrap();
        let err = load(&mut wider, &path).unwrap_err();
        assert!(matches!(err, TrainerErr::Checkpoint { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&mut net(1), &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, TrainerErr::Io { .. }));
    }
}
