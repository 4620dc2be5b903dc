use log::{debug, info};
use machine_learning::{
    arch::{Model, loss::LossFn},
    optimization::{Optimizer, ReduceLrOnPlateau},
};

use crate::{
    accuracy::Accuracy,
    data::DataLoader,
    error::{Result, TrainerErr},
    metrics::binarize,
    phase::Phase,
    tracker::TaskMetricsCollector,
};

/// The running sums of one pass over a loader.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochStats {
    loss_sum: f32,
    correct_sum: f32,
    nodes: usize,
    steps: usize,
}

impl EpochStats {
    /// Adds the results of a single batch.
    pub fn record(&mut self, loss: f32, correct: f32, nodes: usize) {
        self.loss_sum += loss;
        self.correct_sum += correct;
        self.nodes += nodes;
        self.steps += 1;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Returns the loss averaged over the steps and the accuracy averaged over the nodes.
    pub fn finish(&self, phase: Phase) -> Result<(f32, f32)> {
        if self.steps == 0 || self.nodes == 0 {
            return Err(TrainerErr::EmptyLoader(phase.as_str()));
        }

        Ok((
            self.loss_sum / self.steps as f32,
            self.correct_sum / self.nodes as f32,
        ))
    }
}

/// What a pass over a loader produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochResult {
    pub phase: Phase,
    pub loss: f32,
    pub accuracy: f32,
    /// The binarized predictions of every node of the pass, in loader order.
    pub preds: Vec<u8>,
    /// The binarized targets, aligned with `preds`.
    pub truths: Vec<u8>,
    /// Set by the controller when this result improved the best validation loss.
    pub is_best: bool,
}

/// The three splits of a run.
#[derive(Debug, Clone)]
pub struct Loaders {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
}

/// Owns everything the passes over the data share: the model, how it's optimized and scored,
/// and the loaders.
pub struct TrainingSession<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    model: M,
    optimizer: O,
    scheduler: ReduceLrOnPlateau,
    loss_fn: L,
    accuracy: Box<dyn Accuracy>,
    tracker: Box<dyn TaskMetricsCollector>,
    loaders: Loaders,
}

impl<M, O, L> TrainingSession<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Creates a new `TrainingSession`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - Updates the model parameters after every training batch.
    /// * `scheduler` - Lowers the optimizer's learning rate once the validation loss plateaus.
    /// * `loss_fn` - Measures the difference between the predictions and the targets.
    /// * `accuracy` - Counts the correct nodes of a batch.
    /// * `tracker` - Gathers the task specific statistics of every pass.
    /// * `loaders` - The train, validation and test splits.
    pub fn new(
        model: M,
        optimizer: O,
        scheduler: ReduceLrOnPlateau,
        loss_fn: L,
        accuracy: Box<dyn Accuracy>,
        tracker: Box<dyn TaskMetricsCollector>,
        loaders: Loaders,
    ) -> Self {
        Self {
            model,
            optimizer,
            scheduler,
            loss_fn,
            accuracy,
            tracker,
            loaders,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn learning_rate(&self) -> f32 {
        self.optimizer.learning_rate()
    }

    /// Runs one epoch over the training split, updating the model after every batch.
    pub fn train_one_epoch(&mut self) -> Result<EpochResult> {
        self.pass(Phase::Train)
    }

    /// Runs one epoch over the validation split without touching the model.
    pub fn validate(&mut self) -> Result<EpochResult> {
        self.pass(Phase::Val)
    }

    /// Runs a single pass over the test split without touching the model.
    pub fn test(&mut self) -> Result<EpochResult> {
        self.pass(Phase::Test)
    }

    /// Feeds the validation loss to the plateau scheduler.
    ///
    /// # Returns
    /// The new learning rate if it was lowered.
    pub fn step_scheduler(&mut self, val_loss: f32) -> Option<f32> {
        let new_lr = self.scheduler.step(val_loss, &mut self.optimizer);
        if let Some(lr) = new_lr {
            info!("reducing learning rate to {lr:e}");
        }

        new_lr
    }

    fn pass(&mut self, phase: Phase) -> Result<EpochResult> {
        let Self {
            model,
            optimizer,
            loss_fn,
            accuracy,
            tracker,
            loaders,
            ..
        } = self;

        let loader = match phase {
            Phase::Train => &mut loaders.train,
            Phase::Val => &mut loaders.val,
            Phase::Test => &mut loaders.test,
        };
        let update = phase == Phase::Train;

        tracker.reset();
        let mut stats = EpochStats::default();
        let mut preds = Vec::with_capacity(loader.dataset().len());
        let mut truths = Vec::with_capacity(loader.dataset().len());

        for (i, batch) in loader.batches()?.iter().enumerate() {
            if update {
                model.zero_grad();
            }

            let y_pred = model.forward(&batch.graph)?;
            let loss = loss_fn.checked_loss(y_pred.view(), batch.y.view())?;

            if update {
                let d = loss_fn.loss_prime(y_pred.view(), batch.y.view());
                model.backward(d.view())?;
                let (params, grad) = model.params_and_grad();
                optimizer.update_params(params, grad)?;
            }

            let assignment = batch.graph.assignment();
            let correct = accuracy.correct(y_pred.view(), batch.y.view(), assignment)?;
            tracker.observe(y_pred.view(), batch)?;
            stats.record(loss, correct, batch.num_nodes());
            debug!(
                "{phase} batch {i}: loss {loss:.4}, {correct} of {} nodes correct",
                batch.num_nodes()
            );

            preds.extend(binarize(&y_pred.to_vec()));
            truths.extend(binarize(&batch.y.to_vec()));
        }

        let (loss, accuracy) = stats.finish(phase)?;
        tracker.report(phase);

        Ok(EpochResult {
            phase,
            loss,
            accuracy,
            preds,
            truths,
            is_best: false,
        })
    }
}
