use std::fmt;

use log::{info, warn};
use machine_learning::arch::{Model, loss::LossFn};
use machine_learning::optimization::Optimizer;

use crate::{
    best::{BestState, EarlyStopping, EpochScores},
    checkpoint::{self, CheckpointMeta},
    configs::{OutputLayout, TaskConfig},
    error::{Result, TrainerErr},
    history::{EpochPoint, TrainingHistory},
    metrics::{MetricsAggregator, MetricsReport},
    phase::Phase,
    plot,
    run_log::RunLog,
    runner::{EpochResult, TrainingSession},
};

const LOSS_TAG: &str = "Training vs. Validation Loss";

/// The stages a run goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    StoppedEarly,
    Exhausted,
    Testing,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Running => "RUNNING",
            RunState::StoppedEarly => "STOPPED_EARLY",
            RunState::Exhausted => "EXHAUSTED",
            RunState::Testing => "TESTING",
            RunState::Done => "DONE",
        };

        f.write_str(s)
    }
}

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// How training ended, either `StoppedEarly` or `Exhausted`.
    pub stop_reason: RunState,
    pub epochs_run: usize,
    /// The first epoch that was skipped because of early stopping.
    pub first_skipped_epoch: Option<usize>,
    pub best: BestState,
    pub history: TrainingHistory,
    pub test: EpochResult,
    pub test_report: MetricsReport,
}

/// Drives the epochs of a run: trains, validates, keeps the best checkpoint, stops early and
/// finally tests the best parameters.
pub struct Controller<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    session: TrainingSession<M, O, L>,
    config: TaskConfig,
    layout: OutputLayout,
    run_log: RunLog,
    aggregator: MetricsAggregator,

    state: RunState,
    best: BestState,
    stopping: EarlyStopping,
    history: TrainingHistory,
}

impl<M, O, L> Controller<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Creates a new `Controller`, opening the run log of `layout`.
    pub fn new(
        session: TrainingSession<M, O, L>,
        config: TaskConfig,
        layout: OutputLayout,
    ) -> Result<Self> {
        let run_log = RunLog::create(&layout.run_log_dir())?;

        Ok(Self {
            session,
            stopping: EarlyStopping::new(config.patience),
            config,
            layout,
            run_log,
            aggregator: MetricsAggregator,
            state: RunState::Running,
            best: BestState::new(),
            history: TrainingHistory::new(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the whole state machine, from the first epoch to the final test pass.
    pub fn run(mut self) -> Result<RunSummary> {
        let max_epochs = self.config.max_epochs;
        let mut epochs_run = 0;
        let mut first_skipped_epoch = None;

        for epoch in 1..=max_epochs {
            self.run_epoch(epoch)?;
            epochs_run = epoch;

            if self.stopping.should_stop() {
                self.state = RunState::StoppedEarly;
                first_skipped_epoch = (epoch < max_epochs).then_some(epoch + 1);
                info!(
                    "early stopping after epoch {epoch}: {} epochs without improvement",
                    self.stopping.counter()
                );
                break;
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Exhausted;
            info!("epoch budget of {max_epochs} exhausted");
        }
        let stop_reason = self.state;

        self.state = RunState::Testing;
        let (test, test_report) = self.test_best()?;

        let final_epoch = first_skipped_epoch.unwrap_or(max_epochs + 1);
        let annotations = self.best.annotations(final_epoch);
        plot::draw_curve(&self.history, Some(&annotations), &self.layout.curve_path())?;
        self.state = RunState::Done;

        info!(
            "best train loss {}, best val loss {}, best train accuracy {}, best val accuracy {}",
            self.best.train_loss(),
            self.best.val_loss(),
            self.best.train_acc(),
            self.best.val_acc()
        );

        Ok(RunSummary {
            stop_reason,
            epochs_run,
            first_skipped_epoch,
            best: self.best,
            history: self.history,
            test,
            test_report,
        })
    }

    fn run_epoch(&mut self, epoch: usize) -> Result<()> {
        let mut train = self.session.train_one_epoch()?;
        let mut val = self.session.validate()?;

        info!(
            "epoch {epoch}: train loss {:.4}, val loss {:.4}, train accuracy {:.4}, val accuracy {:.4}",
            train.loss, val.loss, train.accuracy, val.accuracy
        );
        if !val.loss.is_finite() {
            warn!("epoch {epoch}: validation loss is {}", val.loss);
        }

        self.session.step_scheduler(val.loss);

        let scores = EpochScores {
            train_loss: train.loss,
            train_acc: train.accuracy,
            val_loss: val.loss,
            val_acc: val.accuracy,
        };
        let path = self.layout.checkpoint_path();
        let meta = CheckpointMeta {
            epoch,
            val_loss: val.loss,
            goal: self.config.goal,
        };
        let session = &self.session;
        let improved = self.best.update(scores, || {
            checkpoint::save(session.model(), &path, meta)?;
            Ok(path.clone())
        })?;
        self.stopping.observe(improved);

        train.is_best = improved;
        val.is_best = improved;
        for result in [&train, &val] {
            let export = result
                .is_best
                .then(|| self.layout.confusion_path(result.phase));
            self.aggregator.evaluate(
                result.phase,
                &result.preds,
                &result.truths,
                export.as_deref(),
            )?;
        }

        self.history.push(EpochPoint {
            epoch,
            train_loss: train.loss,
            val_loss: val.loss,
            train_acc: train.accuracy,
            val_acc: val.accuracy,
        });
        plot::draw_curve(&self.history, None, &self.layout.curve_path())?;

        self.run_log.add_scalars(
            LOSS_TAG,
            &[("Training", train.loss), ("Validation", val.loss)],
            epoch + 1,
        )?;
        self.run_log.flush()
    }

    fn test_best(&mut self) -> Result<(EpochResult, MetricsReport)> {
        let path = self.best.checkpoint().ok_or(TrainerErr::NoCheckpoint)?;
        checkpoint::load(self.session.model_mut(), path)?;

        let mut test = self.session.test()?;
        test.is_best = true;

        let export = self.layout.confusion_path(Phase::Test);
        let report = self.aggregator.evaluate(
            Phase::Test,
            &test.preds,
            &test.truths,
            Some(&export),
        )?;

        info!(
            "test loss {:.4}, test accuracy {:.4}",
            test.loss, test.accuracy
        );
        Ok((test, report))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use machine_learning::{
        MlErr,
        arch::{ParamShape, loss::Bce},
        graph::GraphBatch,
        optimization::{Adam, PlateauConfig, ReduceLrOnPlateau},
    };
    use ndarray::{Array1, ArrayView1, array};

    use super::*;
    use crate::{
        accuracy::NodeAccuracy,
        data::{DataLoader, GraphDataset, GraphSample},
        runner::Loaders,
        tracker::NullTracker,
    };

    /// Predicts the same value for every node, so the loss never moves.
    struct ConstantModel {
        params: Vec<f32>,
        grad: Vec<f32>,
    }

    impl Model for ConstantModel {
        fn size(&self) -> usize {
            1
        }

        fn forward(&mut self, batch: &GraphBatch) -> machine_learning::Result<Array1<f32>> {
            Ok(Array1::from_elem(batch.num_nodes(), 0.3))
        }

        fn backward(&mut self, _d: ArrayView1<f32>) -> machine_learning::Result<()> {
            Ok(())
        }

        fn zero_grad(&mut self) {}

        fn params(&self) -> &[f32] {
            &self.params
        }

        fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
            (&mut self.params, &self.grad)
        }

        fn param_shapes(&self) -> Vec<ParamShape> {
            vec![ParamShape {
                name: "constant".into(),
                shape: vec![1],
            }]
        }

        fn load_params(&mut self, params: &[f32]) -> machine_learning::Result<()> {
            if params.len() != 1 {
                return Err(MlErr::SizeMismatch {
                    what: "constant",
                    got: params.len(),
                    expected: 1,
                });
            }
            self.params.copy_from_slice(params);
            Ok(())
        }
    }

    fn controller(
        root: &std::path::Path,
        max_epochs: usize,
    ) -> Controller<ConstantModel, Adam, Bce> {
        let samples = (0..4)
            .map(|i| {
                GraphSample::new(array![[i as f32]], vec![], vec![(i % 2) as f32], None).unwrap()
            })
            .collect();
        let data = GraphDataset::new(samples).unwrap();
        let loaders = Loaders {
            train: DataLoader::new(data.clone(), 2).unwrap(),
            val: DataLoader::whole(data.clone()),
            test: DataLoader::whole(data),
        };

        let session = TrainingSession::new(
            ConstantModel {
                params: vec![0.],
                grad: vec![0.],
            },
            Adam::new(1, 1e-3, 0.),
            ReduceLrOnPlateau::new(PlateauConfig::default()),
            Bce,
            Box::new(NodeAccuracy),
            Box::new(NullTracker),
            loaders,
        );

        let config = TaskConfig {
            max_epochs,
            ..TaskConfig::picking_success()
        };
        let started_at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let layout = OutputLayout::new(root, &config, started_at);

        Controller::new(session, config, layout).unwrap()
    }

    #[test]
    fn stops_at_the_eleventh_epoch_without_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path(), 300);
        assert_eq!(controller.state(), RunState::Running);

        let summary = controller.run().unwrap();

        // epoch 1 improves on the sentinel, epochs 2..=12 don't
        assert_eq!(summary.stop_reason, RunState::StoppedEarly);
        assert_eq!(summary.epochs_run, 12);
        assert_eq!(summary.first_skipped_epoch, Some(13));
        assert_eq!(summary.history.len(), 12);
        assert!(summary.test.is_best);
    }

    #[test]
    fn short_budgets_are_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let summary = controller(dir.path(), 3).run().unwrap();

        assert_eq!(summary.stop_reason, RunState::Exhausted);
        assert_eq!(summary.epochs_run, 3);
        assert_eq!(summary.first_skipped_epoch, None);
    }

    #[test]
    fn run_leaves_every_artifact_behind() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let summary = controller(root, 2).run().unwrap();

        let plots = root.join("plots/plots_picking_success");
        assert!(plots.join("train_32_16_L20.0001_42.svg").exists());
        assert!(plots.join("CMtrain_32_16_L20.0001_42.svg").exists());
        assert!(plots.join("CMval_32_16_L20.0001_42.svg").exists());
        assert!(plots.join("CMtest_32_16_L20.0001_42.svg").exists());

        let models = root.join("best_models/best_models_picking_success");
        let checkpoint = models.join("model_20240102_030405");
        assert_eq!(summary.best.checkpoint(), Some(checkpoint.as_path()));
        assert!(checkpoint.exists());

        let scalars = root.join("runs/fashion_trainer_20240102_030405/scalars.jsonl");
        let content = std::fs::read_to_string(scalars).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().contains("\"step\":2"));
    }

    #[test]
    fn confusion_images_follow_improving_epochs_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path(), 300);
        let cm_train = controller.layout.confusion_path(Phase::Train);
        let cm_val = controller.layout.confusion_path(Phase::Val);
        let curve = controller.layout.curve_path();

        controller.run_epoch(1).unwrap();
        assert!(cm_train.exists());
        assert!(cm_val.exists());
        let first_curve = std::fs::read_to_string(&curve).unwrap();

        std::fs::remove_file(&cm_train).unwrap();
        std::fs::remove_file(&cm_val).unwrap();

        // same predictions, same validation loss: no improvement
        controller.run_epoch(2).unwrap();
        assert!(!cm_train.exists());
        assert!(!cm_val.exists());
        assert_eq!(controller.stopping.counter(), 1);

        let second_curve = std::fs::read_to_string(&curve).unwrap();
        assert_ne!(first_curve, second_curve);
        assert_eq!(controller.history.len(), 2);
    }

    #[test]
    fn run_state_names() {
        assert_eq!(RunState::StoppedEarly.to_string(), "STOPPED_EARLY");
        assert_eq!(RunState::Done.to_string(), "DONE");
    }
}
