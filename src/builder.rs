use log::info;
use machine_learning::{
    arch::{GraphNet, Model, loss::Bce},
    optimization::{Adam, ReduceLrOnPlateau},
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    accuracy::{Accuracy, NodeAccuracy, TopRankAccuracy},
    configs::{Goal, OutputLayout, TaskConfig},
    data::{DataLoader, GraphDataset},
    error::{Result, TrainerErr},
    phase::Phase,
    runner::{Loaders, TrainingSession},
    tracker::{NullTracker, SchedulingRankTracker, TaskMetricsCollector},
};

/// The session every task trains with.
pub type GraphSession = TrainingSession<GraphNet, Adam, Bce>;

/// Builds `TrainingSession`s given a task configuration.
#[derive(Debug, Default)]
pub struct SessionBuilder;

impl SessionBuilder {
    /// Creates a new `SessionBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Loads the three splits of `layout` and builds a session around them.
    ///
    /// # Arguments
    /// * `config` - The validated configuration of the task.
    /// * `layout` - Where the dataset splits live.
    pub fn build(&self, config: &TaskConfig, layout: &OutputLayout) -> Result<GraphSession> {
        let train = GraphDataset::load(&layout.split_dir(Phase::Train))?;
        let val = GraphDataset::load(&layout.split_dir(Phase::Val))?;
        let test = GraphDataset::load(&layout.split_dir(Phase::Test))?;

        self.build_with(config, train, val, test)
    }

    /// Builds a session over datasets that are already in memory.
    pub fn build_with(
        &self,
        config: &TaskConfig,
        train: GraphDataset,
        val: GraphDataset,
        test: GraphDataset,
    ) -> Result<GraphSession> {
        config.validate()?;
        self.check_splits(config.goal, [&train, &val, &test])?;

        let num_features = train.num_features();
        let loaders = Loaders {
            train: DataLoader::new(train, config.batch_size)?.shuffled(config.seed_num),
            val: DataLoader::whole(val),
            test: DataLoader::whole(test),
        };

        let mut rng = StdRng::seed_from_u64(config.torch_seed);
        let model = GraphNet::node_classifier(num_features, config.hidden_layers, &mut rng)?;
        let optimizer = Adam::new(model.size(), config.learning_rate, config.weight_decay);
        let scheduler = ReduceLrOnPlateau::new(config.scheduler.into());
        let (accuracy, tracker) = self.resolve_task(config.goal);

        info!(
            "built {} session: {num_features} features, {} hidden units, {} parameters",
            config.goal,
            config.hidden_layers,
            model.size()
        );

        Ok(TrainingSession::new(
            model,
            optimizer,
            scheduler,
            Bce::new(),
            accuracy,
            tracker,
            loaders,
        ))
    }

    fn resolve_task(&self, goal: Goal) -> (Box<dyn Accuracy>, Box<dyn TaskMetricsCollector>) {
        match goal {
            Goal::Scheduling => (
                Box::new(TopRankAccuracy),
                Box::new(SchedulingRankTracker::new()),
            ),
            Goal::PickingSuccess => (Box::new(NodeAccuracy), Box::new(NullTracker)),
        }
    }

    fn check_splits(&self, goal: Goal, splits: [&GraphDataset; 3]) -> Result<()> {
        let [train, ..] = splits;
        for split in splits {
            if split.num_features() != train.num_features() {
                return Err(TrainerErr::ShapeMismatch {
                    what: "node features across splits",
                    got: split.num_features(),
                    expected: train.num_features(),
                });
            }
            if goal.has_ranks() && !split.has_ranks() {
                return Err(TrainerErr::MissingRanks);
            }
        }

        Ok(())
    }
}
