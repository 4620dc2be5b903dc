use std::{env, path::PathBuf};

use anyhow::Context;
use chrono::Local;
use log::info;

use gnn_trainer::{Controller, Goal, OutputLayout, SessionBuilder, TaskConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let goal: Goal = match env::var("GOAL") {
        Ok(goal) => goal.parse()?,
        Err(_) => Goal::default(),
    };

    let config = match env::var("TRAINER_CONFIG") {
        Ok(path) => TaskConfig::from_json_file(goal, &PathBuf::from(path))?,
        Err(_) => {
            let config = TaskConfig::for_goal(goal);
            config.validate()?;
            config
        }
    };
    info!("training {} with {config:?}", config.goal);

    let root = env::current_dir().context("cannot resolve the working directory")?;
    let layout = OutputLayout::new(root, &config, Local::now());
    info!(
        "run {} writes under {}",
        layout.timestamp(),
        layout.root().display()
    );

    let session = SessionBuilder::new().build(&config, &layout)?;
    let summary = Controller::new(session, config, layout)?.run()?;

    info!(
        "{} after {} epochs, test loss {:.4}, test accuracy {:.4}",
        summary.stop_reason, summary.epochs_run, summary.test.loss, summary.test.accuracy
    );
    Ok(())
}
