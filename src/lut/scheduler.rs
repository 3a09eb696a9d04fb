//! Planning and running the simulations that fill the LUT.
//!
//! Planning is a pure function of the grid and what's on disk. Execution fans
//! every task out to a bounded pool of worker threads, each of which runs one
//! simulator process to completion, and joins the whole batch before
//! returning. Tasks write disjoint files, so they need no coordination, and a
//! failed process only means its entry stays absent.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::mpsc::{self, RecvTimeoutError},
    time::Duration,
};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::{
    grid::{GridPoint, GridSpec},
    naming::CacheKeyNamer,
    store::{CacheStatus, LutStore},
};
use crate::config::SimulatorConfig;
use crate::error::{LutError, Result};

/// Everything the simulator needs to produce one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildTask {
    key: String,
    point: GridPoint,
    parameters: Vec<(String, f64)>,
    deck_path: PathBuf,
    output_prefix: PathBuf,
    working_dir: PathBuf,
}

/// What gets written to a task's input deck.
#[derive(Debug, Serialize)]
struct InputDeck<'a> {
    key: &'a str,
    output_prefix: &'a Path,
    parameters: Vec<DeckParameter<'a>>,
}

#[derive(Debug, Serialize)]
struct DeckParameter<'a> {
    name: &'a str,
    value: f64,
}

impl BuildTask {
    /// Cache key of the entry this task produces.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Grid point being simulated.
    pub fn point(&self) -> &GridPoint {
        &self.point
    }

    /// `(axis name, coordinate)` pairs for the point.
    pub fn parameters(&self) -> &[(String, f64)] {
        &self.parameters
    }

    /// Input deck handed to the simulator.
    pub fn deck_path(&self) -> &Path {
        &self.deck_path
    }

    /// Prefix of the files the simulator should write.
    pub fn output_prefix(&self) -> &Path {
        &self.output_prefix
    }

    /// Directory the simulator runs in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Write the input deck, creating its directory if needed.
    pub fn write_deck(&self) -> Result<()> {
        let deck = InputDeck {
            key: &self.key,
            output_prefix: &self.output_prefix,
            parameters: self
                .parameters
                .iter()
                .map(|(name, value)| DeckParameter {
                    name,
                    value: *value,
                })
                .collect(),
        };

        if let Some(dir) = self.deck_path.parent() {
            fs::create_dir_all(dir).map_err(|e| LutError::io(dir, e))?;
        }
        let text = serde_json::to_string_pretty(&deck).map_err(|e| LutError::Deck {
            path: self.deck_path.clone(),
            source: e,
        })?;
        fs::write(&self.deck_path, text).map_err(|e| LutError::io(&self.deck_path, e))
    }

    /// The process invocation for this task: `program args... <deck>`, run in
    /// the task's working directory.
    pub fn command(&self, simulator: &SimulatorConfig) -> Command {
        let mut cmd = Command::new(&simulator.program);
        cmd.args(&simulator.args)
            .arg(&self.deck_path)
            .current_dir(&self.working_dir);
        cmd
    }
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The process exited cleanly and the entry is present
    Succeeded,
    /// The process exited with an error (`None` if killed by a signal)
    Failed {
        /// Exit code
        code: Option<i32>,
    },
    /// The process exited cleanly but didn't write a complete bundle
    NoOutput,
    /// The process couldn't be started
    SpawnFailed(String),
}

/// Outcome of one [`BuildScheduler::execute`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Number of tasks handed in
    pub planned: usize,
    /// Keys whose entries were built
    pub succeeded: Vec<String>,
    /// Keys whose entries are still missing after the batch
    pub failed: Vec<String>,
    /// Tasks not run because automatic rebuilding is off
    pub skipped: usize,
}

/// Result of [`BuildScheduler::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildStatus {
    /// Decks were written but nothing was simulated (configure-and-exit)
    Stopped {
        /// Tasks whose decks are ready for manual execution
        tasks: Vec<BuildTask>,
    },
    /// Missing entries were (or would have been) simulated
    Complete(BuildReport),
}

/// Decides which entries need simulating and runs them.
#[derive(Debug, Clone)]
pub struct BuildScheduler {
    simulator: Option<SimulatorConfig>,
    configure_and_exit: bool,
    auto_rebuild: bool,
    max_workers: Option<usize>,
    progress_interval: Duration,
}

impl Default for BuildScheduler {
    fn default() -> Self {
        Self {
            simulator: None,
            configure_and_exit: false,
            auto_rebuild: true,
            max_workers: None,
            progress_interval: Duration::from_secs(5),
        }
    }
}

impl BuildScheduler {
    /// A scheduler that launches `simulator` for missing entries.
    pub fn new(simulator: Option<SimulatorConfig>) -> Self {
        Self {
            simulator,
            ..Self::default()
        }
    }

    /// Stop after writing decks instead of simulating.
    pub fn configure_and_exit(mut self, enabled: bool) -> Self {
        self.configure_and_exit = enabled;
        self
    }

    /// Whether missing entries are simulated at all.
    pub fn auto_rebuild(mut self, enabled: bool) -> Self {
        self.auto_rebuild = enabled;
        self
    }

    /// Cap the number of concurrent processes. `None` (or zero) uses one per
    /// core.
    pub fn max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// How often progress is logged while a batch runs.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// One task per grid point whose entry needs building.
    ///
    /// A present entry is trusted and skipped unless `rebuild` is set. Absent
    /// and stale entries always get a task. Tasks come out in grid order.
    pub fn plan(
        &self,
        grid: &GridSpec,
        namer: &CacheKeyNamer,
        store: &LutStore,
        rebuild: bool,
    ) -> Vec<BuildTask> {
        grid.points()
            .filter_map(|point| {
                let key = namer.key_for(point.coords());
                match store.lookup(&key) {
                    CacheStatus::Present if !rebuild => {
                        debug!("{key} already built");
                        return None;
                    }
                    CacheStatus::Stale => debug!("{key} is incomplete, rebuilding"),
                    _ => {}
                }

                let parameters = grid
                    .axis_names()
                    .zip(point.coords())
                    .map(|(name, &x)| (name.to_owned(), x))
                    .collect();
                Some(BuildTask {
                    deck_path: store.deck_path(&key),
                    output_prefix: store.write_path_for(&key),
                    working_dir: store.root().to_path_buf(),
                    key,
                    point,
                    parameters,
                })
            })
            .collect()
    }

    /// Make the store consistent with the grid.
    ///
    /// Plans, writes the input decks, and then either stops (configure and
    /// exit) or executes the tasks.
    pub fn build(
        &self,
        grid: &GridSpec,
        namer: &CacheKeyNamer,
        store: &LutStore,
        rebuild: bool,
    ) -> Result<BuildStatus> {
        let tasks = self.plan(grid, namer, store, rebuild);
        info!(
            "{} of {} LUT grid points need simulating",
            tasks.len(),
            grid.num_points()
        );

        for task in &tasks {
            task.write_deck()?;
        }

        if self.configure_and_exit {
            info!("configure_and_exit is set, stopping before simulation");
            return Ok(BuildStatus::Stopped { tasks });
        }

        self.execute(store, &tasks).map(BuildStatus::Complete)
    }

    /// Run `tasks` and wait for all of them.
    ///
    /// A failing task never affects the others; it is logged and listed in
    /// the report, and its entry simply remains absent. Successful entries get
    /// their by-products cleaned up once the batch is done; a cleanup that
    /// fails is only logged.
    pub fn execute(&self, store: &LutStore, tasks: &[BuildTask]) -> Result<BuildReport> {
        let num_tasks = tasks.len();
        let mut report = BuildReport {
            planned: num_tasks,
            ..BuildReport::default()
        };

        if num_tasks == 0 {
            return Ok(report);
        }
        if !self.auto_rebuild {
            info!("auto_rebuild is off, leaving {num_tasks} LUT entries unbuilt");
            report.skipped = num_tasks;
            return Ok(report);
        }

        let simulator = self
            .simulator
            .as_ref()
            .ok_or_else(|| LutError::config("LUT entries are missing but no simulator is configured"))?;
        let context = BuildContext::acquire(store, simulator)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers.unwrap_or(0))
            .build()
            .map_err(|e| LutError::ThreadPool(e.to_string()))?;

        info!(
            "rebuilding {num_tasks} LUT entries with {} workers",
            pool.current_num_threads()
        );

        let mut outcomes = Vec::with_capacity(num_tasks);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        pool.in_place_scope(|s| {
            let outcomes = &mut outcomes;
            let context = &context;
            s.spawn(move |_| {
                tasks
                    .par_iter()
                    .map(|task| context.run(task))
                    .inspect(|_| {
                        let _ = done_tx.send(());
                    })
                    .collect_into_vec(outcomes);
            });

            // The work happens in the pool; back here, report progress until
            // the workers hang up
            let mut num_completed = 0;
            loop {
                match done_rx.recv_timeout(self.progress_interval) {
                    Ok(()) => num_completed += 1,
                    Err(RecvTimeoutError::Timeout) => {
                        let progress = num_completed as f32 / num_tasks as f32 * 100.;
                        info!("Completed {num_completed}/{num_tasks} simulations ({progress:0.2}%)");
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        for (task, status) in tasks.iter().zip(outcomes) {
            match status {
                TaskStatus::Succeeded => {
                    // Leftover by-products don't invalidate the entry
                    if let Err(e) = store.cleanup(task.key()) {
                        warn!("cleaning up after {}: {e}", task.key());
                    }
                    report.succeeded.push(task.key.clone());
                }
                status => {
                    warn!("simulation for {} failed: {status:?}", task.key());
                    report.failed.push(task.key.clone());
                }
            }
        }

        info!(
            "LUT rebuild finished: {} built, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Working directory and simulator shared by every task in one batch.
///
/// Each process gets the directory explicitly, so the caller's own working
/// directory is never touched and there is nothing to restore afterwards.
#[derive(Debug)]
struct BuildContext<'a> {
    working_dir: PathBuf,
    simulator: &'a SimulatorConfig,
    store: &'a LutStore,
}

impl<'a> BuildContext<'a> {
    fn acquire(store: &'a LutStore, simulator: &'a SimulatorConfig) -> Result<Self> {
        let working_dir = store.root().to_path_buf();
        if !working_dir.is_dir() {
            return Err(LutError::io(
                &working_dir,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        Ok(Self {
            working_dir,
            simulator,
            store,
        })
    }

    fn run(&self, task: &BuildTask) -> TaskStatus {
        let mut cmd = task.command(self.simulator);
        cmd.current_dir(&self.working_dir);
        debug!("running {cmd:?}");

        match cmd.output() {
            Err(e) => TaskStatus::SpawnFailed(e.to_string()),
            Ok(Output { status, stderr, .. }) if !status.success() => {
                debug!(
                    "{} stderr: {}",
                    task.key(),
                    String::from_utf8_lossy(&stderr).trim_end()
                );
                TaskStatus::Failed {
                    code: status.code(),
                }
            }
            Ok(_) if !self.store.exists(task.key()) => TaskStatus::NoOutput,
            Ok(_) => TaskStatus::Succeeded,
        }
    }
}
