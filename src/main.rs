//! Deduction-game analyzer binary crate.

use std::io::{self, BufRead, Write};

use clap::Parser;
use fs_err as fs;

use deduction::experiment::ExperimentChoice;
use deduction::options::{CliOptions, Mode, TraceLevel};
use deduction::strategy::Chooser;
use deduction::{self, game::Game};

fn main() {
    if let Err(error) = run() {
        let _ = write!(io::stderr(), "Error: {error}");
        std::process::exit(1);
    }
}

/// Initializes the logging framework with the given trace level.
///
/// # Errors
///
/// Returns an error if the logging framework has already been initialized.
fn initialize_logging(level: TraceLevel) -> io::Result<()> {
    env_logger::builder()
        .filter(None, level.into())
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}

/// Parses options, reads the input file, dispatches to the requested
/// mode and writes the result to stdout.
fn run() -> io::Result<()> {
    let options = CliOptions::parse();
    initialize_logging(options.trace_level)?;

    let src = fs::read_to_string(&options.path)?;
    let game = deduction::load_game(&src).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    match options.mode() {
        Mode::Info => {
            let report = deduction::info_report(&game);
            writeln!(io::stdout(), "{report}")?;
        }
        Mode::Simulation => {
            let mut chooser = StdinChooser;
            let log = deduction::run_simulation(
                &game,
                options.solver_backend,
                options.codebreaker,
                options.codemaker,
                options.effective_seed(),
                &mut chooser,
            );
            for (i, step) in log.steps.iter().enumerate() {
                writeln!(io::stdout(), "{}: {} -> {}", i + 1, step.description, step.outcome)?;
            }
            writeln!(io::stdout(), "solved in {} experiments", log.steps.len())?;
        }
        Mode::Analyze => {
            let report = deduction::run_analysis(&game, options.solver_backend, options.is_worst_case());
            writeln!(io::stdout(), "optimal value: {}", report.value)?;
            writeln!(io::stdout(), "solved: {}", report.solved)?;
            writeln!(io::stdout(), "{}", report.coloring_stats)?;
            writeln!(io::stdout(), "{}", report.param_stats)?;
        }
    }
    Ok(())
}

/// A [`Chooser`] that prompts on stdout and reads a choice index from
/// stdin, for `--codebreaker interactive`/`--codemaker interactive`.
struct StdinChooser;

impl StdinChooser {
    fn read_index(&self, max: usize) -> usize {
        loop {
            let _ = write!(io::stdout(), "> ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line).is_err() {
                return 0;
            }
            if let Ok(i) = line.trim().parse::<usize>() {
                if i < max {
                    return i;
                }
            }
            println!("enter a number between 0 and {}", max - 1);
        }
    }
}

impl Chooser for StdinChooser {
    fn choose_experiment(&mut self, choices: &[ExperimentChoice<'_>], game: &Game) -> usize {
        for (i, choice) in choices.iter().enumerate() {
            println!("{i}: {}", choice.describe(game));
        }
        self.read_index(choices.len())
    }

    fn choose_outcome(&mut self, choice: &ExperimentChoice<'_>) -> usize {
        let satisfiable: Vec<usize> = choice.is_sat.iter().enumerate().filter(|&(_, &sat)| sat).map(|(i, _)| i).collect();
        for &i in &satisfiable {
            println!("{i}: {}", choice.exp.outcomes[i].name);
        }
        loop {
            let idx = self.read_index(choice.exp.outcomes.len());
            if satisfiable.contains(&idx) {
                return idx;
            }
            println!("that outcome is not satisfiable under the current knowledge");
        }
    }
}
