//! Deduction-game analyzer library crate.
//!
//! Loads a textual game declaration (spec §3/§6), then offers three
//! entry points mirroring the CLI's modes of operation: [`info_report`]
//! (well-formedness + statistics), [`run_simulation`] (play one game to
//! completion) and [`run_analysis`] (optimal-strategy search). `main.rs`
//! is a thin front-end over these, exactly as `strix::main` is a thin
//! front-end over [`strix::synthesize_with`](https://docs.rs/strix)-style
//! library entry points.

pub mod error;
pub mod experiment;
pub mod formula;
pub mod game;
pub mod options;
pub mod parser;
pub mod solver;
pub mod strategy;

use std::fmt;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use error::GameError;
use experiment::coloring::CanonicalizerStats;
use experiment::params::ParamGenStats;
use experiment::ExperimentChoice;
use game::wellformed;
use game::Game;
use options::SolverBackend;
use solver::cnf::CnfSolver;
use solver::enumeration::EnumerationSolver;
use solver::Solver;
use strategy::optimal::{AnalysisResult, OptimalAnalyzer};
use strategy::{breaker, maker, BreakerStrategy, Chooser, MakerStrategy};

/// Loads and semantically resolves `src`, then runs the well-formedness
/// check (spec §6) before handing back the [`Game`]. Every entry point in
/// this crate goes through this function so a malformed game is always
/// rejected before any strategy or analyzer logic runs.
pub fn load_game(src: &str) -> Result<Game, GameError> {
    let game = Game::load(src)?;
    wellformed::check_well_formed(&game)?;
    Ok(game)
}

/// Constructs a fresh solver with the restriction already asserted,
/// picking the back-end requested on the command line (spec §4.2).
fn build_solver<'g>(game: &'g Game, backend: SolverBackend) -> Box<dyn Solver + 'g> {
    let mut solver: Box<dyn Solver + 'g> = match backend {
        SolverBackend::Cnf => Box::new(CnfSolver::new(game.var_names.len(), game)),
        SolverBackend::Enumeration => Box::new(EnumerationSolver::new(game.var_names.len(), game, &game.restriction)),
    };
    solver.add_constraint(&game.restriction, None);
    solver
}

/// Statistics reported by `--info`: variable/alphabet sizes, the arity of
/// every declared experiment template, and the node-count/branching/
/// lower-bound diagnostics `cobra::print_stats` reports before its
/// well-formedness check.
#[derive(Debug, Clone)]
pub struct GameStats {
    pub num_vars: usize,
    pub num_mappings: usize,
    pub alphabet_size: usize,
    pub experiments: Vec<(String, usize)>,
    pub formula_nodes: usize,
    pub total_parametrizations: u64,
    pub avg_parametrizations_per_type: f64,
    pub max_branching: usize,
    pub models: u64,
    pub trivial_lower_bound_expected: f64,
    pub trivial_lower_bound_worst_case: f64,
}

impl fmt::Display for GameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "well-formed: yes")?;
        writeln!(f, "variables: {}", self.num_vars)?;
        writeln!(f, "mappings: {}", self.num_mappings)?;
        writeln!(f, "alphabet size: {}", self.alphabet_size)?;
        write!(f, "experiments:")?;
        for (name, arity) in &self.experiments {
            write!(f, " {name}({arity})")?;
        }
        writeln!(f)?;
        writeln!(f, "nodes in outcome formulas: {}", self.formula_nodes)?;
        writeln!(f, "total parametrizations: {}", self.total_parametrizations)?;
        writeln!(f, "avg parametrizations per type: {:.2}", self.avg_parametrizations_per_type)?;
        writeln!(f, "maximal branching: {}", self.max_branching)?;
        writeln!(f, "num of possible codes: {}", self.models)?;
        writeln!(f, "trivial lower bound (expected): {:.2}", self.trivial_lower_bound_expected)?;
        write!(f, "trivial lower bound (worst-case): {}", self.trivial_lower_bound_worst_case.ceil())?;
        Ok(())
    }
}

/// Builds the `--info` report (spec SPEC_FULL §3), reinstating the node
/// count, parametrization, branching and trivial-lower-bound diagnostics
/// of `cobra::print_stats` (spec SPEC_FULL §5 supplement). `game` has
/// already passed [`load_game`]'s well-formedness check by construction.
///
/// The parametrization counts and lower bounds are computed against the
/// `Cnf` back-end regardless of the CLI's `--solver-backend` choice,
/// matching `cobra::print_stats`'s hardcoded use of `PicoSolver`.
pub fn info_report(game: &Game) -> GameStats {
    info!("variables: {}, mappings: {}, alphabet: {}, experiments: {}", game.var_names.len(), game.mappings.len(), game.alphabet.len(), game.experiments.len());

    let formula_nodes: usize = game.experiments.iter().flat_map(|e| &e.outcomes).map(|o| o.formula.size()).sum();
    let max_branching = game.experiments.iter().map(|e| e.outcomes.len()).max().unwrap_or(0);

    let mut coloring_stats = CanonicalizerStats::default();
    let coloring = experiment::coloring::compute_coloring(game, &[], &mut coloring_stats);
    let mut param_stats = ParamGenStats::default();
    let total_parametrizations: u64 = game
        .experiments
        .iter()
        .map(|e| experiment::params::enumerate_params(game, e, &coloring, &mut param_stats).len() as u64)
        .sum();
    let avg_parametrizations_per_type = if game.experiments.is_empty() {
        0.0
    } else {
        total_parametrizations as f64 / game.experiments.len() as f64
    };

    let mut solver = build_solver(game, SolverBackend::Cnf);
    let models = solver.num_models();
    let trivial_lower_bound_expected = (models as f64).ln() / (max_branching as f64).ln();

    GameStats {
        num_vars: game.var_names.len(),
        num_mappings: game.mappings.len(),
        alphabet_size: game.alphabet.len(),
        experiments: game.experiments.iter().map(|e| (e.name.clone(), e.arity)).collect(),
        formula_nodes,
        total_parametrizations,
        avg_parametrizations_per_type,
        max_branching,
        models,
        trivial_lower_bound_expected,
        trivial_lower_bound_worst_case: trivial_lower_bound_expected.ceil(),
    }
}

/// One performed experiment and the outcome it resolved to, in the
/// order played (spec §4.7, simulation transcript).
#[derive(Debug, Clone)]
pub struct SimulationStep {
    pub description: String,
    pub outcome: String,
}

/// A completed simulation: the path of experiments played down to a
/// single remaining model, plus the secret code reached (spec §4.7,
/// "played to completion").
#[derive(Debug, Clone)]
pub struct SimulationLog {
    pub steps: Vec<SimulationStep>,
    pub final_assignment: Vec<bool>,
}

/// Plays one game to completion: the code-breaker (`breaker_strategy`)
/// picks which experiment to perform next out of every non-degenerate
/// option, the code-maker (`maker_strategy`) picks which satisfiable
/// outcome it produced, until only one model of the accumulated
/// knowledge remains (spec §4.7).
///
/// `chooser` supplies interactive prompting when either strategy is
/// `Interactive`; it is never touched otherwise.
pub fn run_simulation(
    game: &Game,
    backend: SolverBackend,
    breaker_strategy: BreakerStrategy,
    maker_strategy: MakerStrategy,
    seed: u64,
    chooser: &mut dyn Chooser,
) -> SimulationLog {
    let mut solver = build_solver(game, backend);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stats = ParamGenStats::default();
    let mut coloring_stats = CanonicalizerStats::default();
    let mut steps = Vec::new();
    let mut knowledge: Vec<experiment::coloring::KnowledgeItem> = Vec::new();

    loop {
        debug_assert!(solver.satisfiable(), "run_simulation requires a satisfiable restriction");
        if solver.only_one_model() {
            break;
        }

        let coloring = experiment::coloring::compute_coloring(game, &knowledge, &mut coloring_stats);
        let mut choices: Vec<ExperimentChoice<'_>> = Vec::new();
        for exp in &game.experiments {
            choices.extend(experiment::enumerate_choices(game, exp, &coloring, &mut stats, solver.as_mut()));
        }
        choices.retain(|c| c.num_sat_outcomes() > 1);
        if choices.is_empty() {
            break;
        }

        let chosen = match breaker_strategy {
            BreakerStrategy::Interactive => breaker::interactive(&choices, game, chooser),
            BreakerStrategy::Random => breaker::random(&choices, &mut rng),
            BreakerStrategy::Parts => breaker::parts(&choices),
            BreakerStrategy::MinNum => breaker::min_num(&choices),
            BreakerStrategy::ExpNum => breaker::exp_num(&choices),
            BreakerStrategy::Entropy => breaker::entropy(&choices),
            BreakerStrategy::Fixed => breaker::fixed(&choices),
        };
        let choice = &choices[chosen];

        let outcome_idx = match maker_strategy {
            MakerStrategy::Interactive => maker::interactive(choice, chooser),
            MakerStrategy::Random => maker::random(choice, &mut rng),
            MakerStrategy::MaxNum => maker::max_num(choice),
            MakerStrategy::Fixed => maker::fixed(choice),
        };

        steps.push(SimulationStep {
            description: choice.describe(game),
            outcome: choice.exp.outcomes[outcome_idx].name.clone(),
        });
        let outcome_formula = choice.exp.outcomes[outcome_idx].formula.clone();
        solver.add_constraint(&outcome_formula, Some(&choice.params));
        knowledge.push((outcome_formula, Some(choice.params.clone())));
    }

    SimulationLog { steps, final_assignment: solver.get_assignment().to_vec() }
}

/// The outcome of `--analyze`: the optimal value, whether a winning
/// strategy was actually found, and the accumulated canonicalization /
/// parameter-generation statistics (spec SPEC_FULL §5).
#[derive(Debug, Clone, Copy)]
pub struct AnalysisReport {
    pub value: f64,
    pub solved: bool,
    pub coloring_stats: CanonicalizerStats,
    pub param_stats: ParamGenStats,
}

/// Runs the optimal analyzer from the initial knowledge state (spec
/// §4.7, "Optimal analysis") and reports its result together with the
/// statistics accumulated along the way.
pub fn run_analysis(game: &Game, backend: SolverBackend, worst_case: bool) -> AnalysisReport {
    let mut solver = build_solver(game, backend);
    let mut analyzer = OptimalAnalyzer::new(game, solver.as_mut(), worst_case);
    let AnalysisResult { value, solved, .. } = analyzer.analyze(f64::INFINITY);
    AnalysisReport { value, solved, coloring_stats: analyzer.coloring_stats(), param_stats: analyzer.param_stats() }
}
