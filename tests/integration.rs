//! End-to-end scenarios over the full textual game language: parsing,
//! semantic resolution, well-formedness, and solver model counts. These
//! are the seed cases of spec §8 ("End-to-end scenarios") plus the
//! directly testable parser/AST and optimal-analyzer properties of the
//! same section, exercised through the public crate surface rather than
//! through any one module's internals.

use std::io::Write;

use deduction::error::{GameError, SemanticError};
use deduction::game::Game;
use deduction::parser::parse_game;
use deduction::solver::cnf::CnfSolver;
use deduction::solver::Solver;

fn load(src: &str) -> Game {
    Game::load(src).expect("game should load and resolve")
}

fn solver_for(game: &Game) -> CnfSolver<'_> {
    let mut solver = CnfSolver::new(game.var_names.len(), game);
    solver.add_constraint(&game.restriction, None);
    solver
}

#[test]
fn seed_scenario_1_push_pop_round_trip_preserves_model_count() {
    let game = load(
        r#"
        VARS { a, b, c, d };
        RESTRICTION: (a -> b) & (c -> d) & (!b | !d);
        ALPHABET { x };
    "#,
    );
    let mut solver = solver_for(&game);
    assert_eq!(solver.num_models(), 5);

    solver.open_context();
    let a = game.variable_id("a").unwrap();
    let c = game.variable_id("c").unwrap();
    solver.add_constraint(&deduction::formula::Formula::and(vec![deduction::formula::Formula::var(a), deduction::formula::Formula::var(c)]), None);
    assert!(!solver.satisfiable());
    solver.close_context();

    assert_eq!(solver.num_models(), 5);
}

#[test]
fn seed_scenario_2_fixing_a_variable_makes_the_model_unique() {
    let game = load(
        r#"
        VARS { a, b };
        RESTRICTION: a -> b;
        ALPHABET { x };
    "#,
    );
    let mut solver = solver_for(&game);
    assert!(!solver.only_one_model());

    let a = game.variable_id("a").unwrap();
    solver.add_constraint(&deduction::formula::Formula::var(a), None);
    assert!(solver.satisfiable());
    assert!(solver.only_one_model());
}

#[test]
fn seed_scenario_3_exactly_one_among_overlapping_disjuncts_is_unsat() {
    let game = load(
        r#"
        VARS { a, b };
        RESTRICTION: Exactly-1(a, a|b, b);
        ALPHABET { x };
    "#,
    );
    let mut solver = solver_for(&game);
    assert!(!solver.satisfiable());
}

#[test]
fn seed_scenario_4_parsed_formula_round_trips_through_display() {
    let parsed = parse_game(
        r#"
        VARS { p1, p2, a, b };
        RESTRICTION: p1 & p2 -> (a <-> b);
        ALPHABET { x };
    "#,
    )
    .expect("should parse");
    assert_eq!(parsed.restriction.to_string(), "((p1 & p2) -> (a <-> b))");

    let reparsed = parse_game(&format!(
        "VARS {{ p1, p2, a, b }}; RESTRICTION: {}; ALPHABET {{ x }};",
        parsed.restriction
    ))
    .expect("pretty-printed formula should reparse");
    assert_eq!(reparsed.restriction, parsed.restriction);
}

#[test]
fn seed_scenario_5_nested_contexts_track_model_counts_at_each_scope() {
    let game = load(
        r#"
        VARS { a, b, c, d };
        RESTRICTION: a | b;
        ALPHABET { x };
    "#,
    );
    let mut solver = solver_for(&game);
    assert_eq!(solver.num_models(), 12);

    let (a, b, c, d) = (game.variable_id("a").unwrap(), game.variable_id("b").unwrap(), game.variable_id("c").unwrap(), game.variable_id("d").unwrap());
    use deduction::formula::Formula;

    solver.open_context();
    solver.add_constraint(&Formula::or(vec![Formula::var(c), Formula::var(d)]), None);
    assert_eq!(solver.num_models(), 9);

    solver.open_context();
    solver.add_constraint(&Formula::or(vec![Formula::var(a), Formula::var(d)]), None);
    assert_eq!(solver.num_models(), 8);

    solver.close_context();
    assert_eq!(solver.num_models(), 9);

    solver.add_constraint(&Formula::not(Formula::var(a)), None);
    assert_eq!(solver.num_models(), 3);

    solver.close_context();
    assert_eq!(solver.num_models(), 12);
}

#[test]
fn game_loads_from_a_file_on_disk_the_same_way_the_cli_reads_it() {
    let mut file = tempfile::NamedTempFile::new().expect("should create a temp file");
    write!(
        file,
        r#"
        VARS {{ a, b }};
        RESTRICTION: a -> b;
        ALPHABET {{ x }};
    "#
    )
    .expect("should write the game declaration");

    let src = fs_err::read_to_string(file.path()).expect("main.rs reads its input file the same way");
    let game = load(&src);
    assert_eq!(game.var_names, vec!["a", "b"]);
}

#[test]
fn undeclared_variable_in_restriction_is_a_semantic_error() {
    let err = Game::load(
        r#"
        VARS { a };
        RESTRICTION: a & nope;
        ALPHABET { x };
    "#,
    )
    .unwrap_err();
    assert!(matches!(err, GameError::Semantic(SemanticError::UndefinedVariable(name)) if name == "nope"));
}

#[test]
fn flattening_merges_a_chain_of_conjuncts_into_one_and_node() {
    let parsed = parse_game(
        r#"
        VARS { a, b, c };
        RESTRICTION: a & b & c;
        ALPHABET { x };
    "#,
    )
    .expect("should parse");
    match parsed.restriction {
        deduction::parser::RawFormula::And(children) => assert_eq!(children.len(), 3),
        other => panic!("expected a single flattened And node, got {other:?}"),
    }
}

#[test]
fn counting_operators_have_the_expected_concrete_model_counts() {
    let game = load(
        r#"
        VARS { x1, x2, x3, x4, x5 };
        RESTRICTION: x1 | !x1;
        ALPHABET { c };
    "#,
    );
    use deduction::formula::Formula;
    let vars: Vec<_> = (1..=5).map(Formula::var).collect();

    let mut solver = solver_for(&game);
    solver.open_context();
    solver.add_constraint(&Formula::exactly(2, vars.clone()), None);
    assert_eq!(solver.num_models(), 10);
    solver.close_context();

    solver.open_context();
    solver.add_constraint(&Formula::at_most(2, vars.clone()), None);
    assert_eq!(solver.num_models(), 16);
    solver.close_context();

    solver.open_context();
    solver.add_constraint(&Formula::at_least(2, vars.clone()), None);
    assert_eq!(solver.num_models(), 26);
    solver.close_context();

    solver.open_context();
    solver.add_constraint(&Formula::exactly(2, vars.clone()), None);
    solver.add_constraint(&Formula::at_least(2, vars[0..3].to_vec()), None);
    assert!(solver.satisfiable());
    assert_eq!(solver.num_fixed_vars(), 2);
    solver.close_context();
}

#[test]
fn optimal_analysis_on_info_mode_style_game_reports_well_formed_stats() {
    let game = load(
        r#"
        VARS { a, b, c };
        RESTRICTION: (a | !a) & (b | !b) & (c | !c);
        ALPHABET { pa, pb, pc };
        MAPPING peg { a, b, c };
        EXPERIMENT ask(1) {
            OUTCOME hit: peg$1;
            OUTCOME miss: !peg$1;
        }
    "#,
    );
    let report = deduction::info_report(&game);
    assert_eq!(report.num_vars, 3);
    assert_eq!(report.alphabet_size, 3);
    assert_eq!(report.experiments, vec![("ask".to_string(), 1)]);

    let analysis = deduction::run_analysis(&game, deduction::options::SolverBackend::Cnf, true);
    assert!(analysis.solved);
    assert_eq!(analysis.value, 3.0);
}
