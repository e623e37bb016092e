//! End-to-end scenarios: generated mazes, watched corridors, training into
//! a store and resuming from it, and a full city game.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use evasion_agents::{AdversaryProfile, LearningAgent, LearningConfig};
use evasion_core::config::{RewardConfig, TrainingConfig};
use evasion_core::{CityGame, GameResult, LearningStore, Simulation, SimulationConfig, Trainer, run_episode};
use evasion_types::{EpisodeOutcome, Position};
use evasion_world::maze::{self, MazeStrategy};
use evasion_world::{CameraConfig, Grid, MazeConfig};

/// One long corridor along the top row and down the right-hand side.
const HOOK: &str = "\
##########
#S.......#
########.#
########.#
########.#
########.#
########.#
########.#
########E#
##########";

fn agent(seed: u64) -> LearningAgent {
    LearningAgent::new(LearningConfig::default(), seed).unwrap()
}

#[test]
fn unwatched_generated_maze_is_escaped() {
    for strategy in [MazeStrategy::Subdivision, MazeStrategy::RandomCarving] {
        let grid = maze::generate(10, 7, strategy).unwrap();
        let exit = grid.exits()[0];
        let mut sim = Simulation::new(grid, CameraConfig::default(), 5.0);
        let mut agent = agent(1);

        let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 2000, 0.1).unwrap();

        assert_eq!(report.outcome, EpisodeOutcome::Escaped, "{strategy:?}");
        assert!(report.moves > 0);
        assert_eq!(report.route.last(), Some(&exit));
        assert_eq!(report.route.first(), Some(&Position::new(1, 1)));
        assert_eq!(agent.successful_routes().len(), 1);
    }
}

#[test]
fn always_on_camera_over_the_only_corridor_is_a_stalemate() {
    let grid = Grid::parse(HOOK).unwrap();
    let mut sim = Simulation::new(grid, CameraConfig::always_on(1.5), 5.0);
    assert!(sim.place_camera(Position::new(0, 4)));
    let mut agent = agent(2);

    let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 100, 0.1).unwrap();

    assert_eq!(report.outcome, EpisodeOutcome::Stalemate);
    assert_eq!(report.moves, 0);
    assert!(sim.path().is_empty());
    assert!(!sim.is_captured());
}

#[test]
fn resting_camera_lets_the_agent_through() {
    let grid = Grid::parse(HOOK).unwrap();
    let mut sim = Simulation::new(grid, CameraConfig::default(), 5.0);
    let config = CameraConfig {
        vision_range: 1.5,
        scan_time: 0.3,
        rest_time: 100.0,
    };
    assert!(sim.place_camera_with(Position::new(0, 4), &config));

    let first: Vec<bool> = (0..2).map(|_| sim.tick(0.1).unwrap().stalled).collect();
    assert_eq!(first, vec![true, true]);

    let mut detections = 0;
    for _ in 0..100 {
        let summary = sim.tick(0.1).unwrap();
        detections += usize::from(summary.detection.is_some());
        if sim.is_finished() {
            break;
        }
    }
    assert!(sim.is_escaped());
    assert_eq!(detections, 0);
    assert_eq!(sim.moves(), 14);
}

#[test]
fn trained_model_resumes_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::new(dir.path());
    let mut config = SimulationConfig::default();
    config.world.maze = MazeConfig {
        size: 10,
        ..MazeConfig::default()
    };
    config.training = TrainingConfig {
        episodes: 4,
        max_ticks: 400,
        ..TrainingConfig::default()
    };

    let mut trained = agent(3);
    let report = Trainer::new(&config, &store).run(&mut trained).unwrap();
    assert_eq!(report.episodes, 4);

    let data = store.load_best();
    assert_eq!(data.q_table.len(), trained.q_table().len());
    let resumed = LearningAgent::from_snapshot(LearningConfig::default(), data, 4).unwrap();
    assert!((resumed.exploration_rate() - trained.exploration_rate()).abs() < 1e-12);
}

#[test]
fn city_game_is_filed_into_the_profile() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::new(dir.path());
    let mut profile = store.load_profile("tester");
    let mut agent = agent(5);
    agent.set_deception_rate(0.0);

    let mut game = CityGame::new(SimulationConfig::default().game).unwrap();
    game.begin(&mut agent, &profile);
    game.place_camera("highway_entrance", Some(0)).unwrap();

    for _ in 0..200 {
        game.advance(1.0, &mut agent).unwrap();
        if game.is_over() {
            break;
        }
    }
    game.finish(&mut profile);
    store.save_profile(&profile).unwrap();
    store.save_learning(&mut agent).unwrap();

    let reloaded: AdversaryProfile = store.load_profile("tester");
    assert_eq!(reloaded.sessions.len(), 1);
    assert_eq!(reloaded.top_placements(1).first().map(|(_, n)| *n), Some(1));
    match game.result() {
        Some(GameResult::AgentWin) => assert_eq!(reloaded.detection_failure, 1),
        Some(GameResult::AdversaryWin) => assert_eq!(reloaded.detection_success, 1),
        None => assert_eq!(reloaded.games_played, 0),
    }
    assert!(!store.load_learning().q_table.is_empty());
}
