use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teatro_ombre::core::config::GameConfig;
use teatro_ombre::core::world::{ActionIntent, Game, GameEvent, Snapshot};
use teatro_ombre::data::ContentLibrary;
use teatro_ombre::persistence::{MemorySaveStore, SaveRepository, SqliteSaveStore};
use teatro_ombre::simulation::battle::BattleAction;
use teatro_ombre::simulation::minigame::{MinigameInput, MinigameKind, MinigameState};

const STEP_MS: u32 = 100;
const HELP: &str = "Commands: new | continue | save | talk <npc> <script> | next | choose <n> | fight | resist | item <id> | flee | skip | minigame [kind] [difficulty] | press | hold | left | right | pick <n> | point <x> <y> | go <map> [x y] | examine <id> [memory] | ending | wait [ms] | status | inv | log | summary | achievements | scores | quit";

struct Args {
    data_dir: PathBuf,
    save_path: Option<PathBuf>,
    seed: u64,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Teatro delle Ombre (debug console)");
    let args = parse_args(env::args().collect());

    let content = match ContentLibrary::load_dir(&args.data_dir) {
        Ok(content) => content,
        Err(err) => {
            eprintln!(
                "Failed to load content from {}: {}",
                args.data_dir.display(),
                err
            );
            std::process::exit(1);
        }
    };
    let config = GameConfig::load_or_default(args.data_dir.join("game_config.json"));

    let store: Box<dyn SaveRepository> = match &args.save_path {
        Some(path) => match SqliteSaveStore::open(path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                eprintln!("Failed to open save file {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        None => Box::new(MemorySaveStore::new()),
    };

    let mut game = Game::with_parts(args.seed, content, config, store);
    if game.continue_game() {
        println!("Save found, continuing.");
    } else {
        game.new_game();
    }
    print_snapshot(&game.snapshot());

    println!("{}", HELP);
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let rest: Vec<&str> = parts.collect();

        let mut delta = STEP_MS;
        let intents = match cmd.as_str() {
            "quit" | "exit" => break,
            "help" => {
                println!("{}", HELP);
                continue;
            }
            "new" => {
                game.new_game();
                Vec::new()
            }
            "continue" => {
                if !game.continue_game() {
                    println!("No save to continue.");
                }
                Vec::new()
            }
            "save" => {
                game.save();
                println!("Saved.");
                continue;
            }
            "status" => {
                print_snapshot(&game.snapshot());
                continue;
            }
            "inv" => {
                print_inventory(&game.snapshot());
                continue;
            }
            "log" => {
                for line in game.snapshot().transcript {
                    println!("  {}", line);
                }
                continue;
            }
            "summary" => {
                let summary = game.save_system().summary();
                println!(
                    "Play time {} | {} | karma {} | saved at {}",
                    summary.play_time, summary.map, summary.karma, summary.timestamp
                );
                continue;
            }
            "achievements" => {
                print_achievements(&game);
                continue;
            }
            "scores" => {
                print_scores(game.resource::<MinigameState>());
                continue;
            }
            "talk" => match rest.as_slice() {
                [npc, script] => vec![ActionIntent::Interact {
                    npc: npc.to_string(),
                    script: script.to_string(),
                }],
                _ => {
                    println!("Usage: talk <npc> <script>");
                    continue;
                }
            },
            "next" => vec![ActionIntent::Advance],
            "choose" => match rest.first().and_then(|raw| raw.parse::<usize>().ok()) {
                Some(index) => vec![ActionIntent::SelectChoice(index)],
                None => {
                    println!("Usage: choose <n>");
                    continue;
                }
            },
            "fight" => vec![ActionIntent::Battle(BattleAction::Fight)],
            "resist" => vec![ActionIntent::Battle(BattleAction::Resist)],
            "flee" => vec![ActionIntent::Battle(BattleAction::Flee)],
            "item" => match rest.first() {
                Some(id) => vec![ActionIntent::Battle(BattleAction::UseItem(id.to_string()))],
                None => {
                    println!("Usage: item <id>");
                    continue;
                }
            },
            "skip" => vec![ActionIntent::SkipBeats],
            "minigame" => {
                let kind = match rest.first() {
                    Some(raw) => match parse_kind(raw) {
                        Some(kind) => Some(kind),
                        None => {
                            println!("Unknown minigame kind: {}", raw);
                            continue;
                        }
                    },
                    None => None,
                };
                let difficulty = rest
                    .get(1)
                    .and_then(|raw| raw.parse::<f32>().ok())
                    .unwrap_or(1.0);
                vec![ActionIntent::StartMinigame { kind, difficulty }]
            }
            "press" => vec![ActionIntent::Minigame(MinigameInput::confirm())],
            "hold" => vec![ActionIntent::Minigame(MinigameInput::hold())],
            "left" => vec![ActionIntent::Minigame(MinigameInput {
                left_pressed: true,
                left_held: true,
                ..MinigameInput::default()
            })],
            "right" => vec![ActionIntent::Minigame(MinigameInput {
                right_pressed: true,
                right_held: true,
                ..MinigameInput::default()
            })],
            "pick" => match rest.first().and_then(|raw| raw.parse::<usize>().ok()) {
                Some(index) => vec![ActionIntent::Minigame(MinigameInput::pick(index))],
                None => {
                    println!("Usage: pick <n>");
                    continue;
                }
            },
            "point" => match (
                rest.first().and_then(|raw| raw.parse::<f32>().ok()),
                rest.get(1).and_then(|raw| raw.parse::<f32>().ok()),
            ) {
                (Some(x), Some(y)) => vec![ActionIntent::Minigame(MinigameInput {
                    pointer: Some((x, y)),
                    ..MinigameInput::default()
                })],
                _ => {
                    println!("Usage: point <x> <y>");
                    continue;
                }
            },
            "go" => match rest.as_slice() {
                [map] => vec![travel(map, 200.0, 300.0)],
                [map, x, y] => match (x.parse::<f32>(), y.parse::<f32>()) {
                    (Ok(x), Ok(y)) => vec![travel(map, x, y)],
                    _ => {
                        println!("Usage: go <map> [x y]");
                        continue;
                    }
                },
                _ => {
                    println!("Usage: go <map> [x y]");
                    continue;
                }
            },
            "examine" => match rest.as_slice() {
                [id] => vec![ActionIntent::Examine {
                    lore_id: id.to_string(),
                    memory: false,
                }],
                [id, "memory"] => vec![ActionIntent::Examine {
                    lore_id: id.to_string(),
                    memory: true,
                }],
                _ => {
                    println!("Usage: examine <id> [memory]");
                    continue;
                }
            },
            "ending" => vec![ActionIntent::TriggerEnding],
            "wait" => {
                delta = rest
                    .first()
                    .and_then(|raw| raw.parse::<u32>().ok())
                    .unwrap_or(1000);
                Vec::new()
            }
            other => {
                println!("Unknown command: {}", other);
                continue;
            }
        };

        let snapshot = game.tick(intents, delta);
        print_snapshot(&snapshot);
    }
}

fn travel(map: &str, x: f32, y: f32) -> ActionIntent {
    ActionIntent::Travel {
        map: map.to_string(),
        x,
        y,
    }
}

fn parse_kind(raw: &str) -> Option<MinigameKind> {
    let normalized = raw.replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized)).ok()
}

fn parse_args(args: Vec<String>) -> Args {
    let mut iter = args.iter();
    let mut parsed = Args {
        data_dir: PathBuf::from("./assets/data"),
        save_path: None,
        seed: 42,
    };
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--data" => {
                if let Some(value) = iter.next() {
                    parsed.data_dir = PathBuf::from(value);
                }
            }
            "--save" => {
                if let Some(value) = iter.next() {
                    parsed.save_path = Some(PathBuf::from(value));
                }
            }
            "--seed" => {
                if let Some(value) = iter.next() {
                    match value.parse::<u64>() {
                        Ok(seed) => parsed.seed = seed,
                        Err(_) => eprintln!("Ignoring invalid seed: {}", value),
                    }
                }
            }
            _ => {}
        }
    }
    parsed
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "[{}] {} | stage {} | {} | karma {} ({:?})",
        snapshot.time_str,
        snapshot.map,
        snapshot.stage,
        snapshot.objective,
        snapshot.karma.score,
        snapshot.karma.ending
    );

    if let Some(view) = &snapshot.dialogue {
        if view.choices.is_empty() {
            let speaker = view.speaker.as_deref().unwrap_or("");
            let marker = if view.complete_line { " [next]" } else { "" };
            println!("  {}: {}{}", speaker, view.text, marker);
        } else {
            for (index, choice) in view.choices.iter().enumerate() {
                println!("  {}) {}", index, choice);
            }
            if let Some(ms) = view.countdown_ms {
                println!("  ({} ms left)", ms);
            }
        }
    }

    if let Some(battle) = &snapshot.battle {
        println!(
            "  {} HP {}/{} | you HP {}/{} | temptation {} | round {}{}",
            battle.enemy_name,
            battle.enemy_health.0,
            battle.enemy_health.1,
            battle.player_health.0,
            battle.player_health.1,
            battle.temptation,
            battle.round,
            if battle.busy { " ..." } else { "" }
        );
        if let Some(message) = &battle.last_message {
            println!("  > {}", message);
        }
    }

    if let Some(minigame) = &snapshot.minigame {
        let remaining = minigame
            .remaining_ms
            .map(|ms| format!("{} ms left", ms))
            .unwrap_or_else(|| "untimed".to_string());
        println!(
            "  minigame {} | score {} | combo {} | {}{}",
            minigame.label,
            minigame.score,
            minigame.combo,
            remaining,
            if minigame.locked { " (locked)" } else { "" }
        );
    }

    for event in &snapshot.events {
        match event {
            GameEvent::Rejected(reason) => println!("  ! {}", reason),
            GameEvent::MapEntered(map) => println!("  * entered {}", map),
            GameEvent::AchievementUnlocked(id) => println!("  * achievement: {}", id),
            GameEvent::BattleFinished { enemy_id, result } => {
                println!("  * battle with {} ended: {:?}", enemy_id, result)
            }
            GameEvent::MinigameFinished(outcome) => println!(
                "  * {} {} (score {}, nudge {}{})",
                outcome.kind.label(),
                if outcome.success { "won" } else { "lost" },
                outcome.score,
                outcome.karma_nudge,
                if outcome.new_record { ", new record" } else { "" }
            ),
            GameEvent::EndingReached(ending) => println!("  * ENDING: {}", ending.id()),
        }
    }
}

fn print_inventory(snapshot: &Snapshot) {
    if snapshot.inventory.is_empty() {
        println!("Inventory empty.");
        return;
    }
    for (id, quantity) in &snapshot.inventory {
        println!("  {} x{}", id, quantity);
    }
}

fn print_achievements(game: &Game) {
    let catalog = &game.resource::<ContentLibrary>().achievements;
    let unlocked = &game.save_system().record().achievements;
    let (done, total) = catalog.progress(unlocked);
    println!("Achievements {}/{}", done, total);
    for def in catalog.visible(unlocked) {
        let mark = if unlocked.contains(&def.id) { "x" } else { " " };
        println!("  [{}] {} - {}", mark, def.name, def.description);
    }
}

fn print_scores(state: &MinigameState) {
    if state.high_scores.is_empty() {
        println!("No high scores yet.");
        return;
    }
    for (kind, score) in &state.high_scores {
        println!("  {}: {}", kind.label(), score);
    }
}
