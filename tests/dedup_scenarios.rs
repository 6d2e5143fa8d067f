// tests/dedup_scenarios.rs
//
// End-to-end classification through the public engine API:
// - abbreviated scorer within a minute (scorer tier)
// - minute tolerance boundary (teams tier)
// - different scorer at the same score/minute
// - two identical titles racing on separate threads
// - non-goal passthrough
// - scorer aliases from the player table

use std::sync::{Arc, Barrier};

use chrono::{DateTime, TimeZone, Utc};
use goal_dedup::goal::PlayerTable;
use goal_dedup::{Classification, DedupConfig, DedupEngine, TeamTable, Tier};

const JESUS_81: &str = "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 81'";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

fn engine() -> DedupEngine {
    let teams = Arc::new(TeamTable::builtin().expect("built-in teams"));
    DedupEngine::new(teams, DedupConfig::default())
}

#[test]
fn abbreviated_scorer_thirty_seconds_later_is_duplicate() {
    let e = engine();
    let first = e.classify(JESUS_81, "https://streamff.co/v/aaa", t0());
    assert!(first.is_novel());

    let second = e.classify(
        "Arsenal [3] - 1 Crystal Palace - G. Jesus 81'",
        "https://streamin.one/v/bbb",
        at(30),
    );
    assert!(second.is_duplicate);
    let prior = second.matched_prior.expect("matched prior");
    assert_eq!(prior.raw_text, JESUS_81);
}

#[test]
fn minute_two_apart_is_novel_one_apart_is_duplicate() {
    let e = engine();
    e.classify(JESUS_81, "https://streamff.co/v/1", t0());
    let c = e.classify(
        "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 83'",
        "https://streamff.co/v/2",
        at(90),
    );
    assert!(!c.is_duplicate);

    let e = engine();
    e.classify(JESUS_81, "https://streamff.co/v/1", t0());
    let c = e.classify(
        "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 82'",
        "https://streamff.co/v/3",
        at(90),
    );
    assert!(c.is_duplicate);
}

#[test]
fn different_scorer_is_a_different_goal() {
    let e = engine();
    e.classify(JESUS_81, "https://streamff.co/v/1", t0());
    let c = e.classify(
        "Arsenal [3] - 1 Crystal Palace - Saka 81'",
        "https://streamff.co/v/2",
        at(30),
    );
    assert!(!c.is_duplicate);
    assert!(c.event.is_some());
}

#[test]
fn match_thread_is_passed_through() {
    let e = engine();
    let c = e.classify("Match Thread: Arsenal vs Chelsea", "https://reddit.com/x", t0());
    assert!(!c.is_duplicate);
    assert!(c.event.is_none());
    assert!(e.store().is_empty());
}

#[test]
fn nickname_and_side_swap_still_collapse() {
    let e = engine();
    e.classify(
        "Newcastle 0 - [1] Man City - Haaland 9'",
        "https://streamff.co/v/1",
        t0(),
    );
    let c = e.classify(
        "Manchester City [1] - 0 Newcastle United - E. Haaland 10'",
        "https://streamja.com/v/2",
        at(75),
    );
    assert!(c.is_duplicate);
    assert_eq!(c.tier, Some(Tier::TeamsMinute));
}

#[test]
fn look_alike_club_is_not_merged() {
    let e = engine();
    e.classify(
        "Newcastle United [1] - 0 Everton - Isak 20'",
        "https://streamff.co/v/1",
        t0(),
    );
    let c = e.classify(
        "Newcastle Jets [1] - 0 Everton - Taylor 20'",
        "https://streamff.co/v/2",
        at(40),
    );
    assert!(!c.is_duplicate);
}

#[test]
fn scorer_aliases_collapse_in_either_order() {
    let pairs = [
        (
            "THFC [2] - 1 Chelsea - Son 44'",
            "Tottenham Hotspur [2] - 1 Chelsea FC - Son Heung-min 44'",
        ),
        (
            "Everton [3] - 1 Burnley - Calvert-Lewin 45+1'",
            "Everton [3] - 1 Burnley - DCL 45+2'",
        ),
    ];
    for (a, b) in pairs {
        for (first, second) in [(a, b), (b, a)] {
            let e = engine();
            assert!(e.classify(first, "https://streamff.co/v/1", t0()).is_novel());
            let c = e.classify(second, "https://streamin.one/v/2", at(10));
            assert!(c.is_duplicate, "{first} / {second}: {c:?}");
            assert_eq!(c.tier, Some(Tier::ScorerMinute), "{first} / {second}");
        }
    }
}

#[test]
fn loaded_player_table_replaces_the_builtin() {
    let players = PlayerTable::from_toml_str(
        r#"
        [[players]]
        name = "Bukayo Saka"
        aliases = ["Starboy"]
        "#,
    )
    .expect("player table");
    let e = engine().with_players(Arc::new(players));

    e.classify("Arsenal [1] - 0 Chelsea - Saka 12'", "https://streamff.co/v/1", t0());
    let c = e.classify("Arsenal [1] - 0 Chelsea - Starboy 12'", "https://streamff.co/v/2", at(20));
    assert_eq!(c.tier, Some(Tier::ScorerMinute));
}

#[test]
fn tighter_windows_are_honoured() {
    let teams = Arc::new(TeamTable::builtin().unwrap());
    let cfg = DedupConfig {
        scorer_window: std::time::Duration::from_secs(10),
        ..DedupConfig::default()
    };
    let e = DedupEngine::new(teams, cfg);
    e.classify(JESUS_81, "https://streamff.co/v/1", t0());
    let c = e.classify(
        "Arsenal [3] - 1 Crystal Palace - G. Jesus 81'",
        "https://streamff.co/v/2",
        at(30),
    );
    // scorer tier closed, teams tier still open
    assert_eq!(c.tier, Some(Tier::TeamsMinute));
}

#[test]
fn identical_titles_racing_accept_exactly_one() {
    for round in 0..50 {
        let e = Arc::new(engine());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let e = Arc::clone(&e);
                let b = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    b.wait();
                    e.classify(JESUS_81, &format!("https://streamff.co/v/{round}-{i}"), t0())
                })
            })
            .collect();

        let results: Vec<Classification> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();

        assert_eq!(results.iter().filter(|c| c.is_novel()).count(), 1, "round {round}");
        assert_eq!(results.iter().filter(|c| c.is_duplicate).count(), 1, "round {round}");
        assert_eq!(e.store().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_tasks_one_accepted() {
    let e = Arc::new(engine());
    let mut set = tokio::task::JoinSet::new();
    for i in 0..16 {
        let e = Arc::clone(&e);
        set.spawn(async move { e.classify(JESUS_81, &format!("https://streamff.co/v/{i}"), t0()) });
    }

    let mut novel = 0;
    let mut dup = 0;
    while let Some(res) = set.join_next().await {
        let c = res.expect("task");
        if c.is_novel() {
            novel += 1;
        }
        if c.is_duplicate {
            dup += 1;
            assert!(c.matched_prior.is_some());
        }
    }
    assert_eq!(novel, 1);
    assert_eq!(dup, 15);
    assert_eq!(e.store().len(), 1);
}
