//! Classify titles (arguments, or one per stdin line) against one in-memory engine.
//!
//! `cargo run --bin classify_demo -- "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 81'" "Arsenal [3] - 1 Crystal Palace - G. Jesus 81'"`

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use goal_dedup::{DedupConfig, DedupEngine, PlayerTable, TeamTable};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let engine = DedupEngine::new(Arc::new(TeamTable::load_default()?), DedupConfig::default())
        .with_players(Arc::new(PlayerTable::load_default()?));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let titles: Vec<String> = if args.is_empty() {
        std::io::stdin().lock().lines().collect::<std::io::Result<_>>()?
    } else {
        args
    };

    for (i, title) in titles.iter().filter(|t| !t.trim().is_empty()).enumerate() {
        let url = format!("demo://title/{i}");
        let c = engine.classify(title.trim(), &url, Utc::now());
        let verdict = match (&c.event, c.is_duplicate) {
            (None, _) => "not a goal".to_string(),
            (Some(_), false) => "NOVEL".to_string(),
            (Some(_), true) => format!(
                "DUPLICATE ({})",
                c.tier.map(|t| t.as_str()).unwrap_or("?")
            ),
        };
        println!("{verdict:<18} {title}");
        if let Some(ev) = &c.event {
            println!(
                "{:<18} score={}-{} minute={} scorer={} teams={}/{}",
                "",
                ev.score.scoring_count,
                ev.score.other_count,
                ev.minute,
                ev.scorer.as_ref().map_or("-", |p| p.as_str()),
                ev.team_a.as_ref().map_or("-", |t| t.as_str()),
                ev.team_b.as_ref().map_or("-", |t| t.as_str()),
            );
        }
    }

    println!("window holds {} event(s)", engine.store().len());
    Ok(())
}
