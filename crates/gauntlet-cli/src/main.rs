//! `gauntlet`: simulates simple tabletop combat for playtesting custom
//! monsters.
//!
//! Runs many independent adventuring days of a fixed party against a fixed
//! adversary roster and prints the mean and sample standard deviation of the
//! number of surviving player characters. Days run in parallel; each one
//! derives its own generator stream from the master seed, so a run is fully
//! reproducible with `--seed`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;

use dicebag::{seed_from_entropy, DiceRng};
use gauntlet_core::{
    spawn_character, spawn_monster, spawn_test, AdventuringDay, Arena, RosterError, Side,
    TestStats,
};

#[derive(Parser, Debug)]
#[command(
    name = "gauntlet",
    version,
    about = "Simulates simple tabletop combat for playtesting custom monsters"
)]
struct Args {
    /// Number of adventuring days to simulate.
    #[arg(short = 'a', long, default_value_t = 1000)]
    adventuring_days: u64,

    /// Comma-separated list of player character classes to simulate.
    #[arg(short = 'c', long, default_value = "Cleric,Fighter,Rogue,Wizard")]
    classes: String,

    /// Run a single adventuring day with verbose information during
    /// encounters.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Comma-separated list of creature types to simulate.
    #[arg(short = 'm', long, default_value = "Kobold")]
    monsters: String,

    /// Comma-separated list of number of creatures to simulate.
    #[arg(short = 'n', long, default_value = "4")]
    num_monsters: String,

    /// Character level for the party of PCs to simulate.
    #[arg(short = 'p', long, default_value_t = 1)]
    party_level: u32,

    /// Comma-separated list of six stats for the synthetic Test creature:
    /// attack, AC, damage, hit points, attacks, proficiency.
    #[arg(short = 't', long)]
    test_stats: Option<String>,

    /// Print detailed information about PCs and creatures during encounters.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Master seed; omit for a fresh seed from the operating system.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of worker threads for the day loop.
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Encounters before the day ends at a long rest.
    #[arg(long, default_value_t = 6)]
    encounters_per_long_rest: u32,

    /// Encounters between short rests.
    #[arg(long, default_value_t = 2)]
    encounters_per_short_rest: u32,
}

/// What to spawn on the adversary side.
enum AdversarySpec {
    Named(Vec<(String, u32)>),
    Test { stats: TestStats, count: u32 },
}

impl AdversarySpec {
    fn label(&self) -> String {
        match self {
            Self::Named(list) => list
                .iter()
                .map(|(kind, count)| format!("{kind} {count}"))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Test { stats, count } => format!(
                "Test {:2} {:2} {:2} {:2} {:2} {:2} {count}",
                stats.attack,
                stats.armor_class,
                stats.damage,
                stats.hit_points,
                stats.attacks,
                stats.proficiency
            ),
        }
    }
}

fn parse_test_stats(raw: &str) -> Result<TestStats, RosterError> {
    let values: Vec<i32> = raw
        .split(',')
        .map(|v| v.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|_| RosterError::MalformedTestStats)?;
    let [attack, armor_class, damage, hit_points, attacks, proficiency]: [i32; 6] = values
        .try_into()
        .map_err(|_| RosterError::MalformedTestStats)?;
    if attacks <= 0 {
        return Err(RosterError::MalformedTestStats);
    }
    Ok(TestStats {
        attack,
        armor_class,
        damage,
        hit_points,
        attacks: attacks as u32,
        proficiency,
    })
}

fn parse_adversaries(args: &Args) -> Result<AdversarySpec> {
    let kinds: Vec<String> = args
        .monsters
        .trim_matches(|c| c == '\'' || c == '"')
        .split(',')
        .map(str::to_string)
        .collect();
    let counts: Vec<u32> = args
        .num_monsters
        .trim_matches(|c| c == '\'' || c == '"')
        .split(',')
        .map(|n| n.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .context("creature counts must be integers")?;

    if kinds.len() != counts.len() {
        bail!(RosterError::MismatchedCounts {
            types: kinds.len(),
            counts: counts.len(),
        });
    }

    if kinds.iter().any(|kind| kind == "Test") {
        let raw = args
            .test_stats
            .as_deref()
            .ok_or(RosterError::MissingTestStats)?;
        let stats = parse_test_stats(raw)?;
        return Ok(AdversarySpec::Test {
            stats,
            count: counts[0],
        });
    }

    Ok(AdversarySpec::Named(kinds.into_iter().zip(counts).collect()))
}

/// Builds a fresh arena for one adventuring day.
fn build_arena(
    rng: DiceRng,
    classes: &[String],
    party_level: u32,
    adversaries: &AdversarySpec,
    adversary_label: &str,
    verbose: bool,
) -> Result<Arena> {
    let mut arena = Arena::new(rng);

    for class in classes {
        spawn_character(&mut arena, class, party_level, class, verbose)
            .with_context(|| format!("building party member {class}"))?;
    }

    match adversaries {
        AdversarySpec::Named(list) => {
            for (kind, count) in list {
                for i in 1..=*count {
                    spawn_monster(&mut arena, kind, &format!("{kind}{i}"), verbose)
                        .with_context(|| format!("building adversary {kind}"))?;
                }
            }
        }
        AdversarySpec::Test { stats, count } => {
            for _ in 0..*count {
                spawn_test(&mut arena, Side::B, *stats, adversary_label, verbose);
            }
        }
    }

    Ok(arena)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .without_time()
        .init();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring worker threads")?;
    }

    let classes: Vec<String> = args
        .classes
        .trim_matches(|c| c == '\'' || c == '"')
        .split(',')
        .map(str::to_string)
        .collect();
    let adversaries = parse_adversaries(&args)?;
    let adversary_label = adversaries.label();
    let seed = args.seed.unwrap_or_else(seed_from_entropy);

    if args.debug {
        // One fully narrated day to watch behaviors in the open.
        let mut arena = build_arena(
            DiceRng::stream(seed, 0),
            &classes,
            args.party_level,
            &adversaries,
            &adversary_label,
            true,
        )?;
        let mut day = AdventuringDay::new(
            &mut arena,
            args.encounters_per_long_rest,
            args.encounters_per_short_rest,
        );
        day.run(&mut arena);
        tracing::info!("survivors: {}", day.survivors(&arena));
        return Ok(());
    }

    // Validate the roster once up front so configuration errors surface
    // before the fleet of days launches.
    build_arena(
        DiceRng::stream(seed, 0),
        &classes,
        args.party_level,
        &adversaries,
        &adversary_label,
        false,
    )?;

    let survival: Vec<u32> = (0..args.adventuring_days)
        .into_par_iter()
        .map(|day_index| {
            let mut arena = build_arena(
                DiceRng::stream(seed, day_index),
                &classes,
                args.party_level,
                &adversaries,
                &adversary_label,
                args.verbose,
            )
            .expect("roster validated before launch");
            let mut day = AdventuringDay::new(
                &mut arena,
                args.encounters_per_long_rest,
                args.encounters_per_short_rest,
            );
            day.run(&mut arena);
            day.survivors(&arena)
        })
        .collect();

    let n = survival.len() as f64;
    let mean = survival.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let std = if survival.len() > 1 {
        let variance = survival
            .iter()
            .map(|&s| (f64::from(s) - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    println!(
        "Level {:2} {} Survival {:6.4} +/- {:6.4}",
        args.party_level, adversary_label, mean, std
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_test_stats_happy_path() {
        let stats = parse_test_stats("3, 14, 10, 25, 2, 2").unwrap();
        assert_eq!(stats.attack, 3);
        assert_eq!(stats.armor_class, 14);
        assert_eq!(stats.attacks, 2);
    }

    #[test]
    fn parse_test_stats_rejects_bad_input() {
        assert!(parse_test_stats("1,2,3").is_err());
        assert!(parse_test_stats("a,b,c,d,e,f").is_err());
        assert!(parse_test_stats("0,20,0,1,0,2").is_err());
    }

    #[test]
    fn adversary_label_formats() {
        let spec = AdversarySpec::Named(vec![("Kobold".into(), 4), ("Ghoul".into(), 1)]);
        assert_eq!(spec.label(), "Kobold 4 Ghoul 1");
    }
}
