// Cantus composer — CLI entry point.
//
// Two modes:
//   compose <config.json> [--seed N]
//       Generate a score from a configuration and write the configured SMF.
//   compose --train <directory> [--out-prefix P] [--no-recursive]
//       Learn pitch/rhythm/chord-size transition matrices from a corpus of
//       MIDI files and write them as <P>_pitch.csv / _rhythm.csv /
//       _chord.csv (refusing to overwrite existing files).

use cantus_compose::config::Config;
use cantus_compose::error::Result;
use cantus_compose::generator::Generator;
use cantus_compose::midi::write_midi;
use cantus_compose::trainer::train_directory;
use std::path::{Path, PathBuf};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    let outcome = if has_flag(&args, "--train") {
        train(&args)
    } else {
        generate(&args)
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn train(args: &[String]) -> Result<()> {
    let directory: String = parse_flag(args, "--train").unwrap_or_default();
    let prefix: String = parse_flag(args, "--out-prefix").unwrap_or_else(|| "matrix".to_string());
    let recursive = !has_flag(args, "--no-recursive");

    println!("Training from '{directory}'...");
    let matrices = train_directory(Path::new(&directory), recursive)?;
    println!(
        "  {} pitch states, {} rhythm states, {} chord sizes.",
        matrices.pitch.row_labels().len(),
        matrices.rhythm.row_labels().len(),
        matrices.chord.row_labels().len()
    );

    for (matrix, kind) in [
        (&matrices.pitch, "pitch"),
        (&matrices.rhythm, "rhythm"),
        (&matrices.chord, "chord"),
    ] {
        let path = PathBuf::from(format!("{prefix}_{kind}.csv"));
        matrix.to_csv(&path, ',')?;
        println!("  Wrote {}.", path.display());
    }
    println!("Done.");
    Ok(())
}

fn generate(args: &[String]) -> Result<()> {
    let Some(config_path) = args.get(1).filter(|a| !a.starts_with("--")) else {
        eprintln!("usage: compose <config.json> [--seed N]");
        eprintln!("       compose --train <directory> [--out-prefix P] [--no-recursive]");
        std::process::exit(2);
    };

    let mut config = Config::from_file(Path::new(config_path))?;
    if let Some(seed) = parse_flag(args, "--seed") {
        config.seed = seed;
    }

    println!("Composing with engine '{}', seed {}...", config.engine, config.seed);
    let output = config.export.filename.clone();
    let mut generator = Generator::new(config)?;
    let score = generator.generate()?;

    for (i, part) in score.parts().iter().enumerate() {
        println!(
            "  Part {}: {} ({} measures, {} chords)",
            i + 1,
            part.instrument_name(),
            part.measures().len(),
            part.chord_count()
        );
    }

    match output {
        Some(path) => {
            write_midi(&score, &path)?;
            println!("Wrote {}.", path.display());
        }
        None => println!("No export filename configured; nothing written."),
    }
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
