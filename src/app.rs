//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the data path (flag, environment, `.env`)
//! - runs training or builds a serving context
//! - prints reports and writes optional exports

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Cli, Command, CompareArgs, DataArgs, PredictArgs, TrainArgs, TrendArgs};
use crate::domain::{FieldEncoding, ForestParams, Granularity, RawPredictionRequest, ServeConfig, TrainConfig};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable naming the default price CSV.
pub const DATA_ENV_VAR: &str = "CROP_PRICES_DATA";

/// Entry point for the `crop` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Predict(args) => handle_predict(args),
        Command::Trend(args) => handle_trend(args),
        Command::Compare(args) => handle_compare(args),
        Command::Catalog(args) => handle_catalog(args),
    }
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args)?;
    let run = pipeline::run_training(&config)?;

    eprint!("{}", crate::report::format_row_errors(&run.ingest.row_errors, args.show_errors));
    println!(
        "{}",
        crate::report::format_training_summary(&run.ingest, &run.artifact, &config.artifact_path)
    );
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let raw = RawPredictionRequest {
        crop: args.crop.clone(),
        location: args.location.clone(),
        date: args.date.clone(),
        year: args.year.clone(),
        rainfall: args.rainfall.clone(),
        temperature: args.temperature.clone(),
    };
    // Bad input is reported before any data or artifact is loaded.
    let req = crate::serve::parse_request(&raw).map_err(|msg| AppError::new(2, format!("Invalid input: {msg}")))?;

    let ctx = pipeline::load_context(&serve_config_from_args(&args.data, args.mode, args.artifact.clone())?)?;
    let result = crate::serve::predict(&ctx, &req);
    println!("{}", crate::report::format_prediction(&req, &result));
    Ok(())
}

fn handle_trend(args: TrendArgs) -> Result<(), AppError> {
    let ctx = pipeline::load_context(&serve_config_from_args(&args.data, Granularity::Segment, None)?)?;
    let outcome = ctx.trend(&args.crop, &args.location, args.period);
    println!("{}", crate::report::format_trend(&outcome, &args.crop, &args.location));

    if let (Some(path), crate::trend::TrendOutcome::Series(series)) = (&args.export, &outcome) {
        crate::io::export::write_trend_csv(path, series)?;
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let ctx = pipeline::load_context(&serve_config_from_args(&args.data, Granularity::Segment, None)?)?;
    let outcome = ctx.compare(&args.crop, &args.crop2, &args.location, args.period);
    println!(
        "{}",
        crate::report::format_comparison(&outcome, &args.crop, &args.crop2, &args.location)
    );

    if let (Some(path), crate::trend::ComparisonOutcome::Series(cmp)) = (&args.export, &outcome) {
        crate::io::export::write_comparison_csv(path, cmp)?;
    }
    Ok(())
}

fn handle_catalog(args: DataArgs) -> Result<(), AppError> {
    let ctx = pipeline::load_context(&serve_config_from_args(&args, Granularity::Segment, None)?)?;
    print!("{}", crate::report::format_catalog(&ctx.catalog()));
    Ok(())
}

pub fn train_config_from_args(args: &TrainArgs) -> Result<TrainConfig, AppError> {
    let crop = match args.crop_unseen {
        Some(policy) => FieldEncoding::with_unseen(args.crop_encoding, policy),
        None => FieldEncoding::new(args.crop_encoding),
    };
    let location = match args.location_unseen {
        Some(policy) => FieldEncoding::with_unseen(args.location_encoding, policy),
        None => FieldEncoding::new(args.location_encoding),
    };

    Ok(TrainConfig {
        data_path: resolve_data_path(&args.data)?,
        artifact_path: args.out.clone(),
        algorithm: args.algorithm,
        crop,
        location,
        forest: ForestParams {
            n_trees: args.trees,
            max_depth: args.max_depth,
            min_leaf: args.min_leaf,
            seed: args.seed,
        },
    })
}

pub fn serve_config_from_args(
    data: &DataArgs,
    granularity: Granularity,
    artifact_path: Option<PathBuf>,
) -> Result<ServeConfig, AppError> {
    Ok(ServeConfig {
        data_path: resolve_data_path(data)?,
        artifact_path,
        granularity,
    })
}

/// `--data` wins; otherwise `CROP_PRICES_DATA` from the environment or `.env`.
fn resolve_data_path(args: &DataArgs) -> Result<PathBuf, AppError> {
    if let Some(path) = &args.data {
        return Ok(path.clone());
    }
    dotenvy::dotenv().ok();
    std::env::var(DATA_ENV_VAR).map(PathBuf::from).map_err(|_| {
        AppError::new(
            2,
            format!("No price data given: pass --data or set {DATA_ENV_VAR} (environment or .env)."),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncodingKind, UnseenPolicy};

    fn train_args(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["crop", "train", "--data", "prices.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Train(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn train_config_applies_defaults_and_overrides() {
        let config = train_config_from_args(&train_args(&["--crop-encoding", "ordinal", "--trees", "7"])).unwrap();
        assert_eq!(config.data_path, PathBuf::from("prices.csv"));
        assert_eq!(config.artifact_path, PathBuf::from("model.json"));
        assert_eq!(config.crop.kind, EncodingKind::Ordinal);
        assert_eq!(config.crop.resolved_unseen(), UnseenPolicy::Reject);
        assert_eq!(config.location.resolved_unseen(), UnseenPolicy::ZeroFill);
        assert_eq!(config.forest.n_trees, 7);
        assert_eq!(config.forest.seed, 42);
    }

    #[test]
    fn explicit_data_flag_wins() {
        let args = DataArgs {
            data: Some(PathBuf::from("a.csv")),
        };
        assert_eq!(resolve_data_path(&args).unwrap(), PathBuf::from("a.csv"));
    }
}
