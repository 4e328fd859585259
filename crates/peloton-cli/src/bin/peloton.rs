//! `peloton` - command line client for a peloton master.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use peloton_cli::sim::{parse_speed, sample, LineRide, LoopRide, RidePath};
use peloton_cli::{render_leaderboards, render_report, render_statistics};
use peloton_core::gpx_io::render_gpx;
use peloton_sdk::PelotonClient;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Master URL
    #[arg(long, env = "PELOTON_SERVER_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Print raw JSON instead of tables
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload GPX files, one route each, and print every result
    Upload {
        files: Vec<PathBuf>,

        /// Rider name; defaults to each file's creator attribute
        #[arg(long)]
        user: Option<String>,
    },
    /// Lifetime totals for a rider and for everyone
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Segment leaderboards a rider appears on
    Leaderboard {
        #[arg(long)]
        user: String,
    },
    /// Write a synthetic ride as GPX
    Simulate {
        #[arg(long, value_enum, default_value_t = RideKind::Loop)]
        kind: RideKind,

        /// Creator attribute written into the file
        #[arg(long, default_value = "sim-rider")]
        user: String,

        #[arg(long, default_value_t = 37.9838)]
        lat: f64,

        #[arg(long, default_value_t = 23.7275)]
        lon: f64,

        /// Loop radius or line length in meters
        #[arg(long, default_value_t = 1_000.0)]
        size: f64,

        /// Riding speed in m/s
        #[arg(long, default_value_t = 7.0, value_parser = parse_speed)]
        speed: f64,

        /// Seconds between recorded points
        #[arg(long, default_value_t = 10)]
        interval: u32,

        #[arg(long, short)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RideKind {
    Loop,
    Line,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Upload { files, user } => {
            if files.is_empty() {
                anyhow::bail!("no GPX files given");
            }
            let mut client = PelotonClient::connect(&args.url).await?;
            for file in &files {
                let report = client.upload_file(user.as_deref(), file).await?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("{}:", file.display());
                    print!("{}", render_report(&report));
                }
            }
            client.close().await?;
        }
        Command::Stats { user } => {
            let mut client = PelotonClient::connect(&args.url).await?;
            client.hello(&user).await?;
            let (stats, global) = client.statistics().await?;
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "user": stats,
                        "global": global,
                    }))?
                );
            } else {
                print!("{}", render_statistics(&stats, &global));
            }
            client.close().await?;
        }
        Command::Leaderboard { user } => {
            let mut client = PelotonClient::connect(&args.url).await?;
            client.hello(&user).await?;
            let boards = client.leaderboards().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&boards)?);
            } else {
                print!("{}", render_leaderboards(&boards, &user));
            }
            client.close().await?;
        }
        Command::Simulate {
            kind,
            user,
            lat,
            lon,
            size,
            speed,
            interval,
            out,
        } => {
            let path: Box<dyn RidePath> = match kind {
                RideKind::Loop => Box::new(LoopRide {
                    center_lat: lat,
                    center_lon: lon,
                    radius_m: size,
                    base_elevation_m: 50.0,
                    climb_m: size / 20.0,
                    speed_mps: speed,
                }),
                RideKind::Line => Box::new(LineRide {
                    start_lat: lat,
                    start_lon: lon,
                    end_lat: lat + size / 111_320.0,
                    end_lon: lon,
                    start_elevation_m: 50.0,
                    end_elevation_m: 50.0 + size / 20.0,
                    speed_mps: speed,
                }),
            };
            let points = sample(path.as_ref(), Utc::now(), interval);
            if points.is_empty() {
                anyhow::bail!("ride has no finite duration; check --size and --speed");
            }
            std::fs::write(&out, render_gpx(&user, "simulated ride", &points))?;
            println!("Wrote {} points to {}", points.len(), out.display());
        }
    }

    Ok(())
}
