//! Command-line frontend: generate a table for a root/static/goal triple,
//! or look up the per-move win probabilities for a board already covered
//! by one.
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;

use solver2048_core::{goal_nibble_from_value, read_meta, write_meta, Config, TableGenerator, DIRECTIONS};

mod hash;
use hash::parse_board;

#[derive(Parser, Debug)]
#[command(name = "solver2048", version, about = "4x4 2048 static-endgame table generator")]
struct Cli {
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate every reachable position below a root board and write
    /// per-move win probabilities to disk.
    Generate {
        /// Directory the table's meta.txt and <sum>.txt files live under.
        #[arg(long)]
        table_dir: String,

        /// Root board, as a 16-character practice hash or a decimal u64.
        #[arg(long)]
        root: String,

        /// Tiles that must never move, same format as `--root`. Defaults
        /// to no static tiles.
        #[arg(long, default_value = "0")]
        static_tiles: String,

        /// Tile value that counts as a win once two of it are present.
        #[arg(long)]
        goal: u64,

        #[arg(long, default_value_t = solver2048_core::DEFAULT_CACHE_SIZE)]
        cache_size: usize,

        #[arg(long, default_value_t = 1)]
        num_threads: usize,

        /// Skip enumeration; evaluate spill shards already on disk under
        /// positions/.
        #[arg(long, default_value_t = false)]
        positions_already_spilled: bool,
    },
    /// Look up the per-move win probabilities for a board in an
    /// already-generated table.
    Query {
        #[arg(long)]
        table_dir: String,

        /// Board to look up, as a 16-character practice hash or a decimal u64.
        board: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(&cli.log_level)
        .context("invalid log level")?
        .log_to_stderr()
        .start()
        .context("failed to start logger")?;

    match cli.command {
        Command::Generate {
            table_dir,
            root,
            static_tiles,
            goal,
            cache_size,
            num_threads,
            positions_already_spilled,
        } => generate(
            table_dir,
            &root,
            &static_tiles,
            goal,
            cache_size,
            num_threads,
            positions_already_spilled,
        ),
        Command::Query { table_dir, board } => query(table_dir, &board),
    }
}

fn generate(
    table_dir: String,
    root: &str,
    static_tiles: &str,
    goal: u64,
    cache_size: usize,
    num_threads: usize,
    positions_already_spilled: bool,
) -> Result<()> {
    let root_board = parse_board(root)?;
    let static_board = parse_board(static_tiles)?;
    let goal_tile = goal_nibble_from_value(goal).context("invalid goal tile")?;

    let config = Config::new(&table_dir, root_board.0, static_board.0, goal_tile, cache_size, num_threads)
        .context("invalid configuration")?;
    write_meta(&config).context("failed to write meta.txt")?;

    let generator = TableGenerator::new(config).context("failed to initialize table generator")?;

    log::info!("generating table in {table_dir}");
    let start = Instant::now();
    generator
        .generate_table(positions_already_spilled)
        .context("table generation failed")?;
    log::info!("completed in {:.3}s", start.elapsed().as_secs_f64());

    let probs = generator.read_table(root_board.0).context("failed to read back root board")?;
    print_probs(&probs);
    Ok(())
}

fn query(table_dir: String, board: &str) -> Result<()> {
    let meta = read_meta(table_dir.as_ref()).context("failed to read meta.txt")?;
    let config = Config::new(&table_dir, meta.root, meta.static_tiles, meta.goal_tile, 0, 0)
        .context("invalid configuration")?;
    let generator = TableGenerator::new(config).context("failed to initialize table generator")?;

    let board = parse_board(board)?;
    let probs = generator.read_table(board.0).context("board not found in table")?;
    print_probs(&probs);
    Ok(())
}

fn print_probs(probs: &solver2048_core::MoveProbs) {
    for (i, dir) in DIRECTIONS.iter().enumerate() {
        println!("{dir}: {:.2}%", probs.probs[i] * 100.0);
    }
}
