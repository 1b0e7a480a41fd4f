//! On-disk layout, spec.md 4.G/6: the meta file, per-stratum position
//! spill shards, and final probability table files.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::{unpack_probs, MoveProbs};
use crate::error::{Error, Result};

/// Spill shards always live here, shared across every table directory —
/// matches the original's single top-level `positions/` working area.
pub const POSITIONS_DIR: &str = "positions";

pub fn ensure_dirs(table_dir: &Path) -> Result<()> {
    fs::create_dir_all(POSITIONS_DIR)?;
    fs::create_dir_all(table_dir)?;
    Ok(())
}

/// The three decimal lines written to `<table_dir>/meta.txt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Meta {
    pub root: u64,
    pub static_tiles: u64,
    pub goal_tile: u8,
}

impl Meta {
    fn path(table_dir: &Path) -> PathBuf {
        table_dir.join("meta.txt")
    }

    pub fn write(&self, table_dir: &Path) -> Result<()> {
        let mut f = File::create(Self::path(table_dir))?;
        writeln!(f, "{}", self.root)?;
        writeln!(f, "{}", self.static_tiles)?;
        writeln!(f, "{}", self.goal_tile)?;
        Ok(())
    }

    pub fn read(table_dir: &Path) -> Result<Meta> {
        let path = Self::path(table_dir);
        let contents = fs::read_to_string(&path)
            .map_err(|_| Error::BadInput(format!("missing meta file at {}", path.display())))?;
        let mut lines = contents.lines();
        let bad = || Error::BadInput(format!("malformed meta file at {}", path.display()));

        let root = lines.next().ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;
        let static_tiles = lines.next().ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;
        let goal_tile = lines.next().ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;

        Ok(Meta {
            root,
            static_tiles,
            goal_tile,
        })
    }
}

pub fn spill_path(tile_sum: u64, worker: usize) -> PathBuf {
    Path::new(POSITIONS_DIR).join(format!("{tile_sum}_{worker}.txt"))
}

/// One writer per shard, opened together so a shuffle pass can scatter
/// boards from every worker's buffer across all shards in one go.
pub fn create_spill_shards(tile_sum: u64, num_threads: usize) -> Result<Vec<BufWriter<File>>> {
    (0..num_threads)
        .map(|t| Ok(BufWriter::new(File::create(spill_path(tile_sum, t))?)))
        .collect()
}

pub fn write_board(writer: &mut impl Write, board: u64) -> Result<()> {
    writer.write_all(&board.to_le_bytes())?;
    Ok(())
}

pub fn delete_spill_shard(tile_sum: u64, worker: usize) -> Result<()> {
    match fs::remove_file(spill_path(tile_sum, worker)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Streams 8-byte little-endian boards out of a spill shard.
pub struct SpillReader {
    reader: BufReader<File>,
}

impl SpillReader {
    pub fn open(tile_sum: u64, worker: usize) -> Result<SpillReader> {
        let file = File::open(spill_path(tile_sum, worker))?;
        Ok(SpillReader {
            reader: BufReader::new(file),
        })
    }
}

impl Iterator for SpillReader {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Result<u64>> {
        let mut buf = [0u8; 8];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Some(Ok(u64::from_le_bytes(buf))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

fn table_path(table_dir: &Path, tile_sum: u64) -> PathBuf {
    table_dir.join(format!("{tile_sum}.txt"))
}

pub fn create_table_writer(table_dir: &Path, tile_sum: u64) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(table_path(table_dir, tile_sum))?))
}

/// Writes one fixed-width record: `board_bytes` little-endian bytes of the
/// packed board, then exactly 7 little-endian bytes of the packed probs
/// (the low 56 bits of the 64-bit packed value).
pub fn write_table_record(
    writer: &mut impl Write,
    packed_board: u64,
    board_bytes: usize,
    packed_probs: u64,
) -> Result<()> {
    writer.write_all(&packed_board.to_le_bytes()[..board_bytes])?;
    writer.write_all(&packed_probs.to_le_bytes()[..7])?;
    Ok(())
}

/// Linear-scans `<table_dir>/<tile_sum>.txt` for a record whose packed
/// board equals `target_packed` (spec.md 6's documented lookup strategy).
pub fn read_table(
    table_dir: &Path,
    tile_sum: u64,
    board_bytes: usize,
    target_packed: u64,
) -> Result<MoveProbs> {
    let path = table_path(table_dir, tile_sum);
    let file = File::open(&path).map_err(|_| Error::TableMissing { sum: tile_sum as u32 })?;
    let mut reader = BufReader::new(file);

    let record_len = board_bytes + 7;
    let mut record = vec![0u8; record_len];

    loop {
        match reader.read_exact(&mut record) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::BoardNotFound { sum: tile_sum as u32 })
            }
            Err(e) => return Err(e.into()),
        }

        let mut board_buf = [0u8; 8];
        board_buf[..board_bytes].copy_from_slice(&record[..board_bytes]);
        let packed_board = u64::from_le_bytes(board_buf);

        if packed_board == target_packed {
            let mut probs_buf = [0u8; 8];
            probs_buf[..7].copy_from_slice(&record[board_bytes..]);
            let packed_probs = u64::from_le_bytes(probs_buf);
            return Ok(MoveProbs::new(unpack_probs(packed_probs)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Cwd;

    #[test]
    fn meta_round_trips() {
        let _cwd = Cwd::enter();
        let dir = Path::new("table");
        fs::create_dir_all(dir).unwrap();
        let meta = Meta {
            root: 42,
            static_tiles: 7,
            goal_tile: 11,
        };
        meta.write(dir).unwrap();
        assert_eq!(Meta::read(dir).unwrap(), meta);
    }

    #[test]
    fn meta_read_missing_is_bad_input() {
        let _cwd = Cwd::enter();
        let err = Meta::read(Path::new("nope")).unwrap_err();
        assert!(matches!(err, Error::BadInput(_)));
    }

    #[test]
    fn spill_round_trip_and_delete() {
        let _cwd = Cwd::enter();
        fs::create_dir_all(POSITIONS_DIR).unwrap();
        let mut shards = create_spill_shards(16, 2).unwrap();
        write_board(&mut shards[0], 0x1122).unwrap();
        write_board(&mut shards[0], 0x3344).unwrap();
        write_board(&mut shards[1], 0x5566).unwrap();
        drop(shards);

        let boards: Vec<u64> = SpillReader::open(16, 0)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(boards, vec![0x1122, 0x3344]);

        delete_spill_shard(16, 0).unwrap();
        assert!(SpillReader::open(16, 0).is_err());
    }

    #[test]
    fn table_write_and_lookup() {
        let _cwd = Cwd::enter();
        let dir = Path::new("table");
        fs::create_dir_all(dir).unwrap();
        let mut writer = create_table_writer(dir, 20).unwrap();

        let probs_a = crate::codec::pack_probs(&[0.5, 0.25, 0.0, 1.0], 20);
        write_table_record(&mut writer, 0xAB, 1, probs_a).unwrap();
        let probs_b = crate::codec::pack_probs(&[0.1, 0.1, 0.1, 0.1], 20);
        write_table_record(&mut writer, 0xCD, 1, probs_b).unwrap();
        drop(writer);

        let found = read_table(dir, 20, 1, 0xCD).unwrap();
        assert!((found.probs[0] - 0.1).abs() < 2f32.powi(-13));

        let missing = read_table(dir, 20, 1, 0xEF).unwrap_err();
        assert!(matches!(missing, Error::BoardNotFound { .. }));

        let no_file = read_table(dir, 999, 1, 0x0).unwrap_err();
        assert!(matches!(no_file, Error::TableMissing { .. }));
    }
}
