mod block_file;
mod cli;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::BlockDevice;
use chain_fs::{ByteCount, ByteOffset, FileHeader, FileKind, SECTOR_SIZE, SectorId, Volume};
use clap::Parser;
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command},
};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    log::info!("image={:?}", cli.image);

    let image = cli.image.as_path();
    match cli.command {
        Command::Format { sectors, kib } => {
            let total_sectors =
                sectors.unwrap_or((ByteSizeIec::kib(kib).0 / SECTOR_SIZE as u64) as u32);
            let volume = format(image, total_sectors)?;
            println!(
                "formatted {total_sectors} sectors, {} free",
                volume.free_sectors()
            );
        }
        Command::Put { source } => {
            let mut volume = open_volume(image)?;
            let data = fs::read(source)?;
            let sector = volume
                .create(byte_count(data.len())?, FileKind::File, now())
                .map_err(io::Error::other)?;
            let header = volume.open_file(sector, now()).map_err(io::Error::other)?;
            header
                .write_at(ByteOffset::new(0), &data, volume.block_device())
                .map_err(io::Error::other)?;
            println!("{sector}");
        }
        Command::Append { header, source } => {
            let mut volume = open_volume(image)?;
            let data = fs::read(source)?;
            let sector = SectorId::new(header);
            let old_len = volume
                .open_file(sector, now())
                .map_err(io::Error::other)?
                .file_length();
            let header = volume
                .extend(sector, byte_count(data.len())?, now())
                .map_err(io::Error::other)?;
            header
                .write_at(ByteOffset::new(old_len.into()), &data, volume.block_device())
                .map_err(io::Error::other)?;
            println!("{} bytes", header.file_length());
        }
        Command::Cat { header } => {
            let mut volume = open_volume(image)?;
            let header = volume
                .open_file(SectorId::new(header), now())
                .map_err(io::Error::other)?;
            let mut data = vec![0; header.file_length().as_usize()];
            header
                .read_at(ByteOffset::new(0), &mut data, volume.block_device())
                .map_err(io::Error::other)?;
            println!("{}", escape(&data));
        }
        Command::Stat { header: None } => {
            let volume = open_volume(image)?;
            println!(
                "{} sectors of {SECTOR_SIZE} bytes, {} free",
                volume.total_sectors(),
                volume.free_sectors()
            );
        }
        Command::Stat {
            header: Some(header),
        } => {
            let volume = open_volume(image)?;
            let sector = SectorId::new(header);
            let header =
                FileHeader::fetch_from(sector, volume.block_device()).map_err(io::Error::other)?;
            print_header(sector, &header, volume.block_device())?;
        }
        Command::Rm { header } => {
            open_volume(image)?
                .remove(SectorId::new(header))
                .map_err(io::Error::other)?;
        }
        Command::Perf => perf(&mut open_volume(image)?)?,
    }

    Ok(())
}

fn device(fd: File) -> Arc<dyn BlockDevice> {
    Arc::new(BlockFile::new(fd))
}

fn format(image: &Path, total_sectors: u32) -> io::Result<Volume> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len(total_sectors as u64 * SECTOR_SIZE as u64)?;

    Volume::format(device(fd), total_sectors).map_err(io::Error::other)
}

fn open_volume(image: &Path) -> io::Result<Volume> {
    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    Volume::open(device(fd)).map_err(io::Error::other)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn byte_count(len: usize) -> io::Result<ByteCount> {
    u32::try_from(len)
        .map(ByteCount::new)
        .map_err(|_| io::Error::other(chain_fs::Error::FileTooLarge))
}

/// Prints printable bytes as they are and everything else as `\xx`.
fn escape(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &byte in data {
        if byte.is_ascii_graphic() || byte == b' ' || byte == b'\n' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{byte:02x}"));
        }
    }
    out
}

fn print_header(
    sector: SectorId,
    header: &FileHeader,
    block_device: &Arc<dyn BlockDevice>,
) -> io::Result<()> {
    println!("header {sector}: {:?}", header.kind());
    println!(
        "  {} bytes in {} sectors",
        header.file_length(),
        header.num_sectors()
    );
    println!(
        "  created {}, modified {}, opened {}",
        header.created(),
        header.modified(),
        header.opened()
    );

    let chain = header.chain(block_device);
    println!("  chain at {}, {} nodes", chain.head(), chain.node_count());
    let index_nodes = chain
        .nodes()
        .map(|node| node.map(|(sector, _)| sector.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io::Error::other)?;
    println!("  index nodes: {}", index_nodes.join(" "));

    let data_sectors = header
        .data_sectors(block_device)
        .map_err(io::Error::other)?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    println!("  data sectors: {}", data_sectors.join(" "));

    Ok(())
}

const CONTENTS: &[u8] = b"1234567890";
const EXTRA_CONTENTS: &[u8] = b"0987654321";
const FILE_SIZE: usize = CONTENTS.len() * 5000;
const EXTRA_SIZE: usize = CONTENTS.len() * 10;

/// Writes a file in small chunks, grows it, then reads it back and removes it.
fn perf(volume: &mut Volume) -> io::Result<()> {
    println!("sequential write of {FILE_SIZE} byte file, in {} byte chunks", CONTENTS.len());
    let sector = volume
        .create(byte_count(FILE_SIZE)?, FileKind::File, now())
        .map_err(io::Error::other)?;

    let header = volume.open_file(sector, now()).map_err(io::Error::other)?;
    for offset in (0..FILE_SIZE).step_by(CONTENTS.len()) {
        let written = header
            .write_at(ByteOffset::new(offset as u32), CONTENTS, volume.block_device())
            .map_err(io::Error::other)?;
        if written != CONTENTS.len() {
            return Err(io::Error::other(format!("short write at {offset}")));
        }
    }

    let header = volume
        .extend(sector, byte_count(EXTRA_SIZE)?, now())
        .map_err(io::Error::other)?;
    for offset in (FILE_SIZE..FILE_SIZE + EXTRA_SIZE).step_by(EXTRA_CONTENTS.len()) {
        header
            .write_at(ByteOffset::new(offset as u32), EXTRA_CONTENTS, volume.block_device())
            .map_err(io::Error::other)?;
    }

    println!(
        "sequential read of {} byte file, in {} byte chunks",
        FILE_SIZE + EXTRA_SIZE,
        CONTENTS.len()
    );
    let header = volume.open_file(sector, now()).map_err(io::Error::other)?;
    let mut buf = [0; 10];
    for offset in (0..FILE_SIZE + EXTRA_SIZE).step_by(buf.len()) {
        let read = header
            .read_at(ByteOffset::new(offset as u32), &mut buf, volume.block_device())
            .map_err(io::Error::other)?;
        let expected = if offset < FILE_SIZE { CONTENTS } else { EXTRA_CONTENTS };
        if read < buf.len() || buf != expected {
            return Err(io::Error::other(format!(
                "unexpected contents at {offset}: {}",
                escape(&buf[..read])
            )));
        }
    }

    volume.remove(sector).map_err(io::Error::other)?;
    println!("perf test passed, {} sectors free", volume.free_sectors());
    Ok(())
}
