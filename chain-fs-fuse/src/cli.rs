use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
pub struct Cli {
    /// Disk image file
    #[arg(long, short, default_value = "chain-fs.img")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty volume, replacing the image
    Format {
        /// Volume size in sectors
        #[arg(long, short, conflicts_with = "kib")]
        sectors: Option<u32>,

        /// Volume size in KiB
        #[arg(long, short, default_value_t = 128)]
        kib: u64,
    },

    /// Copy a host file into a new file, printing its header sector
    Put { source: PathBuf },

    /// Append a host file to the end of a file
    Append {
        #[arg(long)]
        header: u32,

        source: PathBuf,
    },

    /// Print a file's contents
    Cat {
        #[arg(long)]
        header: u32,
    },

    /// Print the volume usage, or a file's header and block list
    Stat {
        #[arg(long)]
        header: Option<u32>,
    },

    /// Remove a file
    Rm {
        #[arg(long)]
        header: u32,
    },

    /// Write a large file in small chunks, grow it, then read it back
    Perf,
}
