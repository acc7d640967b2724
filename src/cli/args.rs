//! Command-line argument parsing for the `lpmfwd` binary, using `clap`'s
//! derive API: the CLI surface is small and well suited to declarative
//! flag definitions with built-in conflict/requirement validation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_BATCH_SIZE, FALSE_POSITIVE_RATIO, IPV4_DLA_STRIDE};

/// Longest-prefix-match IP forwarding table: build, preprocess, and query.
#[derive(Debug, Parser)]
#[command(name = "lpmfwd", author, version, about)]
pub struct Cli {
    /// Increase output verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-fatal output.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a forwarding table from a distribution file and prefix streams,
    /// then report its size.
    Build(BuildArgs),
    /// Run the offline Controlled Prefix Expansion preprocessor, emitting
    /// per-class prefix streams from a raw prefix file.
    Cpe(CpeArgs),
    /// Load a prebuilt table and run scalar or batched lookups over an
    /// address file, reporting throughput.
    Lookup(LookupArgs),
}

/// Everything needed to build a forwarding table, shared between `build`
/// (which only builds) and `lookup` (which must build the table it then
/// queries). Flattened into both subcommands' argument structs so the two
/// never drift apart.
#[derive(Debug, Args)]
pub struct BuildInputs {
    /// Build an IPv6 (64-bit reduced key) table instead of IPv4.
    #[arg(long)]
    pub ipv6: bool,

    /// Prefix-distribution file (sizes the CBF/HT pairs).
    #[arg(short = 'd', long = "distribution")]
    pub distribution: PathBuf,

    /// DLA input stream (IPv4 only): prefixes expanded to the DLA stride.
    #[arg(long = "dla", conflicts_with = "ipv6")]
    pub dla: Option<PathBuf>,

    /// G1 input stream (IPv4 only): prefixes expanded to length 24.
    #[arg(long = "g1", conflicts_with = "ipv6")]
    pub g1: Option<PathBuf>,

    /// G2 input stream (IPv4 only): prefixes expanded to length 32.
    #[arg(long = "g2", conflicts_with = "ipv6")]
    pub g2: Option<PathBuf>,

    /// Combined prefix file (IPv4 only), used instead of --dla/--g1/--g2
    /// when the caller has not pre-partitioned the input.
    #[arg(short = 'p', long = "prefixes", conflicts_with_all = ["dla", "g1", "g2"])]
    pub prefixes: Option<PathBuf>,

    /// Per-class prefix file (IPv6 only). May be repeated once per
    /// populated length class.
    #[arg(long = "classes", requires = "ipv6")]
    pub classes: Vec<PathBuf>,

    /// DLA stride for IPv4 (default 20).
    #[arg(long, default_value_t = IPV4_DLA_STRIDE)]
    pub dla_stride: u8,

    /// Target Counting Bloom Filter false-positive ratio.
    #[arg(long, default_value_t = FALSE_POSITIVE_RATIO)]
    pub false_positive_ratio: f64,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub inputs: BuildInputs,
}

#[derive(Debug, Args)]
pub struct CpeArgs {
    /// Raw input prefix file.
    pub input: PathBuf,

    /// Output directory for `dla.txt`/`g1.txt`/`g2.txt` (IPv4) or
    /// per-class files (IPv6).
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Preprocess for IPv6 (per-length partitioning) instead of IPv4 CPE.
    #[arg(long)]
    pub ipv6: bool,

    /// DLA stride for IPv4 (default 20).
    #[arg(long, default_value_t = IPV4_DLA_STRIDE)]
    pub dla_stride: u8,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Inputs used to build the table that gets queried: same shape as
    /// `build` takes, since a lookup with nothing loaded into it would
    /// only ever measure the miss path.
    #[command(flatten)]
    pub inputs: BuildInputs,

    /// Address file: a decimal count followed by that many addresses.
    #[arg(short = 'r', long = "addresses")]
    pub addresses: PathBuf,

    /// Number of addresses to forward; 0 means "once through the file".
    #[arg(short = 'n', long = "repeat", default_value_t = 0)]
    pub repeat: u64,

    /// Batch size for `lookup_batch`; must be a multiple of 16.
    #[arg(short = 'b', long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl LookupArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 || self.batch_size % 16 != 0 {
            anyhow::bail!("--batch-size must be a nonzero multiple of 16, got {}", self.batch_size);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    fn inputs_for(dla_stride: u8) -> BuildInputs {
        BuildInputs {
            ipv6: false,
            distribution: PathBuf::from("dist.txt"),
            dla: None,
            g1: None,
            g2: None,
            prefixes: None,
            classes: Vec::new(),
            dla_stride,
            false_positive_ratio: FALSE_POSITIVE_RATIO,
        }
    }

    #[test]
    fn lookup_rejects_non_multiple_of_16() {
        let args = LookupArgs {
            inputs: inputs_for(IPV4_DLA_STRIDE),
            addresses: PathBuf::from("addrs.txt"),
            repeat: 0,
            batch_size: 17,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn lookup_accepts_default_batch_size() {
        let args = LookupArgs {
            inputs: inputs_for(IPV4_DLA_STRIDE),
            addresses: PathBuf::from("addrs.txt"),
            repeat: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn parses_build_subcommand() {
        let cli = Cli::parse_from([
            "lpmfwd",
            "build",
            "-d",
            "dist.txt",
            "-p",
            "prefixes.txt",
        ]);
        match cli.command {
            Command::Build(b) => {
                assert_eq!(b.inputs.distribution, PathBuf::from("dist.txt"));
                assert_eq!(b.inputs.prefixes, Some(PathBuf::from("prefixes.txt")));
            }
            _ => panic!("expected Build subcommand"),
        }
    }

    #[test]
    fn parses_lookup_subcommand_with_build_inputs() {
        let cli = Cli::parse_from([
            "lpmfwd",
            "lookup",
            "-d",
            "dist.txt",
            "-p",
            "prefixes.txt",
            "-r",
            "addrs.txt",
        ]);
        match cli.command {
            Command::Lookup(l) => {
                assert_eq!(l.inputs.distribution, PathBuf::from("dist.txt"));
                assert_eq!(l.addresses, PathBuf::from("addrs.txt"));
            }
            _ => panic!("expected Lookup subcommand"),
        }
    }
}
