//! Subcommand dispatch: wires argument parsing to the ingestion, CPE, and
//! forwarding-table modules, and reports results to the user.
//!
//! One function per subcommand, returning `anyhow::Result<()>` so the
//! binary's `main` can convert failures into a diagnostic and exit code.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::cli::args::{BuildArgs, BuildInputs, CpeArgs, LookupArgs};
use crate::cpe::{perform_ipv4_cpe, Prefix, Prefix64};
use crate::displaylevel;
use crate::hash::MurmurHash3;
use crate::ingest::{
    parse_distribution, parse_ipv4_addresses, parse_ipv4_prefixes, parse_ipv6_addresses,
    parse_ipv6_prefixes,
};
use crate::table::{Ipv4ForwardingTable, Ipv6ForwardingTable};

fn open_reader(path: &std::path::Path) -> Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(f))
}

fn read_ipv4_stream(path: &std::path::Path) -> Result<Vec<Prefix>> {
    parse_ipv4_prefixes(open_reader(path)?).with_context(|| format!("parsing {}", path.display()))
}

/// Builds, populates, and finalizes an IPv4 table from the same inputs
/// `build` and `lookup` both accept, so a `lookup` run measures real
/// lookups rather than only the miss/default-route path.
pub fn build_ipv4_table(inputs: &BuildInputs) -> Result<(Ipv4ForwardingTable<MurmurHash3>, usize)> {
    let dist = parse_distribution(open_reader(&inputs.distribution)?)
        .with_context(|| format!("parsing distribution file {}", inputs.distribution.display()))?;
    let records: Vec<(u8, u32)> = dist.iter().map(|r| (r.netmask, r.quantity)).collect();

    let mut table = Ipv4ForwardingTable::<MurmurHash3>::new(inputs.dla_stride);
    table.size_from_distribution(&records, inputs.false_positive_ratio);

    let mut all_prefixes: Vec<Prefix> = Vec::new();
    if let Some(p) = &inputs.prefixes {
        all_prefixes.extend(read_ipv4_stream(p)?);
    }
    for stream in [&inputs.dla, &inputs.g1, &inputs.g2].into_iter().flatten() {
        all_prefixes.extend(read_ipv4_stream(stream)?);
    }

    // A combined `--prefixes` file has not been through CPE yet; run it
    // here so that every stored prefix's length is one of
    // {0, dla_stride, 24, 32}, matching what the dla/g1/g2 streams
    // already guarantee.
    let cpe_out = if inputs.prefixes.is_some() {
        perform_ipv4_cpe(&all_prefixes, inputs.dla_stride)
    } else {
        crate::cpe::Ipv4CpeOutput {
            dla: Vec::new(),
            g1: Vec::new(),
            g2: Vec::new(),
            default_route: None,
        }
    };

    let to_store: Vec<Prefix> = if inputs.prefixes.is_some() {
        cpe_out
            .dla
            .into_iter()
            .chain(cpe_out.g1)
            .chain(cpe_out.g2)
            .chain(cpe_out.default_route.map(|nh| Prefix { key: 0, length: 0, next_hop: nh }))
            .collect()
    } else {
        all_prefixes
    };

    let mut count = 0usize;
    for p in to_store {
        table.store_prefix(p)?;
        count += 1;
    }
    table.finish_build();
    Ok((table, count))
}

/// Builds, populates, and finalizes an IPv6 table from the same inputs
/// `build` and `lookup` both accept.
pub fn build_ipv6_table(inputs: &BuildInputs) -> Result<(Ipv6ForwardingTable<MurmurHash3>, usize)> {
    let dist = parse_distribution(open_reader(&inputs.distribution)?)
        .with_context(|| format!("parsing distribution file {}", inputs.distribution.display()))?;
    let records: Vec<(u8, u32)> = dist.iter().map(|r| (r.netmask, r.quantity)).collect();

    let mut table = Ipv6ForwardingTable::<MurmurHash3>::new();
    table.size_from_distribution(&records, inputs.false_positive_ratio);
    let mut count = 0usize;
    for class_file in &inputs.classes {
        let parsed = parse_ipv6_prefixes(open_reader(class_file)?)
            .with_context(|| format!("parsing {}", class_file.display()))?;
        if parsed.skipped > 0 {
            displaylevel!(2, "skipped {} prefixes longer than 64 bits in {}\n", parsed.skipped, class_file.display());
        }
        for p in parsed.prefixes {
            table.store_prefix(p)?;
            count += 1;
        }
    }
    table.finish_build();
    Ok((table, count))
}

pub fn run_build(args: &BuildArgs) -> Result<()> {
    if args.inputs.ipv6 {
        let (_table, count) = build_ipv6_table(&args.inputs)?;
        displaylevel!(2, "built IPv6 table with {} prefixes\n", count);
    } else {
        let (_table, count) = build_ipv4_table(&args.inputs)?;
        displaylevel!(2, "built IPv4 table with {} prefixes\n", count);
    }
    Ok(())
}

pub fn run_cpe(args: &CpeArgs) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;

    if args.ipv6 {
        let parsed = parse_ipv6_prefixes(open_reader(&args.input)?)
            .with_context(|| format!("parsing {}", args.input.display()))?;
        let partitions = crate::cpe::partition_ipv6_by_length(&parsed.prefixes);
        for (length, prefixes) in &partitions {
            let path = args.out_dir.join(format!("class-{length}.txt"));
            write_ipv6_stream(&path, prefixes)?;
        }
        displaylevel!(2, "wrote {} IPv6 class files to {}\n", partitions.len(), args.out_dir.display());
    } else {
        let raw = read_ipv4_stream(&args.input)?;
        let out = perform_ipv4_cpe(&raw, args.dla_stride);
        write_ipv4_stream(&args.out_dir.join("dla.txt"), &out.dla)?;
        write_ipv4_stream(&args.out_dir.join("g1.txt"), &out.g1)?;
        write_ipv4_stream(&args.out_dir.join("g2.txt"), &out.g2)?;
        displaylevel!(
            2,
            "wrote dla.txt ({} entries), g1.txt ({}), g2.txt ({}) to {}\n",
            out.dla.len(),
            out.g1.len(),
            out.g2.len(),
            args.out_dir.display()
        );
    }
    Ok(())
}

fn format_ipv4(addr: u32) -> String {
    let b = addr.to_be_bytes();
    format!("{}.{}.{}.{}", b[0], b[1], b[2], b[3])
}

fn write_ipv4_stream(path: &std::path::Path, prefixes: &[Prefix]) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for p in prefixes {
        writeln!(w, "{}/{} {}", format_ipv4(p.key), p.length, format_ipv4(p.next_hop))?;
    }
    Ok(())
}

fn format_ipv6_half(key: u64) -> String {
    format!(
        "{:04x}:{:04x}:{:04x}:{:04x}",
        (key >> 48) & 0xffff,
        (key >> 32) & 0xffff,
        (key >> 16) & 0xffff,
        key & 0xffff
    )
}

/// Renders a full 128-bit address as 8 colon-separated hex words.
/// `next_hop` values carry the whole address, unlike the reduced 64-bit
/// lookup key, so they need the full-width renderer rather than
/// [`format_ipv6_half`].
fn format_ipv6_full(addr: u128) -> String {
    format!(
        "{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}",
        (addr >> 112) & 0xffff,
        (addr >> 96) & 0xffff,
        (addr >> 80) & 0xffff,
        (addr >> 64) & 0xffff,
        (addr >> 48) & 0xffff,
        (addr >> 32) & 0xffff,
        (addr >> 16) & 0xffff,
        addr & 0xffff
    )
}

fn write_ipv6_stream(path: &std::path::Path, prefixes: &[Prefix64]) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for p in prefixes {
        writeln!(
            w,
            "{}:0000:0000:0000:0000/{} {}",
            format_ipv6_half(p.key),
            p.length,
            format_ipv6_full(p.next_hop)
        )?;
    }
    Ok(())
}

pub fn run_lookup(args: &LookupArgs) -> Result<()> {
    args.validate()?;

    if args.inputs.ipv6 {
        let addrs = parse_ipv6_addresses(open_reader(&args.addresses)?)
            .with_context(|| format!("parsing {}", args.addresses.display()))?;
        if addrs.is_empty() {
            displaylevel!(1, "address file contains no addresses\n");
            return Ok(());
        }
        let repeat = if args.repeat == 0 { addrs.len() as u64 } else { args.repeat };

        let (table, count) = build_ipv6_table(&args.inputs)?;
        displaylevel!(2, "built IPv6 table with {} prefixes\n", count);

        let start = Instant::now();
        let mut done = 0u64;
        while done < repeat {
            let take = ((repeat - done) as usize).min(addrs.len());
            let batch = &addrs[..take];
            table.lookup_batch(batch)?;
            done += take as u64;
        }
        report_throughput(repeat, start.elapsed());
    } else {
        let addrs = parse_ipv4_addresses(open_reader(&args.addresses)?)
            .with_context(|| format!("parsing {}", args.addresses.display()))?;
        if addrs.is_empty() {
            displaylevel!(1, "address file contains no addresses\n");
            return Ok(());
        }
        let repeat = if args.repeat == 0 { addrs.len() as u64 } else { args.repeat };

        let (table, count) = build_ipv4_table(&args.inputs)?;
        displaylevel!(2, "built IPv4 table with {} prefixes\n", count);

        let start = Instant::now();
        let mut done = 0u64;
        while done < repeat {
            let take = ((repeat - done) as usize).min(addrs.len());
            let batch = &addrs[..take];
            table.lookup_batch(batch)?;
            done += take as u64;
        }
        report_throughput(repeat, start.elapsed());
    }
    Ok(())
}

fn report_throughput(count: u64, elapsed: std::time::Duration) {
    displaylevel!(
        2,
        "forwarded {} addresses in {:?} ({:.2} Mpps)\n",
        count,
        elapsed,
        (count as f64) / elapsed.as_secs_f64() / 1_000_000.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ipv4_inputs(distribution: std::path::PathBuf, prefixes: std::path::PathBuf) -> BuildInputs {
        BuildInputs {
            ipv6: false,
            distribution,
            dla: None,
            g1: None,
            g2: None,
            prefixes: Some(prefixes),
            classes: Vec::new(),
            dla_stride: 20,
            false_positive_ratio: 0.01,
        }
    }

    #[test]
    fn cpe_round_trip_writes_three_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("prefixes.txt");
        fs::write(&input, "10.0.0.0/8 192.168.1.1\n192.168.1.0/32 10.0.0.2\n").unwrap();
        let out_dir = dir.path().join("out");
        let args = CpeArgs {
            input,
            out_dir: out_dir.clone(),
            ipv6: false,
            dla_stride: 20,
        };
        run_cpe(&args).unwrap();
        assert!(out_dir.join("dla.txt").exists());
        assert!(out_dir.join("g1.txt").exists());
        assert!(out_dir.join("g2.txt").exists());
    }

    #[test]
    fn build_from_combined_prefix_file() {
        let dir = tempdir().unwrap();
        let dist = dir.path().join("dist.txt");
        fs::write(&dist, "24 10\n32 10\n").unwrap();
        let prefixes = dir.path().join("prefixes.txt");
        fs::write(&prefixes, "10.0.0.0/8 192.168.1.1\n").unwrap();
        let args = BuildArgs { inputs: ipv4_inputs(dist, prefixes) };
        run_build(&args).unwrap();
    }

    #[test]
    fn lookup_runs_against_address_file() {
        let dir = tempdir().unwrap();
        let dist = dir.path().join("dist.txt");
        fs::write(&dist, "24 10\n32 10\n").unwrap();
        let prefixes = dir.path().join("prefixes.txt");
        fs::write(&prefixes, "10.0.0.0/8 192.168.1.1\n").unwrap();
        let addrs = dir.path().join("addrs.txt");
        fs::write(&addrs, "2\n10.0.0.1\n10.0.0.2\n").unwrap();
        let args = LookupArgs {
            inputs: ipv4_inputs(dist, prefixes),
            addresses: addrs,
            repeat: 0,
            batch_size: 16,
        };
        run_lookup(&args).unwrap();
    }

    #[test]
    fn lookup_runs_against_ipv6_address_file() {
        let dir = tempdir().unwrap();
        let dist = dir.path().join("dist.txt");
        fs::write(&dist, "32 10\n").unwrap();
        let class_file = dir.path().join("class-32.txt");
        fs::write(
            &class_file,
            "2001:0db8:0000:0000:0000:0000:0000:0000/32 0000:0000:0000:0000:0000:0000:0000:0001\n",
        )
        .unwrap();
        let addrs = dir.path().join("addrs6.txt");
        fs::write(
            &addrs,
            "2\n2001:0db8:0000:0001:0000:0000:0000:0000\n2001:0db8:0000:0002:0000:0000:0000:0000\n",
        )
        .unwrap();
        let args = LookupArgs {
            inputs: BuildInputs {
                ipv6: true,
                distribution: dist,
                dla: None,
                g1: None,
                g2: None,
                prefixes: None,
                classes: vec![class_file],
                dla_stride: 20,
                false_positive_ratio: 0.01,
            },
            addresses: addrs,
            repeat: 0,
            batch_size: 16,
        };
        run_lookup(&args).unwrap();
    }

    #[test]
    fn lookup_builds_a_populated_table_and_returns_real_hits() {
        let dir = tempdir().unwrap();
        let dist = dir.path().join("dist.txt");
        fs::write(&dist, "24 10\n32 10\n").unwrap();
        let prefixes = dir.path().join("prefixes.txt");
        fs::write(&prefixes, "10.0.0.0/8 192.168.1.1\n").unwrap();

        let (table, count) = build_ipv4_table(&ipv4_inputs(dist, prefixes)).unwrap();
        assert!(count > 0, "combined prefix file must populate the table");
        let (hit, nh) = table.lookup_address(u32::from_be_bytes([10, 5, 5, 5])).unwrap();
        assert!(hit, "10.5.5.5 falls under the stored /8");
        assert_eq!(nh, u32::from_be_bytes([192, 168, 1, 1]));
    }
}
