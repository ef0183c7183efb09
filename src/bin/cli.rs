use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::exit;

use clap::{App, Arg, SubCommand};
use log::debug;

use shmbus::segment::{logical_from_shm_entry, unlink_by_name, SHM_NAME_PREFIX};

/// Host directory backing the POSIX shared-memory namespace
const SHM_DIR: &str = "/dev/shm";

fn main() {
    env_logger::init();

    let matches = App::new("shmbus-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and remove shmbus shared-memory segments")
        .subcommand(SubCommand::with_name("list").about("List shmbus segments on this host"))
        .subcommand(
            SubCommand::with_name("remove")
                .about("Unlink a segment by logical name")
                .arg(
                    Arg::with_name("name")
                        .value_name("NAME")
                        .help("Logical segment name, e.g. /robot/arm/pose")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("list", Some(_)) => {
            if let Err(e) = list_segments() {
                eprintln!("shmbus-cli: {}", e);
                exit(1);
            }
        }
        ("remove", Some(sub)) => {
            let name = sub.value_of("name").unwrap_or_default();
            match unlink_by_name(name) {
                Ok(()) => debug!("unlinked {}", name),
                Err(e) => {
                    eprintln!("shmbus-cli: {}", e);
                    exit(1);
                }
            }
        }
        _ => {
            eprintln!("Usage: shmbus-cli <list|remove NAME>");
            exit(1);
        }
    }
}

fn list_segments() -> std::io::Result<()> {
    println!("Permission Hard-link\tUser\tGroup\tSize\tTimestamp\tShared memory name");

    let mut entries: Vec<_> = std::fs::read_dir(Path::new(SHM_DIR))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(SHM_NAME_PREFIX)
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let logical = match logical_from_shm_entry(&file_name) {
            Some(logical) => logical,
            None => continue,
        };
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                debug!("skipping {}: {}", file_name, e);
                continue;
            }
        };
        println!(
            "{} {}\t{}\t{}\t{}\t{}\t{}",
            format_mode(meta.mode()),
            meta.nlink(),
            meta.uid(),
            meta.gid(),
            meta.size(),
            meta.mtime(),
            logical,
        );
    }
    Ok(())
}

fn format_mode(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push('-');
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
