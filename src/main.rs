use anyhow::{bail, Result};
use chidb_rs::BTree;
use env_logger::Env;

/// Small driver so the B-Tree API can be exercised without a separate
/// project wired against the lib target (same role the teacher's `main.rs`
/// played, narrowed to the operations this crate actually implements:
/// point lookup and insertion, not SQL).
fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();

    let args = std::env::args().collect::<Vec<_>>();
    match args.len() {
        0 | 1 => bail!("Missing <database path> and <command>"),
        2 => bail!("Missing <command>"),
        _ => {}
    }

    let mut bt = BTree::open(&args[1])?;
    let command = &args[2];

    match command.as_str() {
        ".get" => {
            if args.len() < 5 {
                bail!("Usage: .get <root page> <key>");
            }
            let nroot: u32 = args[3].parse()?;
            let key: u32 = args[4].parse()?;
            let (data, size) = bt.find(nroot, key)?;
            println!("{size} bytes: {data:?}");
        }
        ".put" => {
            if args.len() < 6 {
                bail!("Usage: .put <root page> <key> <bytes as comma-separated u8>");
            }
            let nroot: u32 = args[3].parse()?;
            let key: u32 = args[4].parse()?;
            let data: Vec<u8> = args[5]
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.parse())
                .collect::<std::result::Result<_, _>>()?;
            bt.insert_in_table(nroot, key, data)?;
            println!("inserted key {key} under root {nroot}");
        }
        _ => bail!("Unknown command: {command}"),
    }

    bt.close()?;
    Ok(())
}
