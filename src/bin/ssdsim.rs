//! Interactive shell over the legacy host API (§6). Thin wrapper: the only
//! thing it contributes is the shape of the commands it issues.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ssd_ftl_sim::host;
use ssd_ftl_sim::TOTAL_LOGICAL_PAGES;

/// NAND flash / FTL teaching simulator shell.
#[derive(Parser, Debug)]
#[command(name = "ssdsim")]
struct Args {
    /// Path to the persisted NAND image.
    #[arg(long, default_value = host::DEFAULT_IMAGE_PATH)]
    image: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    host::init(args.image);

    println!("========================================");
    println!("  SSD Simulator with FTL & GC");
    println!("  Type 'help' for available commands");
    println!("========================================\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("ssd> ");
        io::stdout().flush().ok();

        let Some(line) = lines.next() else { break };
        let Ok(line) = line else { break };
        let cmd = line.trim();

        if cmd == "exit" {
            println!("Shutting down SSD simulator...");
            if let Err(e) = host::shutdown() {
                eprintln!("error during shutdown: {e}");
            }
            println!("Goodbye!");
            return;
        }

        if !cmd.is_empty() {
            execute(cmd);
        }
        println!();
    }

    // Stdin closed without an explicit `exit`; still run the shutdown path.
    if let Err(e) = host::shutdown() {
        eprintln!("error during shutdown: {e}");
    }
}

fn execute(cmd: &str) {
    let mut parts = cmd.split_whitespace();
    let Some(verb) = parts.next() else {
        println!("empty command");
        return;
    };

    match verb {
        "W" => {
            let (Some(idx), Some(hex)) = (parts.next(), parts.next()) else {
                println!("usage: W <idx> <hex>");
                return;
            };
            let Ok(idx) = idx.parse::<u32>() else {
                println!("index must be an integer");
                return;
            };
            if idx >= TOTAL_LOGICAL_PAGES {
                println!("out of range (0~{})", TOTAL_LOGICAL_PAGES - 1);
                return;
            }
            match host::write(idx, hex) {
                Ok(()) => {}
                Err(e) => println!("write failed: {e}"),
            }
        }
        "R" => {
            let Some(idx) = parts.next() else {
                println!("usage: R <idx>");
                return;
            };
            let Ok(idx) = idx.parse::<u32>() else {
                println!("index must be an integer");
                return;
            };
            if idx >= TOTAL_LOGICAL_PAGES {
                println!("out of range (0~{})", TOTAL_LOGICAL_PAGES - 1);
                return;
            }
            println!("0x{:08X}", host::read(idx));
        }
        "fullwrite" => {
            let Some(hex) = parts.next() else {
                println!("usage: fullwrite <hex>");
                return;
            };
            fullwrite(hex);
        }
        "fullread" => fullread(),
        "testapp1" => testapp1(),
        "testapp2" => testapp2(),
        "testapp3" => testapp3(),
        "stats" => print_statistics(),
        "l2p" => print_l2p_table(),
        "gc" => match host::force_gc() {
            Ok(()) => println!("garbage collection complete"),
            Err(e) => println!("garbage collection failed: {e}"),
        },
        "help" => print_help(),
        _ => println!("unknown command. type 'help'."),
    }
}

fn fullwrite(hex: &str) {
    for idx in 0..TOTAL_LOGICAL_PAGES {
        if let Err(e) = host::write(idx, hex) {
            println!("write to LBA {idx} failed: {e}");
        }
    }
}

fn fullread() {
    for idx in 0..TOTAL_LOGICAL_PAGES {
        println!("0x{:08X}", host::read(idx));
    }
}

fn testapp1() {
    let value = "0xABCDFFFF";
    fullwrite(value);
    println!("full write complete: {value}");
    println!("full read and verification:");
    fullread();
}

fn testapp2() {
    let aging_value = "0xAAAABBBB";
    let overwrite_value = "0x12345678";

    println!("[testapp2] aging write: LBAs 0..5, 30 rounds");
    for round in 0..30 {
        for idx in 0..6 {
            host::write(idx, aging_value).unwrap();
        }
        if (round + 1) % 10 == 0 {
            println!("  ... {} rounds complete", round + 1);
        }
    }
    println!("aging write complete: {aging_value}");

    println!("\n=== statistics after aging ===");
    print_statistics();

    println!("\n[testapp2] overwrite");
    for idx in 0..6 {
        host::write(idx, overwrite_value).unwrap();
    }

    println!("\nverifying:");
    let expected = u32::from_str_radix(&overwrite_value[2..], 16).unwrap();
    for idx in 0..6 {
        let value = host::read(idx);
        if value == expected {
            println!("  LBA {idx}: PASS (0x{value:08X})");
        } else {
            println!("  LBA {idx}: FAIL (expected 0x{expected:08X}, got 0x{value:08X})");
        }
    }

    println!("\n=== final statistics ===");
    print_statistics();
}

fn testapp3() {
    println!("[testapp3] garbage collection exercise\n");

    println!("step 1: initial writes to LBA 0..50");
    for i in 0..=50u32 {
        host::write(i, &format!("0x{:08X}", i * 100)).unwrap();
    }
    println!("\n=== statistics after initial writes ===");
    print_statistics();

    println!("\nstep 2: 10 rounds of overwrite to LBA 0..50 (to trigger GC)");
    for round in 0..10u32 {
        for i in 0..=50u32 {
            host::write(i, &format!("0x{:08X}", (round + 1) * 1000 + i)).unwrap();
        }
        println!("  ... round {} complete", round + 1);
    }
    println!("\n=== statistics after repeated writes ===");
    print_statistics();

    println!("\nstep 3: integrity check on LBA 0..10");
    for i in 0..=10u32 {
        let value = host::read(i);
        let expected = 10 * 1000 + i;
        if value == expected {
            println!("  LBA {i}: PASS");
        } else {
            println!("  LBA {i}: FAIL (expected 0x{expected:08X}, got 0x{value:08X})");
        }
    }
}

fn print_statistics() {
    let stats = host::statistics();
    println!("total host writes:  {}", stats.total_host_writes);
    println!("total page writes:  {}", stats.total_page_writes);
    println!("total block erases: {}", stats.total_block_erases);
    println!("total gc passes:    {}", stats.total_gc_count);
    println!("free pages:         {}", stats.free_pages);
    println!("write amplification: {:.3}", stats.waf);
}

fn print_l2p_table() {
    for (lba, pba) in host::l2p_table() {
        println!("LBA {lba:>3} -> PBA {pba:>5}");
    }
}

fn print_help() {
    println!("================== commands ==================");
    println!("  W <idx> <hex>   - write LBA (e.g. W 3 0xAAAABBBB)");
    println!("  R <idx>         - read LBA (e.g. R 3)");
    println!("  fullwrite <hex> - write <hex> to every LBA (0~99)");
    println!("  fullread        - read every LBA (0~99)");
    println!("  exit            - shut down and quit");
    println!();
    println!("  testapp1        - full write/read verification");
    println!("  testapp2        - aging write + overwrite verification");
    println!("  testapp3        - garbage collection verification");
    println!();
    println!("  stats           - print FTL/NAND statistics (incl. WAF)");
    println!("  l2p             - print the L2P mapping table");
    println!("  gc              - force a garbage collection pass");
    println!("================================================");
}
