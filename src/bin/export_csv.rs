//! Offline CSV export of stored assessments.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin export_csv -- --out <path|-> [--db <path|sqlite-url>] [--force]
//! ```
//!
//! Without `--db`, the database named by `DATABASE_URL` (default
//! `sqlite://patients.db`) is read. `--out -` writes to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use nutricare::adapters::sqlite::SqliteStorage;
use nutricare::application::AssessmentService;
use nutricare::config::{parse_database_url, DatabaseLocation};

const USAGE: &str = "Usage: export_csv --out <path|-> [--db <path|sqlite-url>] [--force]";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut db: Option<String> = None;
    let mut out: Option<String> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                db = Some(p);
            }
            "--out" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                out = Some(p);
            }
            "--force" => force = true,
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\nWrites every stored patient assessment as CSV. Refuses to overwrite an existing file unless --force is given."
                );
                return;
            }
            _ => {
                eprintln!("Unknown arg: {arg}\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let out = out.unwrap_or_else(|| {
        eprintln!("{USAGE}");
        std::process::exit(2);
    });

    let location = match db {
        Some(db) if db.starts_with("sqlite:") => parse_database_url(&db),
        Some(db) => Ok(DatabaseLocation::File(PathBuf::from(db))),
        None => parse_database_url(
            &std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://patients.db".to_string()),
        ),
    }
    .unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(2);
    });

    if let DatabaseLocation::File(path) = &location {
        if !path.exists() {
            eprintln!("Database {:?} does not exist.", path);
            std::process::exit(3);
        }
    }

    let storage = SqliteStorage::open(&location).unwrap_or_else(|e| {
        eprintln!("Failed to open database: {e}");
        std::process::exit(4);
    });
    let service = AssessmentService::new(Arc::new(storage));

    let result = if out == "-" {
        service.export_csv(std::io::stdout().lock())
    } else {
        let out_path = PathBuf::from(&out);
        if out_path.exists() && !force {
            eprintln!("Refusing to overwrite existing file {:?}. Use --force.", out_path);
            std::process::exit(3);
        }
        if let Some(parent) = out_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::File::create(&out_path).unwrap_or_else(|e| {
            eprintln!("Failed to open {:?}: {e}", out_path);
            std::process::exit(4);
        });
        service.export_csv(std::io::BufWriter::new(file))
    };

    match result {
        Ok(rows) => {
            if out != "-" {
                println!("Exported {rows} patients to {out}");
            }
        }
        Err(e) => {
            eprintln!("Export failed: {e}");
            std::process::exit(5);
        }
    }
}
