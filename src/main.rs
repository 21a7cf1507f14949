// lungo - A small embeddable scripting runtime
// Copyright (c) 2026 Tom Waddington. MIT licensed.

use std::env;
use std::process;

use lungo_core::{Runtime, StdHost};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut load_path = String::from(".");
    let mut file: Option<String> = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--version" | "-v" => {
                println!("Lungo v0.1.0");
                return;
            }
            "--load-path" | "-p" => {
                index += 1;
                match args.get(index) {
                    Some(path) => load_path = path.clone(),
                    None => {
                        eprintln!("Error: {} expects a value", args[index - 1]);
                        process::exit(1);
                    }
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("Error: unknown option '{}'", other);
                print_usage();
                process::exit(1);
            }
            other => {
                if file.is_some() {
                    eprintln!("Error: more than one file given");
                    process::exit(1);
                }
                file = Some(other.to_string());
            }
        }
        index += 1;
    }

    let mut runtime = match Runtime::new(Box::new(StdHost::new()), &load_path) {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    };

    let result = match file {
        Some(name) => runtime.load(&name),
        None => runtime.shell(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(fault) => {
            // only panics escape load/shell; throws are handled inside
            eprintln!("lungo: {}", fault);
            process::exit(2);
        }
    }
}

fn print_usage() {
    println!(
        r#"lungo - a small embeddable scripting runtime

USAGE:
    lungo [OPTIONS] [FILE]

With FILE, load it and exit 0 on success or 1 on an uncaught exception.
Without FILE, run the interactive shell.

OPTIONS:
    -p, --load-path <DIRS>  Colon-separated script directories (default ".")
    -v, --version           Print the version
    -h, --help              Show this message
"#
    );
}
