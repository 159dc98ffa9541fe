//! Stub compiler driver used by the typexpand end-to-end tests.

use std::process::ExitCode;

use typexpand_test::stub::{self, Invocation};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let invocation = match stub::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("typexpand-stubc: {}", e);
            return ExitCode::from(2);
        }
    };

    match invocation {
        Invocation::Compile(args) => match stub::compile(&args) {
            Ok(report) => {
                let failed = report.catalog.is_none();
                match serde_json::to_string(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("typexpand-stubc: {}", e);
                        return ExitCode::from(2);
                    }
                }
                if failed {
                    ExitCode::from(1)
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                eprintln!("typexpand-stubc: {}", e);
                ExitCode::from(2)
            }
        },
        Invocation::Invoke(args) => match stub::invoke(&args) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::from(3)
            }
        },
    }
}
