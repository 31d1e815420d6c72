use anyhow::Result;

use crate::{gateway, serial};

pub fn handle_commands(args: &[String]) -> Result<bool> {
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            gateway::run_from_args(args)?;
            Ok(true)
        }
        Some("serial") => {
            serial::run_from_args(args)?;
            Ok(true)
        }
        Some("help") | Some("--help") => {
            print_help();
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn print_help() {
    println!(
        "camgate — camera frame gateway\n\n\
         Commands:\n\
         \x20 serve   Run the HTTP ingest service (POST /upload/<camera-id>)\n\
         \x20 serial  Reassemble frames from a serial camera link with a local preview\n\n\
         Run `camgate <command>` without arguments for per-command usage.\n\
         Model-backed detection requires building with `--features with-tch`."
    );
}
