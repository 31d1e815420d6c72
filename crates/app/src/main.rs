mod annotation;
mod cli;
mod data;
mod gateway;
mod processing;
mod serial;
mod telemetry;

#[cfg(test)]
mod testutil;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    telemetry::init();
    let args: Vec<String> = std::env::args().collect();
    if cli::handle_commands(&args)? {
        return Ok(());
    }

    cli::print_help();
    Ok(())
}
