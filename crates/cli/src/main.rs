use std::process::ExitCode;

fn main() -> ExitCode {
    demand_cli::run()
}
