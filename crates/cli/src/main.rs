use std::process::ExitCode;

fn main() -> ExitCode {
    tantrata_cli::run()
}
