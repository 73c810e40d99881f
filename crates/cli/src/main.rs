use std::process::ExitCode;

fn main() -> ExitCode {
    shoprec_cli::run()
}
