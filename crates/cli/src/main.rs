use std::process::ExitCode;

fn main() -> ExitCode {
    approflow_cli::run()
}
