use std::process::ExitCode;

fn main() -> ExitCode {
    gemification_cli::run()
}
