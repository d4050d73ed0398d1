use std::process::ExitCode;

fn main() -> ExitCode {
    fieldline_cli::run()
}
