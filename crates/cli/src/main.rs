use std::process::ExitCode;

fn main() -> ExitCode {
    medvoice_cli::run()
}
