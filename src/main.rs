use std::process::ExitCode;

fn main() -> ExitCode {
    decode_bin::cli::run_cli()
}
