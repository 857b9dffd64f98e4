use std::process::ExitCode;

fn main() -> ExitCode {
    steamquery_lib::run()
}
