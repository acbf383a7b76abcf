fn main() {
    le_cli::logging::init();
    std::process::exit(le_cli::run_cli_from_args(std::env::args_os()));
}
