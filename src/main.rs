fn main() {
    if let Err(err) = lhdigest::cli::run() {
        lhdigest::ui::eprintln_error(&err);
        std::process::exit(lhdigest::exit::exit_code(&err));
    }
}
