fn main() {
    cbsgen::cli::run();
}
