fn main() {
    signal_clustering::cli::run();
}
