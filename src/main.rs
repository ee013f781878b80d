fn main() -> anyhow::Result<()> {
    painlog::cli::run()
}
