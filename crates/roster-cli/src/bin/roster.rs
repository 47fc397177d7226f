fn main() -> anyhow::Result<()> {
    roster_cli::cli::run()
}
