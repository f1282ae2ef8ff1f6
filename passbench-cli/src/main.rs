fn main() -> anyhow::Result<()> {
    passbench_cli::run()
}
