fn main() -> anyhow::Result<()> {
    sparqlrepo_cli::run()
}
