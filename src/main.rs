fn main() -> anyhow::Result<()> {
    fund_evidence_search::run()
}
