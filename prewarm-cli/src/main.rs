use anyhow::Result;

fn main() -> Result<()> {
    prewarm_cli::cli::execute()
}
