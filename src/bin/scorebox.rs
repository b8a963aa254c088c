use anyhow::Result;

fn main() -> Result<()> {
    scorebox::cli::run()
}
