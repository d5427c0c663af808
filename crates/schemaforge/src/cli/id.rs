use anyhow::Result;
use schemaforge_core::CorrelationId;

pub fn run() -> Result<()> {
    println!("{}", CorrelationId::generate());
    Ok(())
}
