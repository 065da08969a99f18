use classifier::{
    agent,
    runtime::{self, Runtime},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Runtime { conf, .. } = Runtime::new()?;
    runtime::init_tracing(conf.log_level);

    agent::run(conf).await?;
    Ok(())
}
