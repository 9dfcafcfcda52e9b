use anyhow::{Context, Result};
use proctored_exam::utils::logging;
use proctored_exam::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    config.validate().context("配置不合法")?;

    // 初始化并运行应用
    let _record = App::initialize(config).await?.run().await?;

    Ok(())
}
