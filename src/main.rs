use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

use study_assistant_ai::utils::logging;
use study_assistant_ai::{handle_json, Config, StudyAssistant};

/// 配置文件路径的环境变量
const CONFIG_PATH_VAR: &str = "STUDY_ASSISTANT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config_path = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let body = read_request()?;

    let assistant = StudyAssistant::from_config(&config);
    logging::log_startup(&config, assistant.providers());

    // Ctrl+C 取消进行中的请求
    let cancel = assistant.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到 Ctrl+C，取消请求");
            cancel.cancel();
        }
    });

    let response = handle_json(&assistant, &body).await;
    println!("{}", response);
    info!("✅ 完成");

    Ok(())
}

/// 从命令行参数指定的文件读取请求，没有参数时读取 stdin
fn read_request() -> Result<String> {
    match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("读取请求文件失败: {}", path)),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("读取标准输入失败")?;
            Ok(body)
        }
    }
}
